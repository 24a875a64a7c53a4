//! Catalog records: books, their authors and reading status.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Prefix under which cover blobs are stored.
pub const COVERS_PREFIX: &str = "covers/";

pub type BookId = i64;
pub type AuthorId = i64;

/// Reading status of a book. Ordering follows the status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadingStatus {
    #[serde(rename = "TR")]
    ToRead,
    #[serde(rename = "RG")]
    Reading,
    #[serde(rename = "RE")]
    Read,
}

impl ReadingStatus {
    pub const ALL: [ReadingStatus; 3] = [Self::ToRead, Self::Reading, Self::Read];

    pub fn code(&self) -> &'static str {
        match self {
            Self::ToRead => "TR",
            Self::Reading => "RG",
            Self::Read => "RE",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ToRead => "To read",
            Self::Reading => "Reading",
            Self::Read => "Read",
        }
    }
}

impl Ord for ReadingStatus {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.code().cmp(other.code())
    }
}

impl PartialOrd for ReadingStatus {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown reading status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for ReadingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.code() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: AuthorId,
    pub name: String,
    pub last_name: String,
}

/// Reference to a stored cover blob. Only the filename is kept on the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverImage {
    pub name: String,
}

impl CoverImage {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A persisted book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub pages: i32,
    pub rating: i32,
    pub status: ReadingStatus,
    pub published_date: NaiveDate,
    #[serde(default)]
    pub read_date: Option<NaiveDate>,
    #[serde(default)]
    pub cover_image: Option<CoverImage>,
    #[serde(default)]
    pub authors: BTreeSet<AuthorId>,
}

/// The field set of a book that passed validation, without an identity yet.
///
/// Stores accept only drafts for writes; the cover has already been persisted
/// to the blob store by the time a draft is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDraft {
    pub title: String,
    pub pages: i32,
    pub rating: i32,
    pub status: ReadingStatus,
    pub published_date: NaiveDate,
    pub read_date: Option<NaiveDate>,
    pub cover_image: Option<CoverImage>,
    pub authors: BTreeSet<AuthorId>,
}

impl BookDraft {
    pub fn into_book(self, id: BookId) -> Book {
        Book {
            id,
            title: self.title,
            pages: self.pages,
            rating: self.rating,
            status: self.status,
            published_date: self.published_date,
            read_date: self.read_date,
            cover_image: self.cover_image,
            authors: self.authors,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthorDraft {
    pub name: String,
    pub last_name: String,
}

/// Book as rendered to callers, with authors resolved.
#[derive(Debug, Clone, Serialize)]
pub struct BookView {
    pub id: BookId,
    pub title: String,
    pub pages: i32,
    pub rating: i32,
    pub status: ReadingStatus,
    pub status_label: &'static str,
    pub published_date: NaiveDate,
    pub read_date: Option<NaiveDate>,
    pub cover_image: Option<CoverImage>,
    pub authors: Vec<Author>,
}

impl BookView {
    pub fn new(book: Book, authors: &[Author]) -> Self {
        let authors = book
            .authors
            .iter()
            .filter_map(|id| authors.iter().find(|a| a.id == *id).cloned())
            .collect();
        Self {
            id: book.id,
            title: book.title,
            pages: book.pages,
            rating: book.rating,
            status: book.status,
            status_label: book.status.label(),
            published_date: book.published_date,
            read_date: book.read_date,
            cover_image: book.cover_image,
            authors,
        }
    }
}
