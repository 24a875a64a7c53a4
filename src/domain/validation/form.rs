//! Coercion of untrusted JSON bodies into typed book fields.

use super::{validate, BookCandidate, FieldErrors};
use crate::domain::book::{AuthorId, Book, BookDraft, CoverImage, ReadingStatus};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::NaiveDate;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeSet;

pub const MSG_REQUIRED: &str = "This field is required.";
pub const MSG_WHOLE_NUMBER: &str = "Enter a whole number.";
pub const MSG_VALID_DATE: &str = "Enter a valid date.";
pub const MSG_LIST_OF_VALUES: &str = "Enter a list of values.";
pub const MSG_NO_FILE: &str = "No file was submitted. Check the encoding type on the form.";
pub const MSG_NOT_A_FILE: &str =
    "The submitted data was not a file. Check the encoding type on the form.";
pub const MSG_EMPTY_FILE: &str = "The submitted file is empty.";

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn invalid_choice(value: impl std::fmt::Display) -> String {
    format!("Select a valid choice. {value} is not one of the available choices.")
}

/// Cover upload carried inside a JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverUpload {
    pub filename: String,
    pub content: Vec<u8>,
}

/// What a submitted form asks to do with the cover image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoverChange {
    Keep,
    Clear,
    Upload(CoverUpload),
}

/// A form whose every field coerced and passed the rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedBook {
    pub title: String,
    pub pages: i32,
    pub rating: i32,
    pub status: ReadingStatus,
    pub published_date: NaiveDate,
    pub read_date: Option<NaiveDate>,
    pub authors: BTreeSet<AuthorId>,
    pub cover: CoverChange,
}

impl CleanedBook {
    pub fn into_draft(self, cover_image: Option<CoverImage>) -> BookDraft {
        BookDraft {
            title: self.title,
            pages: self.pages,
            rating: self.rating,
            status: self.status,
            published_date: self.published_date,
            read_date: self.read_date,
            cover_image,
            authors: self.authors,
        }
    }
}

/// Raw submitted fields of a book, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookForm {
    fields: Map<String, JsonValue>,
}

impl BookForm {
    pub fn new(fields: Map<String, JsonValue>) -> Self {
        Self { fields }
    }

    /// Form prefilled with the stored values of `book`.
    ///
    /// The cover is left out so that cleaning the form keeps the stored one.
    pub fn from_book(book: &Book) -> Self {
        let mut fields = Map::new();
        fields.insert("title".into(), JsonValue::from(book.title.clone()));
        fields.insert("pages".into(), JsonValue::from(book.pages));
        fields.insert("rating".into(), JsonValue::from(book.rating));
        fields.insert("status".into(), JsonValue::from(book.status.code()));
        fields.insert(
            "published_date".into(),
            JsonValue::from(book.published_date.format(DATE_FORMAT).to_string()),
        );
        fields.insert(
            "read_date".into(),
            book.read_date
                .map(|d| JsonValue::from(d.format(DATE_FORMAT).to_string()))
                .unwrap_or(JsonValue::Null),
        );
        fields.insert(
            "authors".into(),
            JsonValue::from(book.authors.iter().copied().collect::<Vec<_>>()),
        );
        Self { fields }
    }

    /// Incoming fields replace the current ones; fields it omits are kept.
    pub fn overlay(mut self, incoming: BookForm) -> Self {
        self.fields.extend(incoming.fields);
        self
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.fields.get(field)
    }

    /// Coerces every field and runs the validation rules, reporting all
    /// problems together.
    pub fn clean(&self) -> Result<CleanedBook, FieldErrors> {
        let mut errors = FieldErrors::new();

        let title = coerce_title(self.get("title"));
        let pages = coerce_required(self.get("pages"), "pages", &mut errors, coerce_int);
        let rating = coerce_required(self.get("rating"), "rating", &mut errors, coerce_int);
        let status = coerce_required(self.get("status"), "status", &mut errors, coerce_status);
        let published_date = coerce_required(
            self.get("published_date"),
            "published_date",
            &mut errors,
            coerce_date,
        );
        let read_date = match self.get("read_date") {
            Some(v) if !is_blank(v) => match coerce_date(v) {
                Ok(d) => Some(d),
                Err(msg) => {
                    errors.add("read_date", msg);
                    None
                }
            },
            _ => None,
        };
        let authors = match coerce_authors(self.get("authors")) {
            Ok(ids) => ids,
            Err(msg) => {
                errors.add("authors", msg);
                BTreeSet::new()
            }
        };
        let cover = match coerce_cover(self.get("cover_image")) {
            Ok(change) => change,
            Err(msg) => {
                errors.add("cover_image", msg);
                CoverChange::Keep
            }
        };

        let candidate = BookCandidate {
            title,
            pages,
            rating,
            published_date,
            read_date,
        };
        if let Err(rule_errors) = validate(&candidate) {
            errors.merge(rule_errors);
        }

        let (Some(pages), Some(rating), Some(status), Some(published_date)) =
            (pages, rating, status, published_date)
        else {
            return Err(errors);
        };
        if !errors.is_empty() {
            return Err(errors);
        }
        // The range rules above guarantee both fit.
        let (Ok(pages), Ok(rating)) = (i32::try_from(pages), i32::try_from(rating)) else {
            errors.add("pages", super::MSG_MAX_I32);
            return Err(errors);
        };

        Ok(CleanedBook {
            title: candidate.title,
            pages,
            rating,
            status,
            published_date,
            read_date: candidate.read_date,
            authors,
            cover,
        })
    }
}

fn is_blank(v: &JsonValue) -> bool {
    match v {
        JsonValue::Null => true,
        JsonValue::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn coerce_required<T>(
    value: Option<&JsonValue>,
    field: &str,
    errors: &mut FieldErrors,
    coerce: fn(&JsonValue) -> Result<T, String>,
) -> Option<T> {
    match value {
        Some(v) if !is_blank(v) => match coerce(v) {
            Ok(t) => Some(t),
            Err(msg) => {
                errors.add(field, msg);
                None
            }
        },
        _ => {
            errors.add(field, MSG_REQUIRED);
            None
        }
    }
}

/// Text of the title. Numbers are stringified; anything else that is not a
/// string counts as no title at all.
fn coerce_title(value: Option<&JsonValue>) -> String {
    match value {
        Some(JsonValue::String(s)) => s.trim().to_string(),
        Some(JsonValue::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn coerce_int(v: &JsonValue) -> Result<i64, String> {
    if let Some(n) = v.as_i64() {
        return Ok(n);
    }
    // Out-of-range values saturate so the range rules report them.
    if v.as_u64().is_some() {
        return Ok(i64::MAX);
    }
    if let Some(f) = v.as_f64() {
        if f.fract() == 0.0 {
            return Ok(f as i64);
        }
        return Err(MSG_WHOLE_NUMBER.to_string());
    }
    if let Some(s) = v.as_str() {
        return s
            .trim()
            .parse::<i64>()
            .map_err(|_| MSG_WHOLE_NUMBER.to_string());
    }
    Err(MSG_WHOLE_NUMBER.to_string())
}

fn coerce_status(v: &JsonValue) -> Result<ReadingStatus, String> {
    match v.as_str() {
        Some(s) => s.trim().parse().map_err(|_| invalid_choice(s.trim())),
        None => Err(invalid_choice(v)),
    }
}

fn coerce_date(v: &JsonValue) -> Result<NaiveDate, String> {
    v.as_str()
        .and_then(|s| NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok())
        .ok_or_else(|| MSG_VALID_DATE.to_string())
}

fn coerce_authors(value: Option<&JsonValue>) -> Result<BTreeSet<AuthorId>, String> {
    let items = match value {
        None | Some(JsonValue::Null) => return Ok(BTreeSet::new()),
        Some(JsonValue::Array(items)) => items,
        Some(_) => return Err(MSG_LIST_OF_VALUES.to_string()),
    };
    let mut ids = BTreeSet::new();
    for item in items {
        let id = item
            .as_i64()
            .or_else(|| item.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| format!("\"{}\" is not a valid value.", display_raw(item)))?;
        ids.insert(id);
    }
    Ok(ids)
}

fn display_raw(v: &JsonValue) -> String {
    match v.as_str() {
        Some(s) => s.to_string(),
        None => v.to_string(),
    }
}

fn coerce_cover(value: Option<&JsonValue>) -> Result<CoverChange, String> {
    let upload = match value {
        None => return Ok(CoverChange::Keep),
        Some(JsonValue::Null) | Some(JsonValue::Bool(false)) => return Ok(CoverChange::Clear),
        Some(JsonValue::Object(upload)) => upload,
        Some(_) => return Err(MSG_NO_FILE.to_string()),
    };

    let filename = upload
        .get("filename")
        .and_then(JsonValue::as_str)
        .map(base_name)
        .unwrap_or_default();
    if !is_plain_file_name(&filename) {
        return Err(MSG_NO_FILE.to_string());
    }
    let encoded = upload
        .get("content_base64")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| MSG_NOT_A_FILE.to_string())?;
    let content = BASE64
        .decode(encoded.trim())
        .map_err(|_| MSG_NOT_A_FILE.to_string())?;
    if content.is_empty() {
        return Err(MSG_EMPTY_FILE.to_string());
    }
    Ok(CoverChange::Upload(CoverUpload { filename, content }))
}

/// A single, ordinary path component that every blob store can hold.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('\0')
}

/// Last path component of a client-supplied filename.
fn base_name(name: &str) -> String {
    name.rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
