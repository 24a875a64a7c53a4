//! List queries over the catalog built from untrusted query parameters.
//!
//! Raw parameters are resolved into a [`QuerySpec`] against fixed allow-lists
//! before anything reaches the store. Unknown values never error: they fall
//! back to the defaults (`sort=title`, `direction=asc`, page 1).

use crate::domain::book::Book;
use crate::storage::books::BookStore;
use serde::Serialize;
use std::cmp::Ordering;

pub const PAGE_SIZE: usize = 10;

/// Columns a list may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    Title,
    Pages,
    Rating,
    Status,
    PublishedDate,
}

impl SortField {
    pub const ALLOWED: [SortField; 5] = [
        Self::Title,
        Self::Pages,
        Self::Rating,
        Self::Status,
        Self::PublishedDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Pages => "pages",
            Self::Rating => "rating",
            Self::Status => "status",
            Self::PublishedDate => "published_date",
        }
    }

    /// Resolves a raw value against the allow-list.
    pub fn resolve(raw: Option<&str>) -> Self {
        raw.and_then(|r| Self::ALLOWED.into_iter().find(|f| f.as_str() == r))
            .unwrap_or_default()
    }

    fn compare(&self, a: &Book, b: &Book) -> Ordering {
        match self {
            Self::Title => a.title.cmp(&b.title),
            Self::Pages => a.pages.cmp(&b.pages),
            Self::Rating => a.rating.cmp(&b.rating),
            Self::Status => a.status.cmp(&b.status),
            Self::PublishedDate => a.published_date.cmp(&b.published_date),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn resolve(raw: Option<&str>) -> Self {
        match raw {
            Some("desc") => Self::Desc,
            _ => Self::Asc,
        }
    }
}

/// Requested page, before the total count is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRequest {
    Number(i64),
    Last,
}

impl PageRequest {
    pub fn resolve(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim) else {
            return Self::Number(1);
        };
        if raw == "last" {
            return Self::Last;
        }
        match raw.parse::<i64>() {
            Ok(n) => Self::Number(n),
            // all digits but too large for i64: certainly past the last page
            Err(_) if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) => {
                Self::Number(i64::MAX)
            }
            Err(_) => Self::Number(1),
        }
    }
}

/// Untrusted query parameters in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawParams(Vec<(String, String)>);

impl RawParams {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    /// Last value given for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Re-encodes every parameter except those named `key`.
    pub fn encode_without(&self, key: &str) -> String {
        self.0
            .iter()
            .filter(|(k, _)| k != key)
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// A validated list query handed to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub title: Option<String>,
    pub sort: SortField,
    pub direction: Direction,
    pub page: PageRequest,
}

impl QuerySpec {
    pub fn from_params(params: &RawParams) -> Self {
        Self {
            title: params
                .get("title")
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            sort: SortField::resolve(params.get("sort")),
            direction: Direction::resolve(params.get("direction")),
            page: PageRequest::resolve(params.get("page")),
        }
    }

    /// Case-insensitive substring match on the title filter.
    pub fn matches(&self, book: &Book) -> bool {
        match &self.title {
            None => true,
            Some(needle) => book
                .title
                .to_lowercase()
                .contains(&needle.to_lowercase()),
        }
    }

    /// Resolved ordering; ties fall back to ascending id.
    pub fn compare(&self, a: &Book, b: &Book) -> Ordering {
        let primary = match self.direction {
            Direction::Asc => self.sort.compare(a, b),
            Direction::Desc => self.sort.compare(b, a),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }

    /// Applies filter, order and window to an in-memory snapshot.
    pub fn apply(&self, books: impl IntoIterator<Item = Book>, offset: usize, limit: usize) -> Vec<Book> {
        let mut matching: Vec<Book> = books.into_iter().filter(|b| self.matches(b)).collect();
        matching.sort_by(|a, b| self.compare(a, b));
        matching.into_iter().skip(offset).take(limit).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub num_pages: i64,
    pub total: usize,
    pub page_size: usize,
    pub has_previous: bool,
    pub has_next: bool,
}

impl Pagination {
    /// Resolves `request` against `total` matches. Returns the window to fetch,
    /// or `None` when the page is out of range.
    pub fn resolve(request: PageRequest, total: usize) -> (Self, Option<(usize, usize)>) {
        let num_pages = i64::try_from(total.div_ceil(PAGE_SIZE)).unwrap_or(i64::MAX).max(1);
        let page = match request {
            PageRequest::Number(n) => n,
            PageRequest::Last => num_pages,
        };
        let in_range = (1..=num_pages).contains(&page);
        let window = in_range.then(|| {
            // page <= num_pages, so the offset fits in usize
            let offset = usize::try_from(page - 1).unwrap_or(usize::MAX).saturating_mul(PAGE_SIZE);
            (offset, PAGE_SIZE)
        });
        let pagination = Self {
            page,
            num_pages,
            total,
            page_size: PAGE_SIZE,
            has_previous: in_range && page > 1,
            has_next: in_range && page < num_pages,
        };
        (pagination, window)
    }
}

/// Values the list view needs to render sort links and pagination links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderMeta {
    pub sort: SortField,
    pub direction: Direction,
    pub title: String,
    /// Query string without `page`, ready for `&page=N` to be appended.
    pub query_string: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListView<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
    pub meta: RenderMeta,
}

impl<T> ListView<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ListView<U> {
        ListView {
            items: self.items.into_iter().map(f).collect(),
            pagination: self.pagination,
            meta: self.meta,
        }
    }
}

/// Resolves `params`, asks the store for the matching window and returns it
/// with pagination and render metadata. Read-only.
pub async fn build_view(store: &dyn BookStore, params: &RawParams) -> anyhow::Result<ListView<Book>> {
    let spec = QuerySpec::from_params(params);
    let total = store.count(&spec).await?;
    let (pagination, window) = Pagination::resolve(spec.page, total);
    let items = match window {
        Some((offset, limit)) => store.fetch(&spec, offset, limit).await?,
        None => Vec::new(),
    };
    tracing::debug!(
        sort = spec.sort.as_str(),
        direction = spec.direction.as_str(),
        total,
        page = pagination.page,
        "built list view"
    );
    Ok(ListView {
        items,
        pagination,
        meta: RenderMeta {
            sort: spec.sort,
            direction: spec.direction,
            title: spec.title.unwrap_or_default(),
            query_string: params.encode_without("page"),
        },
    })
}
