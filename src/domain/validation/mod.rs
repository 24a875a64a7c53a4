//! Field validation for book records.
//!
//! Validation runs in two steps. [`BookForm`] coerces untrusted JSON into a
//! [`BookCandidate`], collecting per-field coercion errors; [`validate`] then
//! applies every rule in [`BOOK_RULES`] to the candidate. Nothing
//! short-circuits: all violations end up in a single [`FieldErrors`].

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub mod form;

pub use form::{BookForm, CleanedBook, CoverChange, CoverUpload};

pub const TITLE_MAX_CHARS: usize = 50;
pub const MSG_TITLE_REQUIRED: &str = "The title is mandatory";
pub const MSG_TITLE_TOO_LONG: &str = "The title must be less than 50 characters long";
pub const MSG_MIN_ONE: &str = "Ensure this value is greater than or equal to 1.";
pub const MSG_MAX_FIVE: &str = "Ensure this value is less than or equal to 5.";
pub const MSG_MAX_I32: &str = "Ensure this value is less than or equal to 2147483647.";
pub const MSG_READ_BEFORE_PUBLISHED: &str = "The read date must be after the published date";

/// Field name -> ordered list of human readable messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn merge(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, field: &str, message: &str) -> bool {
        self.get(field).iter().any(|m| m == message)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(())` when no error was recorded.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.fields().collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl std::error::Error for FieldErrors {}

/// The typed view of a submitted book that the rules run against.
///
/// `None` means the field was absent or failed coercion; the coercion step has
/// already reported it, so rules over that field are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookCandidate {
    pub title: String,
    pub pages: Option<i64>,
    pub rating: Option<i64>,
    pub published_date: Option<NaiveDate>,
    pub read_date: Option<NaiveDate>,
}

/// A single declarative rule: the field it reports on, its message, and the
/// predicate that detects a violation.
pub struct FieldRule {
    pub field: &'static str,
    pub message: &'static str,
    violated: fn(&BookCandidate) -> bool,
}

impl FieldRule {
    pub fn check(&self, candidate: &BookCandidate) -> Option<(&'static str, &'static str)> {
        (self.violated)(candidate).then_some((self.field, self.message))
    }
}

fn title_empty(c: &BookCandidate) -> bool {
    c.title.is_empty()
}

fn title_too_long(c: &BookCandidate) -> bool {
    c.title.chars().count() > TITLE_MAX_CHARS
}

fn pages_below_one(c: &BookCandidate) -> bool {
    c.pages.is_some_and(|p| p < 1)
}

fn pages_overflow(c: &BookCandidate) -> bool {
    c.pages.is_some_and(|p| p > i64::from(i32::MAX))
}

fn rating_below_one(c: &BookCandidate) -> bool {
    c.rating.is_some_and(|r| r < 1)
}

fn rating_above_five(c: &BookCandidate) -> bool {
    c.rating.is_some_and(|r| r > 5)
}

fn read_before_published(c: &BookCandidate) -> bool {
    match (c.published_date, c.read_date) {
        (Some(published), Some(read)) => read < published,
        _ => false,
    }
}

pub static BOOK_RULES: &[FieldRule] = &[
    FieldRule {
        field: "title",
        message: MSG_TITLE_REQUIRED,
        violated: title_empty,
    },
    FieldRule {
        field: "title",
        message: MSG_TITLE_TOO_LONG,
        violated: title_too_long,
    },
    FieldRule {
        field: "pages",
        message: MSG_MIN_ONE,
        violated: pages_below_one,
    },
    FieldRule {
        field: "pages",
        message: MSG_MAX_I32,
        violated: pages_overflow,
    },
    FieldRule {
        field: "rating",
        message: MSG_MIN_ONE,
        violated: rating_below_one,
    },
    FieldRule {
        field: "rating",
        message: MSG_MAX_FIVE,
        violated: rating_above_five,
    },
    FieldRule {
        field: "read_date",
        message: MSG_READ_BEFORE_PUBLISHED,
        violated: read_before_published,
    },
];

/// Runs every rule against `candidate` and returns all violations.
pub fn validate(candidate: &BookCandidate) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    for (field, message) in BOOK_RULES.iter().filter_map(|r| r.check(candidate)) {
        errors.add(field, message);
    }
    errors.into_result()
}
