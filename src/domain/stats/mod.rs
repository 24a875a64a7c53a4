//! Summary statistics over the whole catalog.

use crate::domain::book::{Book, ReadingStatus};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: ReadingStatus,
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RatingCount {
    pub rating: i32,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    pub max_pages_book: Option<Book>,
    pub min_pages_book: Option<Book>,
    pub avg_pages: f64,
    pub avg_rating: f64,
    /// Ordered by status code.
    pub status_distribution: Vec<StatusCount>,
    /// Ordered by rating value.
    pub rating_distribution: Vec<RatingCount>,
}

/// Computes the catalog statistics. An empty collection yields zero averages,
/// no extreme books and empty distributions.
pub fn compute_stats(books: &[Book]) -> Stats {
    // ties go to the lowest id
    let max_pages_book = books
        .iter()
        .max_by(|a, b| a.pages.cmp(&b.pages).then_with(|| b.id.cmp(&a.id)))
        .cloned();
    let min_pages_book = books
        .iter()
        .min_by(|a, b| a.pages.cmp(&b.pages).then_with(|| a.id.cmp(&b.id)))
        .cloned();

    let mut by_status: BTreeMap<ReadingStatus, usize> = BTreeMap::new();
    let mut by_rating: BTreeMap<i32, usize> = BTreeMap::new();
    for book in books {
        *by_status.entry(book.status).or_default() += 1;
        *by_rating.entry(book.rating).or_default() += 1;
    }

    Stats {
        max_pages_book,
        min_pages_book,
        avg_pages: average(books.iter().map(|b| b.pages)),
        avg_rating: average(books.iter().map(|b| b.rating)),
        status_distribution: by_status
            .into_iter()
            .map(|(status, count)| StatusCount {
                status,
                label: status.label(),
                count,
            })
            .collect(),
        rating_distribution: by_rating
            .into_iter()
            .map(|(rating, count)| RatingCount { rating, count })
            .collect(),
    }
}

fn average(values: impl Iterator<Item = i32>) -> f64 {
    let (sum, count) = values.fold((0i64, 0usize), |(s, c), v| (s + i64::from(v), c + 1));
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}
