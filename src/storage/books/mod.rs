//! Record store contract for books and authors.

use crate::domain::book::{Author, AuthorDraft, AuthorId, Book, BookDraft, BookId};
use crate::domain::query::QuerySpec;
use async_trait::async_trait;
use std::collections::BTreeSet;

pub mod memory;
pub mod postgres;

pub use memory::MemoryBookStore;
pub use postgres::PostgresBookStore;

/// Persistence collaborator used by the catalog.
///
/// Implementations perform the actual filtering, ordering and windowing
/// described by a [`QuerySpec`]; the query has already been checked against
/// the allow-lists, so its sort field maps straight to a column.
#[async_trait]
pub trait BookStore: Send + Sync {
    /// Cheap reachability check used by `/health`.
    async fn ping(&self) -> anyhow::Result<()>;

    /// Number of books matching the filter of `spec`.
    async fn count(&self, spec: &QuerySpec) -> anyhow::Result<usize>;

    /// Matching books in the order of `spec`, skipping `offset`, at most `limit`.
    async fn fetch(&self, spec: &QuerySpec, offset: usize, limit: usize) -> anyhow::Result<Vec<Book>>;

    /// Snapshot of the whole collection.
    async fn all(&self) -> anyhow::Result<Vec<Book>>;

    async fn get(&self, id: BookId) -> anyhow::Result<Option<Book>>;

    async fn insert(&self, draft: BookDraft) -> anyhow::Result<Book>;

    /// Replaces every field of book `id`. `None` if it does not exist.
    async fn update(&self, id: BookId, draft: BookDraft) -> anyhow::Result<Option<Book>>;

    /// Removes book `id`; `false` if it was not there.
    async fn delete(&self, id: BookId) -> anyhow::Result<bool>;

    /// All authors ordered by id.
    async fn authors(&self) -> anyhow::Result<Vec<Author>>;

    async fn authors_by_ids(&self, ids: &BTreeSet<AuthorId>) -> anyhow::Result<Vec<Author>>;

    async fn insert_author(&self, draft: AuthorDraft) -> anyhow::Result<Author>;
}
