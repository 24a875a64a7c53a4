use super::BookStore;
use crate::domain::book::{Author, AuthorDraft, AuthorId, Book, BookDraft, BookId};
use crate::domain::query::QuerySpec;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    books: BTreeMap<BookId, Book>,
    authors: BTreeMap<AuthorId, Author>,
    next_book_id: BookId,
    next_author_id: AuthorId,
}

/// Process-local store. Ids start at 1 and are never reused.
#[derive(Default)]
pub struct MemoryBookStore {
    tables: RwLock<Tables>,
}

impl MemoryBookStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookStore for MemoryBookStore {
    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn count(&self, spec: &QuerySpec) -> anyhow::Result<usize> {
        let tables = self.tables.read().await;
        Ok(tables.books.values().filter(|b| spec.matches(b)).count())
    }

    async fn fetch(&self, spec: &QuerySpec, offset: usize, limit: usize) -> anyhow::Result<Vec<Book>> {
        let tables = self.tables.read().await;
        Ok(spec.apply(tables.books.values().cloned(), offset, limit))
    }

    async fn all(&self) -> anyhow::Result<Vec<Book>> {
        let tables = self.tables.read().await;
        Ok(tables.books.values().cloned().collect())
    }

    async fn get(&self, id: BookId) -> anyhow::Result<Option<Book>> {
        Ok(self.tables.read().await.books.get(&id).cloned())
    }

    async fn insert(&self, draft: BookDraft) -> anyhow::Result<Book> {
        let mut tables = self.tables.write().await;
        tables.next_book_id += 1;
        let book = draft.into_book(tables.next_book_id);
        tables.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn update(&self, id: BookId, draft: BookDraft) -> anyhow::Result<Option<Book>> {
        let mut tables = self.tables.write().await;
        let Some(slot) = tables.books.get_mut(&id) else {
            return Ok(None);
        };
        *slot = draft.into_book(id);
        Ok(Some(slot.clone()))
    }

    async fn delete(&self, id: BookId) -> anyhow::Result<bool> {
        Ok(self.tables.write().await.books.remove(&id).is_some())
    }

    async fn authors(&self) -> anyhow::Result<Vec<Author>> {
        Ok(self.tables.read().await.authors.values().cloned().collect())
    }

    async fn authors_by_ids(&self, ids: &BTreeSet<AuthorId>) -> anyhow::Result<Vec<Author>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.authors.get(id).cloned())
            .collect())
    }

    async fn insert_author(&self, draft: AuthorDraft) -> anyhow::Result<Author> {
        let mut tables = self.tables.write().await;
        tables.next_author_id += 1;
        let author = Author {
            id: tables.next_author_id,
            name: draft.name,
            last_name: draft.last_name,
        };
        tables.authors.insert(author.id, author.clone());
        Ok(author)
    }
}
