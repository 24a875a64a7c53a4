//! PostgreSQL-backed record store.

use super::BookStore;
use crate::domain::book::{Author, AuthorDraft, AuthorId, Book, BookDraft, BookId, CoverImage};
use crate::domain::query::{Direction, QuerySpec, SortField};
use anyhow::Context;
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::collections::{BTreeSet, HashMap};

const BOOK_COLUMNS: &str =
    "id, title, pages, rating, status, published_date, read_date, cover_image";

pub struct PostgresBookStore {
    pool: PgPool,
}

impl PostgresBookStore {
    /// Opens the pool. Call [`Self::ensure_schema`] before serving.
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connecting to the catalog database")?;
        Ok(Self { pool })
    }

    /// Creates the catalog tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS authors (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                last_name TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        // The CHECK constraints mirror the validation rules.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS books (
                id BIGSERIAL PRIMARY KEY,
                title TEXT NOT NULL CHECK (char_length(title) BETWEEN 1 AND 50),
                pages INTEGER NOT NULL CHECK (pages >= 1),
                rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
                status TEXT NOT NULL,
                published_date DATE NOT NULL,
                read_date DATE CHECK (read_date IS NULL OR read_date >= published_date),
                cover_image TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS book_authors (
                book_id BIGINT NOT NULL REFERENCES books(id) ON DELETE CASCADE,
                author_id BIGINT NOT NULL REFERENCES authors(id) ON DELETE CASCADE,
                PRIMARY KEY (book_id, author_id)
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn attach_authors(&self, mut books: Vec<Book>) -> anyhow::Result<Vec<Book>> {
        if books.is_empty() {
            return Ok(books);
        }
        let ids: Vec<BookId> = books.iter().map(|b| b.id).collect();
        let rows = sqlx::query("SELECT book_id, author_id FROM book_authors WHERE book_id = ANY($1)")
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;

        let mut by_book: HashMap<BookId, BTreeSet<AuthorId>> = HashMap::new();
        for row in rows {
            let book_id: BookId = row.try_get("book_id")?;
            let author_id: AuthorId = row.try_get("author_id")?;
            by_book.entry(book_id).or_default().insert(author_id);
        }
        for book in &mut books {
            book.authors = by_book.remove(&book.id).unwrap_or_default();
        }
        Ok(books)
    }

    async fn replace_authors(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        book_id: BookId,
        authors: &BTreeSet<AuthorId>,
    ) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM book_authors WHERE book_id = $1")
            .bind(book_id)
            .execute(tx.as_mut())
            .await?;
        for author_id in authors {
            sqlx::query("INSERT INTO book_authors (book_id, author_id) VALUES ($1, $2)")
                .bind(book_id)
                .bind(author_id)
                .execute(tx.as_mut())
                .await?;
        }
        Ok(())
    }
}

fn book_from_row(row: &PgRow) -> anyhow::Result<Book> {
    let status: String = row.try_get("status")?;
    let cover_image: Option<String> = row.try_get("cover_image")?;
    Ok(Book {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        pages: row.try_get("pages")?,
        rating: row.try_get("rating")?,
        status: status.parse()?,
        published_date: row.try_get("published_date")?,
        read_date: row.try_get("read_date")?,
        cover_image: cover_image.map(CoverImage::new),
        authors: BTreeSet::new(),
    })
}

fn author_from_row(row: &PgRow) -> anyhow::Result<Author> {
    Ok(Author {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        last_name: row.try_get("last_name")?,
    })
}

/// `ILIKE` pattern matching `needle` literally anywhere in the value.
fn contains_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, spec: &QuerySpec) {
    if let Some(title) = &spec.title {
        qb.push(" WHERE title ILIKE ");
        qb.push_bind(contains_pattern(title));
    }
}

fn order_column(sort: SortField) -> &'static str {
    match sort {
        // byte order, matching the in-memory store
        SortField::Title => "title COLLATE \"C\"",
        other => other.as_str(),
    }
}

#[async_trait]
impl BookStore for PostgresBookStore {
    async fn ping(&self) -> anyhow::Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn count(&self, spec: &QuerySpec) -> anyhow::Result<usize> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS total FROM books");
        push_filter(&mut qb, spec);
        let row = qb.build().fetch_one(&self.pool).await?;
        let total: i64 = row.try_get("total")?;
        Ok(usize::try_from(total)?)
    }

    async fn fetch(&self, spec: &QuerySpec, offset: usize, limit: usize) -> anyhow::Result<Vec<Book>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM books", BOOK_COLUMNS));
        push_filter(&mut qb, spec);
        let direction = match spec.direction {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        };
        qb.push(format!(
            " ORDER BY {} {}, id ASC LIMIT ",
            order_column(spec.sort),
            direction
        ));
        qb.push_bind(i64::try_from(limit)?);
        qb.push(" OFFSET ");
        qb.push_bind(i64::try_from(offset)?);

        let rows = qb.build().fetch_all(&self.pool).await?;
        let books = rows.iter().map(book_from_row).collect::<anyhow::Result<Vec<_>>>()?;
        self.attach_authors(books).await
    }

    async fn all(&self) -> anyhow::Result<Vec<Book>> {
        let rows = sqlx::query(&format!("SELECT {} FROM books ORDER BY id", BOOK_COLUMNS))
            .fetch_all(&self.pool)
            .await?;
        let books = rows.iter().map(book_from_row).collect::<anyhow::Result<Vec<_>>>()?;
        self.attach_authors(books).await
    }

    async fn get(&self, id: BookId) -> anyhow::Result<Option<Book>> {
        let row = sqlx::query(&format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let book = book_from_row(&row)?;
        Ok(self.attach_authors(vec![book]).await?.pop())
    }

    async fn insert(&self, draft: BookDraft) -> anyhow::Result<Book> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "INSERT INTO books (title, pages, rating, status, published_date, read_date, cover_image)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id",
        )
        .bind(&draft.title)
        .bind(draft.pages)
        .bind(draft.rating)
        .bind(draft.status.code())
        .bind(draft.published_date)
        .bind(draft.read_date)
        .bind(draft.cover_image.as_ref().map(|c| c.name.as_str()))
        .fetch_one(tx.as_mut())
        .await?;
        let id: BookId = row.try_get("id")?;
        Self::replace_authors(&mut tx, id, &draft.authors).await?;
        tx.commit().await?;
        Ok(draft.into_book(id))
    }

    async fn update(&self, id: BookId, draft: BookDraft) -> anyhow::Result<Option<Book>> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE books
             SET title = $2, pages = $3, rating = $4, status = $5,
                 published_date = $6, read_date = $7, cover_image = $8
             WHERE id = $1",
        )
        .bind(id)
        .bind(&draft.title)
        .bind(draft.pages)
        .bind(draft.rating)
        .bind(draft.status.code())
        .bind(draft.published_date)
        .bind(draft.read_date)
        .bind(draft.cover_image.as_ref().map(|c| c.name.as_str()))
        .execute(tx.as_mut())
        .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }
        Self::replace_authors(&mut tx, id, &draft.authors).await?;
        tx.commit().await?;
        Ok(Some(draft.into_book(id)))
    }

    async fn delete(&self, id: BookId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn authors(&self) -> anyhow::Result<Vec<Author>> {
        let rows = sqlx::query("SELECT id, name, last_name FROM authors ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(author_from_row).collect()
    }

    async fn authors_by_ids(&self, ids: &BTreeSet<AuthorId>) -> anyhow::Result<Vec<Author>> {
        let ids: Vec<AuthorId> = ids.iter().copied().collect();
        let rows = sqlx::query("SELECT id, name, last_name FROM authors WHERE id = ANY($1) ORDER BY id")
            .bind(&ids)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(author_from_row).collect()
    }

    async fn insert_author(&self, draft: AuthorDraft) -> anyhow::Result<Author> {
        let row = sqlx::query("INSERT INTO authors (name, last_name) VALUES ($1, $2) RETURNING id")
            .bind(&draft.name)
            .bind(&draft.last_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(Author {
            id: row.try_get("id")?,
            name: draft.name,
            last_name: draft.last_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(contains_pattern("50%_off\\"), "%50\\%\\_off\\\\%");
        assert_eq!(contains_pattern("dune"), "%dune%");
    }
}
