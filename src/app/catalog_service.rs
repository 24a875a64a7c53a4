//! The catalog service.
//!
//! Every operation follows the same path: the authorization gate first, then
//! (for writes) form cleaning and validation, then the record store. Reads of
//! the list go through the query builder; statistics are computed from a
//! snapshot of the collection.

use crate::domain::authz::{authorize, Action, AuthorizationError, Caller};
use crate::domain::book::{Author, AuthorDraft, Book, BookId, BookView, CoverImage};
use crate::domain::query::{build_view, ListView, RawParams};
use crate::domain::stats::{compute_stats, Stats};
use crate::domain::validation::form::{invalid_choice, MSG_REQUIRED};
use crate::domain::validation::{BookForm, CleanedBook, CoverChange, FieldErrors};
use crate::storage::books::BookStore;
use crate::storage::covers::CoverStore;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error("book {0} not found")]
    NotFound(BookId),

    #[error("book {0} has no cover image")]
    NoCover(BookId),

    #[error("store failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl From<FieldErrors> for CatalogError {
    fn from(errors: FieldErrors) -> Self {
        Self::Validation(errors)
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

pub struct CatalogService {
    books: Arc<dyn BookStore>,
    covers: Arc<dyn CoverStore>,
}

impl CatalogService {
    pub fn new(books: Arc<dyn BookStore>, covers: Arc<dyn CoverStore>) -> Self {
        Self { books, covers }
    }

    pub fn store(&self) -> &dyn BookStore {
        self.books.as_ref()
    }

    /// The authorization gate. Operations call it themselves; transports call
    /// it before decoding a request so that denied callers learn nothing
    /// about their input.
    pub fn gate(&self, caller: &Caller, action: Action) -> CatalogResult<()> {
        authorize(caller, action).map_err(|e| {
            tracing::info!(
                user = caller.username().unwrap_or("<anonymous>"),
                %action,
                reason = %e,
                "request denied"
            );
            CatalogError::from(e)
        })
    }

    pub async fn list(&self, caller: &Caller, params: &RawParams) -> CatalogResult<ListView<BookView>> {
        self.gate(caller, Action::ReadList)?;
        let view = build_view(self.books.as_ref(), params).await?;
        let authors = self.books.authors().await?;
        Ok(view.map(|book| BookView::new(book, &authors)))
    }

    pub async fn detail(&self, caller: &Caller, id: BookId) -> CatalogResult<BookView> {
        self.gate(caller, Action::ReadDetail)?;
        let book = self.books.get(id).await?.ok_or(CatalogError::NotFound(id))?;
        self.render(book).await
    }

    pub async fn cover(&self, caller: &Caller, id: BookId) -> CatalogResult<(CoverImage, Vec<u8>)> {
        self.gate(caller, Action::ReadDetail)?;
        let book = self.books.get(id).await?.ok_or(CatalogError::NotFound(id))?;
        let image = book.cover_image.ok_or(CatalogError::NoCover(id))?;
        let content = self
            .covers
            .load(&image)
            .await?
            .ok_or(CatalogError::NoCover(id))?;
        Ok((image, content))
    }

    pub async fn create(&self, caller: &Caller, form: BookForm) -> CatalogResult<BookView> {
        self.gate(caller, Action::Create)?;
        let cleaned = self.clean(&form).await?;
        let uploaded = self.upload(&cleaned.cover).await?;
        let cover = resolve_cover(&cleaned.cover, &uploaded, None);
        let book = match self.books.insert(cleaned.into_draft(cover)).await {
            Ok(book) => book,
            Err(e) => {
                self.discard(uploaded).await;
                return Err(e.into());
            }
        };
        tracing::info!(id = book.id, title = %book.title, "book created");
        self.render(book).await
    }

    /// Updates book `id`. Omitted fields keep their stored values, and the
    /// merged record is validated as a whole.
    pub async fn update(&self, caller: &Caller, id: BookId, incoming: BookForm) -> CatalogResult<BookView> {
        self.gate(caller, Action::Update)?;
        let existing = self.books.get(id).await?.ok_or(CatalogError::NotFound(id))?;
        let merged = BookForm::from_book(&existing).overlay(incoming);
        let cleaned = self.clean(&merged).await?;
        let uploaded = self.upload(&cleaned.cover).await?;
        let cover = resolve_cover(&cleaned.cover, &uploaded, existing.cover_image);
        let book = match self.books.update(id, cleaned.into_draft(cover)).await {
            Ok(Some(book)) => book,
            // deleted since it was read
            Ok(None) => {
                self.discard(uploaded).await;
                return Err(CatalogError::NotFound(id));
            }
            Err(e) => {
                self.discard(uploaded).await;
                return Err(e.into());
            }
        };
        tracing::info!(id, "book updated");
        self.render(book).await
    }

    pub async fn delete(&self, caller: &Caller, id: BookId) -> CatalogResult<()> {
        self.gate(caller, Action::Delete)?;
        if !self.books.delete(id).await? {
            return Err(CatalogError::NotFound(id));
        }
        tracing::info!(id, "book deleted");
        Ok(())
    }

    pub async fn stats(&self, caller: &Caller) -> CatalogResult<Stats> {
        self.gate(caller, Action::ViewStats)?;
        let books = self.books.all().await?;
        Ok(compute_stats(&books))
    }

    pub async fn authors(&self, caller: &Caller) -> CatalogResult<Vec<Author>> {
        self.gate(caller, Action::ReadAuthors)?;
        Ok(self.books.authors().await?)
    }

    pub async fn create_author(&self, caller: &Caller, draft: AuthorDraft) -> CatalogResult<Author> {
        self.gate(caller, Action::CreateAuthor)?;
        let mut errors = FieldErrors::new();
        if draft.name.trim().is_empty() {
            errors.add("name", MSG_REQUIRED);
        }
        if draft.last_name.trim().is_empty() {
            errors.add("last_name", MSG_REQUIRED);
        }
        errors.into_result()?;
        let author = self
            .books
            .insert_author(AuthorDraft {
                name: draft.name.trim().to_string(),
                last_name: draft.last_name.trim().to_string(),
            })
            .await?;
        tracing::info!(id = author.id, "author created");
        Ok(author)
    }

    /// Cleans the form and checks that every referenced author exists.
    async fn clean(&self, form: &BookForm) -> CatalogResult<CleanedBook> {
        let cleaned = form.clean()?;
        let known = self.books.authors_by_ids(&cleaned.authors).await?;
        let mut errors = FieldErrors::new();
        for id in &cleaned.authors {
            if !known.iter().any(|a| a.id == *id) {
                errors.add("authors", invalid_choice(id));
            }
        }
        errors.into_result()?;
        Ok(cleaned)
    }

    /// Stores a newly uploaded cover, if the form carries one.
    async fn upload(&self, change: &CoverChange) -> CatalogResult<Option<CoverImage>> {
        match change {
            CoverChange::Upload(upload) => Ok(Some(
                self.covers
                    .save(&upload.filename, upload.content.clone())
                    .await?,
            )),
            CoverChange::Keep | CoverChange::Clear => Ok(None),
        }
    }

    /// Drops a blob whose record write failed.
    async fn discard(&self, uploaded: Option<CoverImage>) {
        let Some(image) = uploaded else { return };
        if let Err(e) = self.covers.delete(&image).await {
            tracing::warn!(cover = %image.name, error = %format!("{e:#}"), "orphaned cover blob");
        }
    }

    async fn render(&self, book: Book) -> CatalogResult<BookView> {
        let authors = self.books.authors_by_ids(&book.authors).await?;
        Ok(BookView::new(book, &authors))
    }
}

fn resolve_cover(
    change: &CoverChange,
    uploaded: &Option<CoverImage>,
    current: Option<CoverImage>,
) -> Option<CoverImage> {
    match change {
        CoverChange::Keep => current,
        CoverChange::Clear => None,
        CoverChange::Upload(_) => uploaded.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::authz::Permission;
    use crate::domain::validation::MSG_READ_BEFORE_PUBLISHED;
    use crate::storage::books::MemoryBookStore;
    use crate::domain::book::{AuthorId, BookDraft};
    use std::collections::BTreeSet;
    use crate::domain::query::QuerySpec;
    use crate::storage::covers::MemoryCoverStore;
    use serde_json::{json, Value as JsonValue};

    /// Record store whose book writes always fail.
    struct BrokenWrites(MemoryBookStore);

    #[async_trait::async_trait]
    impl BookStore for BrokenWrites {
        async fn ping(&self) -> anyhow::Result<()> {
            self.0.ping().await
        }
        async fn count(&self, spec: &QuerySpec) -> anyhow::Result<usize> {
            self.0.count(spec).await
        }
        async fn fetch(&self, spec: &QuerySpec, offset: usize, limit: usize) -> anyhow::Result<Vec<Book>> {
            self.0.fetch(spec, offset, limit).await
        }
        async fn all(&self) -> anyhow::Result<Vec<Book>> {
            self.0.all().await
        }
        async fn get(&self, id: BookId) -> anyhow::Result<Option<Book>> {
            self.0.get(id).await
        }
        async fn insert(&self, _: BookDraft) -> anyhow::Result<Book> {
            anyhow::bail!("disk full")
        }
        async fn update(&self, _: BookId, _: BookDraft) -> anyhow::Result<Option<Book>> {
            anyhow::bail!("disk full")
        }
        async fn delete(&self, id: BookId) -> anyhow::Result<bool> {
            self.0.delete(id).await
        }
        async fn authors(&self) -> anyhow::Result<Vec<Author>> {
            self.0.authors().await
        }
        async fn authors_by_ids(&self, ids: &BTreeSet<AuthorId>) -> anyhow::Result<Vec<Author>> {
            self.0.authors_by_ids(ids).await
        }
        async fn insert_author(&self, draft: AuthorDraft) -> anyhow::Result<Author> {
            self.0.insert_author(draft).await
        }
    }

    fn service() -> CatalogService {
        CatalogService::new(Arc::new(MemoryBookStore::new()), Arc::new(MemoryCoverStore::new()))
    }

    fn admin() -> Caller {
        Caller::user("admin", Permission::ALL)
    }

    fn form(v: JsonValue) -> BookForm {
        match v {
            JsonValue::Object(map) => BookForm::new(map),
            other => panic!("not an object: {other}"),
        }
    }

    fn valid() -> BookForm {
        form(json!({
            "title": "Persuasion",
            "pages": 249,
            "rating": 4,
            "status": "TR",
            "published_date": "1817-12-20"
        }))
    }

    #[tokio::test]
    async fn view_only_caller_cannot_create() {
        let catalog = service();
        let viewer = Caller::user("viewer", [Permission::ViewBook]);
        let err = catalog.create(&viewer, valid()).await.unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Authorization(AuthorizationError::Forbidden { .. })
        ));
        assert!(catalog.store().all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_twice_is_not_found() {
        let catalog = service();
        let book = catalog.create(&admin(), valid()).await.unwrap();
        catalog.delete(&admin(), book.id).await.unwrap();
        let err = catalog.delete(&admin(), book.id).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(id) if id == book.id));
    }

    #[tokio::test]
    async fn update_validates_the_merged_record() {
        let catalog = service();
        let book = catalog.create(&admin(), valid()).await.unwrap();

        let err = catalog
            .update(&admin(), book.id, form(json!({ "read_date": "1800-01-01" })))
            .await
            .unwrap_err();
        match err {
            CatalogError::Validation(errors) => {
                assert!(errors.contains("read_date", MSG_READ_BEFORE_PUBLISHED))
            }
            other => panic!("unexpected {other:?}"),
        }

        let updated = catalog
            .update(&admin(), book.id, form(json!({ "status": "RE", "read_date": "2001-02-03" })))
            .await
            .unwrap();
        assert_eq!(updated.title, "Persuasion");
        assert_eq!(updated.status_label, "Read");
    }

    #[tokio::test]
    async fn anonymous_callers_see_list_and_stats_but_not_details() {
        let catalog = service();
        let book = catalog.create(&admin(), valid()).await.unwrap();

        let anonymous = catalog.list(&Caller::Anonymous, &RawParams::default()).await.unwrap();
        let other = catalog
            .list(&Caller::authenticated("other"), &RawParams::default())
            .await
            .unwrap();
        assert_eq!(anonymous.items.len(), 1);
        assert_eq!(anonymous.pagination, other.pagination);

        let stats = catalog.stats(&Caller::Anonymous).await.unwrap();
        assert_eq!(stats.avg_pages, 249.0);

        let err = catalog.detail(&Caller::Anonymous, book.id).await.unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Authorization(AuthorizationError::Unauthenticated { .. })
        ));
        let err = catalog.create(&Caller::Anonymous, valid()).await.unwrap_err();
        assert!(matches!(
            err,
            CatalogError::Authorization(AuthorizationError::Unauthenticated { .. })
        ));
    }

    #[tokio::test]
    async fn failed_writes_leave_no_cover_blob() {
        let covers = Arc::new(MemoryCoverStore::new());
        let catalog = CatalogService::new(Arc::new(BrokenWrites(MemoryBookStore::new())), covers.clone());
        let with_cover = valid().overlay(form(json!({
            "cover_image": { "filename": "front.png", "content_base64": "eA==" }
        })));

        let err = catalog.create(&admin(), with_cover).await.unwrap_err();
        assert!(matches!(err, CatalogError::Store(_)));
        assert_eq!(covers.load(&CoverImage::new("covers/front.png")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn cover_missing_is_no_cover() {
        let catalog = service();
        let book = catalog.create(&admin(), valid()).await.unwrap();
        let err = catalog.cover(&admin(), book.id).await.unwrap_err();
        assert!(matches!(err, CatalogError::NoCover(_)));
    }
}
