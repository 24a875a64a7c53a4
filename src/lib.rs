pub mod app;
pub mod domain;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::catalog_service::{CatalogError, CatalogResult, CatalogService};
pub use domain::authz::{Caller, Permission};
pub use domain::book::{Author, Book, BookView, ReadingStatus};
pub use infra::auth::ApiKeys;
pub use infra::config::CatalogConfig;
pub use storage::books::{BookStore, MemoryBookStore, PostgresBookStore};
pub use storage::covers::{CoverStore, DirectoryCoverStore, MemoryCoverStore};
