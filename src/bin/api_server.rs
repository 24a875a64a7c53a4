// src/bin/api_server.rs

use book_catalog::infra::config::CatalogConfig;
use book_catalog::storage::books::{BookStore, MemoryBookStore, PostgresBookStore};
use book_catalog::storage::covers::{CoverStore, DirectoryCoverStore, MemoryCoverStore};
use book_catalog::transport;
use book_catalog::CatalogService;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = CatalogConfig::from_env()?;
    if config.api_keys.is_empty() {
        tracing::warn!("CATALOG_API_KEYS is empty; every request will be anonymous");
    }

    // --- Record store ---
    let books: Arc<dyn BookStore> = match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresBookStore::connect(url, config.database_max_connections).await?;
            store.ensure_schema().await?;
            tracing::info!(max_connections = config.database_max_connections, "using PostgreSQL record store");
            Arc::new(store)
        }
        None => {
            tracing::info!("DATABASE_URL unset, using in-memory record store");
            Arc::new(MemoryBookStore::new())
        }
    };

    // --- Cover blobs ---
    let covers: Arc<dyn CoverStore> = match config.cover_dir.as_ref() {
        Some(dir) => {
            tokio::fs::create_dir_all(dir).await?;
            let store = DirectoryCoverStore::new(dir.clone());
            tracing::info!(dir = %store.root().display(), "storing covers on disk");
            Arc::new(store)
        }
        None => {
            tracing::info!("COVER_DIR unset, storing covers in memory");
            Arc::new(MemoryCoverStore::new())
        }
    };

    let app_state = transport::http::AppState {
        catalog: Arc::new(CatalogService::new(books, covers)),
        api_keys: Arc::new(config.api_keys.clone()),
    };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    let app = transport::http::create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()))
        .layer(cors);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "API server listening (Swagger UI at /swagger-ui)");

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
