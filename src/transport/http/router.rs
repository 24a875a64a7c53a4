use crate::transport::http::handlers::{authors, books, health, stats};
use crate::transport::http::types::{ApiResponse, AppState, AuthorRequest, BookRequest};
use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        books::list_books_handler,
        books::get_book_handler,
        books::create_book_handler,
        books::update_book_handler,
        books::delete_book_handler,
        books::get_cover_handler,
        stats::stats_handler,
        authors::list_authors_handler,
        authors::create_author_handler
    ),
    components(schemas(ApiResponse, BookRequest, AuthorRequest))
)]
pub struct ApiDoc;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route(
            "/api/books",
            get(books::list_books_handler).post(books::create_book_handler),
        )
        .route(
            "/api/books/:id",
            get(books::get_book_handler).post(books::update_book_handler),
        )
        .route("/api/books/:id/delete", post(books::delete_book_handler))
        .route("/api/books/:id/cover", get(books::get_cover_handler))
        .route("/api/stats", get(stats::stats_handler))
        .route(
            "/api/authors",
            get(authors::list_authors_handler).post(authors::create_author_handler),
        )
        .with_state(app_state)
}
