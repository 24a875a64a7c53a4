use crate::domain::authz::Action;
use crate::domain::book::BookId;
use crate::domain::query::RawParams;
use crate::domain::validation::BookForm;
use crate::storage::covers::content_type;
use crate::transport::http::handlers::common::{book_id, gate, respond};
use crate::transport::http::types::{json_422, AppState};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{Map, Value as JsonValue};

const BOOK_BODY: &str = "{\"title\": ..., \"pages\": ..., \"rating\": ..., \"status\": ..., \"published_date\": ...}";

#[utoipa::path(
    get,
    path = "/api/books",
    params(
        ("title" = Option<String>, Query, description = "Case-insensitive title substring"),
        ("sort" = Option<String>, Query, description = "title | pages | rating | status | published_date"),
        ("direction" = Option<String>, Query, description = "asc (default) | desc"),
        ("page" = Option<String>, Query, description = "1-based page number or `last`")
    ),
    responses(
        (status = 200, description = "One page of books plus pagination and render metadata", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn list_books_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> impl IntoResponse {
    let caller = match gate(&state, &headers, Action::ReadList) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    let params = match query {
        Ok(Query(pairs)) => RawParams::new(pairs),
        Err(e) => {
            tracing::debug!(error = %e, "unparseable query string, using defaults");
            RawParams::default()
        }
    };
    match state.catalog.list(&caller, &params).await {
        Ok(view) => respond(StatusCode::OK, &view),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/books/{id}",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book detail", body = crate::transport::http::types::ApiResponse),
        (status = 401, description = "Missing or unknown API key", body = crate::transport::http::types::ApiResponse),
        (status = 404, description = "No such book", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn get_book_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<BookId>, PathRejection>,
) -> impl IntoResponse {
    let caller = match gate(&state, &headers, Action::ReadDetail) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    let id = match book_id(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.catalog.detail(&caller, id).await {
        Ok(book) => respond(StatusCode::OK, &book),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/books",
    request_body = crate::transport::http::types::BookRequest,
    responses(
        (status = 201, description = "Book created", body = crate::transport::http::types::ApiResponse),
        (status = 400, description = "Field errors under data.errors", body = crate::transport::http::types::ApiResponse),
        (status = 401, description = "Missing or unknown API key", body = crate::transport::http::types::ApiResponse),
        (status = 403, description = "Caller lacks add_book", body = crate::transport::http::types::ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn create_book_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Result<Json<Map<String, JsonValue>>, JsonRejection>,
) -> impl IntoResponse {
    let caller = match gate(&state, &headers, Action::Create) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    let Json(fields) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, BOOK_BODY).into_response(),
    };
    match state.catalog.create(&caller, BookForm::new(fields)).await {
        Ok(book) => respond(StatusCode::CREATED, &book),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/books/{id}",
    params(("id" = i64, Path, description = "Book id")),
    request_body = crate::transport::http::types::BookRequest,
    responses(
        (status = 200, description = "Book updated; omitted fields keep their values", body = crate::transport::http::types::ApiResponse),
        (status = 400, description = "Field errors under data.errors", body = crate::transport::http::types::ApiResponse),
        (status = 401, description = "Missing or unknown API key", body = crate::transport::http::types::ApiResponse),
        (status = 403, description = "Caller lacks change_book", body = crate::transport::http::types::ApiResponse),
        (status = 404, description = "No such book", body = crate::transport::http::types::ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn update_book_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<BookId>, PathRejection>,
    request: Result<Json<Map<String, JsonValue>>, JsonRejection>,
) -> impl IntoResponse {
    let caller = match gate(&state, &headers, Action::Update) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    let id = match book_id(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let Json(fields) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, BOOK_BODY).into_response(),
    };
    match state.catalog.update(&caller, id, BookForm::new(fields)).await {
        Ok(book) => respond(StatusCode::OK, &book),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/books/{id}/delete",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "Book deleted", body = crate::transport::http::types::ApiResponse),
        (status = 401, description = "Missing or unknown API key", body = crate::transport::http::types::ApiResponse),
        (status = 403, description = "Caller lacks delete_book", body = crate::transport::http::types::ApiResponse),
        (status = 404, description = "No such book", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn delete_book_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<BookId>, PathRejection>,
) -> impl IntoResponse {
    let caller = match gate(&state, &headers, Action::Delete) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    let id = match book_id(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.catalog.delete(&caller, id).await {
        Ok(()) => respond(StatusCode::OK, &serde_json::json!({ "deleted": id })),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/books/{id}/cover",
    params(("id" = i64, Path, description = "Book id")),
    responses(
        (status = 200, description = "Raw cover image bytes with an image content type"),
        (status = 401, description = "Missing or unknown API key", body = crate::transport::http::types::ApiResponse),
        (status = 404, description = "No such book, or the book has no cover", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn get_cover_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<BookId>, PathRejection>,
) -> impl IntoResponse {
    let caller = match gate(&state, &headers, Action::ReadDetail) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    let id = match book_id(path) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match state.catalog.cover(&caller, id).await {
        Ok((image, content)) => {
            ([(header::CONTENT_TYPE, content_type(&image))], content).into_response()
        }
        Err(e) => e.into_response(),
    }
}
