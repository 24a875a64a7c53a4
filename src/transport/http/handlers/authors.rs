use crate::domain::book::AuthorDraft;
use crate::domain::authz::Action;
use crate::transport::http::handlers::common::{gate, respond};
use crate::transport::http::types::{json_422, AppState, AuthorRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    get,
    path = "/api/authors",
    responses(
        (status = 200, description = "All authors", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn list_authors_handler(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let caller = match gate(&state, &headers, Action::ReadAuthors) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    match state.catalog.authors(&caller).await {
        Ok(authors) => respond(StatusCode::OK, &authors),
        Err(e) => e.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/api/authors",
    request_body = AuthorRequest,
    responses(
        (status = 201, description = "Author created", body = crate::transport::http::types::ApiResponse),
        (status = 400, description = "Field errors under data.errors", body = crate::transport::http::types::ApiResponse),
        (status = 401, description = "Missing or unknown API key", body = crate::transport::http::types::ApiResponse),
        (status = 403, description = "Caller lacks add_author", body = crate::transport::http::types::ApiResponse),
        (status = 422, description = "Unprocessable entity (invalid JSON body)", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn create_author_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Result<Json<AuthorRequest>, JsonRejection>,
) -> impl IntoResponse {
    let caller = match gate(&state, &headers, Action::CreateAuthor) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    let Json(request) = match request {
        Ok(v) => v,
        Err(e) => return json_422(e, "{\"name\": ..., \"last_name\": ...}").into_response(),
    };
    let draft = AuthorDraft {
        name: request.name,
        last_name: request.last_name,
    };
    match state.catalog.create_author(&caller, draft).await {
        Ok(author) => respond(StatusCode::CREATED, &author),
        Err(e) => e.into_response(),
    }
}
