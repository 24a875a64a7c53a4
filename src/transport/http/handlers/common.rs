use crate::domain::authz::{Action, Caller};
use crate::domain::book::BookId;
use crate::transport::http::types::{ApiResponse, AppState};
use axum::extract::rejection::PathRejection;
use axum::extract::Path;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Resolves the `Authorization: Bearer <key>` header to a caller.
/// A missing, malformed or unknown key is anonymous.
pub fn caller_from_headers(state: &AppState, headers: &HeaderMap) -> Caller {
    let key = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|k| !k.is_empty());
    state.api_keys.resolve(key)
}

/// Resolves the caller and runs the authorization gate for `action` before
/// any path or body is decoded.
pub fn gate(state: &AppState, headers: &HeaderMap, action: Action) -> Result<Caller, Response> {
    let caller = caller_from_headers(state, headers);
    state
        .catalog
        .gate(&caller, action)
        .map(|()| caller)
        .map_err(IntoResponse::into_response)
}

/// Serializes `body` into a success envelope with `status`.
pub fn respond<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_value(body) {
        Ok(data) => (status, Json(ApiResponse::ok(data))).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "response serialization failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::failure("Internal server error", None)),
            )
                .into_response()
        }
    }
}

/// Ids that are not integers name no book.
pub fn book_id(path: Result<Path<BookId>, PathRejection>) -> Result<BookId, Response> {
    path.map(|Path(id)| id).map_err(|e| {
        (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::failure(format!("book not found ({})", e), None)),
        )
            .into_response()
    })
}
