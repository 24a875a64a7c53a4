use crate::app::catalog_service::{CatalogError, CatalogService};
use crate::domain::authz::AuthorizationError;
use crate::infra::auth::ApiKeys;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<CatalogService>,
    pub api_keys: Arc<ApiKeys>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    pub fn ok(data: JsonValue) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>, data: Option<JsonValue>) -> Self {
        Self {
            success: false,
            data,
            error: Some(error.into()),
        }
    }
}

/// Body of `POST /api/books` and `POST /api/books/{id}`.
///
/// Field values are coerced server-side; `cover_image` is either
/// `{ "filename": ..., "content_base64": ... }` to upload, `null` to clear, or
/// absent to keep the current one.
#[derive(Deserialize, Serialize, Debug, ToSchema)]
pub struct BookRequest {
    #[schema(value_type = Option<String>, example = "Piranesi")]
    pub title: Option<JsonValue>,
    #[schema(value_type = Option<i64>, example = 272)]
    pub pages: Option<JsonValue>,
    #[schema(value_type = Option<i64>, example = 5)]
    pub rating: Option<JsonValue>,
    /// One of `TR` (To read), `RG` (Reading), `RE` (Read).
    #[schema(value_type = Option<String>, example = "RE")]
    pub status: Option<JsonValue>,
    #[schema(value_type = Option<String>, example = "2020-09-15")]
    pub published_date: Option<JsonValue>,
    #[schema(value_type = Option<String>, example = "2021-01-03")]
    pub read_date: Option<JsonValue>,
    #[schema(value_type = Option<Vec<i64>>)]
    pub authors: Option<JsonValue>,
    #[schema(value_type = Option<Object>)]
    pub cover_image: Option<JsonValue>,
}

#[derive(Deserialize, Serialize, Debug, ToSchema)]
pub struct AuthorRequest {
    pub name: String,
    pub last_name: String,
}

pub fn json_422(err: JsonRejection, expected: &str) -> (StatusCode, Json<ApiResponse>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ApiResponse::failure(
            format!("Invalid JSON body: {} (expected: {})", err, expected),
            None,
        )),
    )
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let (status, data) = match &self {
            CatalogError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                Some(serde_json::json!({ "errors": errors })),
            ),
            CatalogError::Authorization(AuthorizationError::Unauthenticated { .. }) => {
                (StatusCode::UNAUTHORIZED, None)
            }
            CatalogError::Authorization(AuthorizationError::Forbidden { .. }) => {
                (StatusCode::FORBIDDEN, None)
            }
            CatalogError::NotFound(_) | CatalogError::NoCover(_) => (StatusCode::NOT_FOUND, None),
            CatalogError::Store(e) => {
                tracing::error!(error = %format!("{e:#}"), "store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };
        let message = match &self {
            CatalogError::Store(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        (status, Json(ApiResponse::failure(message, data))).into_response()
    }
}
