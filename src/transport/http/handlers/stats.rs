use crate::domain::authz::Action;
use crate::transport::http::handlers::common::{gate, respond};
use crate::transport::http::types::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

#[utoipa::path(
    get,
    path = "/api/stats",
    responses(
        (status = 200, description = "Page extremes, averages and status/rating distributions", body = crate::transport::http::types::ApiResponse)
    )
)]
pub async fn stats_handler(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let caller = match gate(&state, &headers, Action::ViewStats) {
        Ok(caller) => caller,
        Err(resp) => return resp,
    };
    match state.catalog.stats(&caller).await {
        Ok(stats) => respond(StatusCode::OK, &stats),
        Err(e) => e.into_response(),
    }
}
