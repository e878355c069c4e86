pub mod chats;
pub mod notifications;
pub mod tasks;

use axum::http::{HeaderMap, StatusCode};
use axum::Router;
use uuid::Uuid;

use crate::state::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/tasks", tasks::router())
        .nest("/notifications", notifications::router())
        .nest("/chats", chats::router())
}

/// Every API route is scoped to the caller named by the `x-user-id` header.
pub(crate) fn require_user(headers: &HeaderMap) -> Result<Uuid, StatusCode> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or(StatusCode::UNAUTHORIZED)
}

pub(crate) fn internal(e: anyhow::Error) -> StatusCode {
    tracing::error!(error = %e, "request failed");
    StatusCode::INTERNAL_SERVER_ERROR
}
