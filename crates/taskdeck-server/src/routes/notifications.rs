use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use taskdeck_schema::Notification;

use crate::routes::{internal, require_user};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Hard ceiling on page size. Also keeps an absurd query value from
/// wrapping negative when the store casts it to a SQL integer.
const MAX_LIMIT: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications).delete(clear_notifications))
        .route("/unread_count", get(unread_count))
        .route("/{id}/read", post(mark_read))
}

async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<Notification>>, StatusCode> {
    let user = require_user(&headers)?;
    let notifications = state
        .store
        .list_notifications(user, query.limit.min(MAX_LIMIT))
        .await
        .map_err(internal)?;
    Ok(Json(notifications))
}

async fn unread_count(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let user = require_user(&headers)?;
    let count = state.store.unread_count(user).await.map_err(internal)?;
    Ok(Json(serde_json::json!({ "unread": count })))
}

async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let user = require_user(&headers)?;
    let marked = state.store.mark_read(id, user).await.map_err(internal)?;
    if !marked {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(serde_json::json!({ "status": "read", "id": id })))
}

async fn clear_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let user = require_user(&headers)?;
    let cleared = state
        .store
        .clear_notifications(user)
        .await
        .map_err(internal)?;
    Ok(Json(serde_json::json!({ "cleared": cleared })))
}
