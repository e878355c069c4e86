use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures_core::Stream;
use serde::Deserialize;
use tokio_stream::StreamExt;
use uuid::Uuid;

use taskdeck_chat::TaskExtraction;
use taskdeck_schema::{ChatHistory, ChatMessage, Task, TaskDraft};
use taskdeck_store::ChatSummary;

use crate::routes::{internal, require_user};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateChat {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Deserialize)]
pub struct SendMessage {
    pub content: String,
}

#[derive(Deserialize)]
pub struct ExtractRequest {
    pub text: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_chat).get(list_chats).delete(clear_chats))
        .route("/extract", post(extract_task))
        .route("/confirm", post(confirm_draft))
        .route("/{id}", get(get_chat).delete(delete_chat))
        .route("/{id}/messages", post(send_message))
        .route("/{id}/stream", post(stream_message))
        .route("/{id}/title", post(summarize_title))
}

async fn create_chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateChat>,
) -> Result<(StatusCode, Json<ChatHistory>), StatusCode> {
    let user = require_user(&headers)?;
    let title = body.title.as_deref().unwrap_or("New chat");
    let chat = state.store.create_chat(user, title).await.map_err(internal)?;
    Ok((StatusCode::CREATED, Json(chat)))
}

async fn list_chats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ChatSummary>>, StatusCode> {
    let user = require_user(&headers)?;
    let chats = state.store.list_chats(user).await.map_err(internal)?;
    Ok(Json(chats))
}

async fn get_chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<ChatHistory>, StatusCode> {
    let user = require_user(&headers)?;
    let chat = state
        .store
        .get_chat(id, user)
        .await
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(chat))
}

async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<SendMessage>,
) -> Result<Json<ChatMessage>, StatusCode> {
    let user = require_user(&headers)?;
    ensure_chat_exists(&state, id, user).await?;
    let reply = state
        .chat
        .send_message(id, user, &body.content)
        .await
        .map_err(internal)?;
    Ok(Json(reply))
}

/// Streams the reply as SSE events of `{"delta": ..., "done": ...}`. A
/// provider failure mid-stream becomes a final `{"error": ...}` event.
async fn stream_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<SendMessage>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let user = require_user(&headers)?;
    ensure_chat_exists(&state, id, user).await?;

    let mut inner = state
        .chat
        .stream_message(id, user, &body.content)
        .await
        .map_err(internal)?;

    let stream = async_stream::stream! {
        while let Some(chunk) = inner.next().await {
            match chunk {
                Ok(chunk) => {
                    let payload = serde_json::json!({
                        "delta": chunk.delta,
                        "done": chunk.is_final,
                    });
                    let done = chunk.is_final;
                    yield Ok(Event::default().data(payload.to_string()));
                    if done {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "chat stream failed");
                    let payload = serde_json::json!({ "error": e.to_string() });
                    yield Ok(Event::default().data(payload.to_string()));
                    break;
                }
            }
        }
    };
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn summarize_title(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let user = require_user(&headers)?;
    ensure_chat_exists(&state, id, user).await?;
    let title = state
        .chat
        .summarize_title(id, user)
        .await
        .map_err(internal)?;
    Ok(Json(serde_json::json!({ "title": title })))
}

async fn extract_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ExtractRequest>,
) -> Result<Json<TaskExtraction>, StatusCode> {
    require_user(&headers)?;
    let extraction = state.chat.extract_task(&body.text).await.map_err(internal)?;
    Ok(Json(extraction))
}

async fn confirm_draft(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(draft): Json<TaskDraft>,
) -> Result<(StatusCode, Json<Task>), StatusCode> {
    let user = require_user(&headers)?;
    if draft.title.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let task = state
        .chat
        .confirm_task_draft(user, draft)
        .await
        .map_err(internal)?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn delete_chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let user = require_user(&headers)?;
    let deleted = state.store.delete_chat(id, user).await.map_err(internal)?;
    if !deleted {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(serde_json::json!({ "status": "deleted", "id": id })))
}

async fn clear_chats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let user = require_user(&headers)?;
    let cleared = state.store.clear_chats(user).await.map_err(internal)?;
    Ok(Json(serde_json::json!({ "cleared": cleared })))
}

async fn ensure_chat_exists(state: &AppState, id: Uuid, user: Uuid) -> Result<(), StatusCode> {
    state
        .store
        .get_chat(id, user)
        .await
        .map_err(internal)?
        .map(|_| ())
        .ok_or(StatusCode::NOT_FOUND)
}
