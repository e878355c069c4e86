use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use taskdeck_schema::{Priority, Task, TaskStatus};

use crate::routes::{internal, require_user};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignee: Option<Uuid>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatus {
    pub status: TaskStatus,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_task).get(list_tasks))
        .route("/{id}", get(get_task))
        .route("/{id}/status", patch(update_status))
}

async fn create_task(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateTask>,
) -> Result<(StatusCode, Json<Task>), StatusCode> {
    let user = require_user(&headers)?;
    if body.title.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut task = Task::new(body.title.trim(), user);
    if let Some(description) = body.description {
        task.description = description;
    }
    task.due_at = body.due_at;
    task.assignee = body.assignee;
    if let Some(priority) = body.priority {
        task.priority = priority;
    }
    task.tags = body.tags;

    state.store.insert_task(task.clone()).await.map_err(internal)?;

    // Assigning to yourself is not news.
    if let Some(assignee) = task.assignee {
        if assignee != user {
            state
                .dispatcher
                .notify_task_assigned(assignee, task.id, &task.title)
                .await;
        }
    }

    Ok((StatusCode::CREATED, Json(task)))
}

async fn list_tasks(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Task>>, StatusCode> {
    let user = require_user(&headers)?;
    let tasks = state.store.list_tasks(user).await.map_err(internal)?;
    Ok(Json(tasks))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Task>, StatusCode> {
    let user = require_user(&headers)?;
    let task = load_visible_task(&state, id, user).await?;
    Ok(Json(task))
}

async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<UpdateStatus>,
) -> Result<Json<Task>, StatusCode> {
    let user = require_user(&headers)?;
    load_visible_task(&state, id, user).await?;

    let updated = state
        .store
        .update_task_status(id, body.status)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(StatusCode::NOT_FOUND);
    }
    let task = state
        .store
        .get_task(id)
        .await
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(task))
}

/// Tasks are visible to their creator and their assignee; everyone else
/// sees a 404 rather than a hint that the id exists.
async fn load_visible_task(state: &AppState, id: Uuid, user: Uuid) -> Result<Task, StatusCode> {
    let task = state
        .store
        .get_task(id)
        .await
        .map_err(internal)?
        .ok_or(StatusCode::NOT_FOUND)?;
    if task.creator != user && task.assignee != Some(user) {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(task)
}
