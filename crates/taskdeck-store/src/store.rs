use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::task;
use uuid::Uuid;

use taskdeck_schema::{
    ChatHistory, ChatMessage, EntityRef, Notification, NotificationKind, NotificationPriority,
    Priority, Role, Task, TaskStatus,
};

/// How far ahead the due-soon window reaches, and how long a fired
/// notification marker suppresses a re-fire.
pub fn reminder_window() -> Duration {
    Duration::hours(24)
}

/// Chat list entry without the message bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: Uuid,
    pub title: String,
    pub last_active: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
}

#[derive(Clone)]
pub struct Store {
    db: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        crate::migrations::run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        crate::migrations::run_migrations(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    // ============================================================
    // Users
    // ============================================================

    pub async fn insert_user(&self, user: taskdeck_schema::User) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let opt_out = serde_json::to_string(&user.email_opt_out)?;
            let conn = lock(&db)?;
            conn.execute(
                "INSERT INTO users (id, name, email, email_opt_out) VALUES (?1, ?2, ?3, ?4)",
                params![user.id.to_string(), user.name, user.email, opt_out],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    pub async fn get_user(&self, id: Uuid) -> Result<Option<taskdeck_schema::User>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let mut stmt = conn.prepare(
                "SELECT id, name, email, email_opt_out FROM users WHERE id = ?1 LIMIT 1",
            )?;
            let user = stmt
                .query_row(params![id.to_string()], row_to_user)
                .optional()?;
            Ok::<Option<taskdeck_schema::User>, anyhow::Error>(user)
        })
        .await?
    }

    // ============================================================
    // Tasks
    // ============================================================

    pub async fn insert_task(&self, task: Task) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let tags = serde_json::to_string(&task.tags)?;
            let conn = lock(&db)?;
            conn.execute(
                r#"
                INSERT INTO tasks (
                    id, title, description, status, priority, due_at, assignee, creator,
                    tags, notified_due_soon, notified_overdue, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
                params![
                    task.id.to_string(),
                    task.title,
                    task.description,
                    task.status.as_str(),
                    task.priority.as_str(),
                    task.due_at.map(fmt_ts),
                    task.assignee.map(|a| a.to_string()),
                    task.creator.to_string(),
                    tags,
                    task.notified.due_soon.map(fmt_ts),
                    task.notified.overdue.map(fmt_ts),
                    fmt_ts(task.created_at),
                    fmt_ts(task.updated_at),
                ],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1 LIMIT 1"
            ))?;
            let task = stmt
                .query_row(params![id.to_string()], row_to_task)
                .optional()?;
            Ok::<Option<Task>, anyhow::Error>(task)
        })
        .await?
    }

    pub async fn list_tasks(&self, creator_or_assignee: Uuid) -> Result<Vec<Task>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE creator = ?1 OR assignee = ?1
                 ORDER BY created_at DESC"
            ))?;
            let id = creator_or_assignee.to_string();
            let rows = stmt.query_map(params![id], row_to_task)?;
            collect_rows(rows)
        })
        .await?
    }

    pub async fn update_task_status(&self, id: Uuid, status: TaskStatus) -> Result<bool> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let affected = conn.execute(
                "UPDATE tasks SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), status.as_str(), fmt_ts(Utc::now())],
            )?;
            Ok::<bool, anyhow::Error>(affected > 0)
        })
        .await?
    }

    /// Open tasks due in the half-open window `(now, now + 24h]` whose
    /// due-soon marker is absent or older than `now - 24h`.
    pub async fn due_soon_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE status IN ('pending', 'in_progress')
                   AND due_at IS NOT NULL
                   AND due_at > ?1
                   AND due_at <= ?2
                   AND (notified_due_soon IS NULL OR notified_due_soon < ?3)
                 ORDER BY due_at ASC"
            ))?;
            let rows = stmt.query_map(
                params![
                    fmt_ts(now),
                    fmt_ts(now + reminder_window()),
                    fmt_ts(now - reminder_window())
                ],
                row_to_task,
            )?;
            collect_rows(rows)
        })
        .await?
    }

    /// Open tasks with `due_at < now` whose overdue marker is absent or
    /// older than `now - 24h`.
    pub async fn overdue_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {TASK_COLUMNS} FROM tasks
                 WHERE status IN ('pending', 'in_progress')
                   AND due_at IS NOT NULL
                   AND due_at < ?1
                   AND (notified_overdue IS NULL OR notified_overdue < ?2)
                 ORDER BY due_at ASC"
            ))?;
            let rows = stmt.query_map(
                params![fmt_ts(now), fmt_ts(now - reminder_window())],
                row_to_task,
            )?;
            collect_rows(rows)
        })
        .await?
    }

    pub async fn stamp_due_soon(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.stamp_marker(id, "notified_due_soon", at).await
    }

    pub async fn stamp_overdue(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.stamp_marker(id, "notified_overdue", at).await
    }

    async fn stamp_marker(&self, id: Uuid, column: &'static str, at: DateTime<Utc>) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            conn.execute(
                &format!("UPDATE tasks SET {column} = ?2 WHERE id = ?1"),
                params![id.to_string(), fmt_ts(at)],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    // ============================================================
    // Notifications
    // ============================================================

    pub async fn insert_notification(&self, n: Notification) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let related = serde_json::to_string(&n.related)?;
            let data = serde_json::to_string(&n.data)?;
            let conn = lock(&db)?;
            conn.execute(
                r#"
                INSERT INTO notifications (
                    id, user_id, kind, priority, title, message, entity_type, entity_id,
                    related, data, read, email_sent, email_sent_at, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                "#,
                params![
                    n.id.to_string(),
                    n.user_id.to_string(),
                    n.kind.as_str(),
                    n.priority.as_str(),
                    n.title,
                    n.message,
                    n.entity.as_ref().map(|e| e.entity_type.clone()),
                    n.entity.as_ref().map(|e| e.id.to_string()),
                    related,
                    data,
                    n.read as i64,
                    n.email_sent as i64,
                    n.email_sent_at.map(fmt_ts),
                    fmt_ts(n.created_at),
                ],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    pub async fn get_notification(&self, id: Uuid) -> Result<Option<Notification>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1 LIMIT 1"
            ))?;
            let n = stmt
                .query_row(params![id.to_string()], row_to_notification)
                .optional()?;
            Ok::<Option<Notification>, anyhow::Error>(n)
        })
        .await?
    }

    pub async fn list_notifications(&self, user_id: Uuid, limit: usize) -> Result<Vec<Notification>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![user_id.to_string(), limit as i64], row_to_notification)?;
            collect_rows(rows)
        })
        .await?
    }

    /// Flip the read flag. Returns false when the notification does not
    /// exist or belongs to someone else (callers translate to not-found).
    pub async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let affected = conn.execute(
                "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id.to_string()],
            )?;
            Ok::<bool, anyhow::Error>(affected > 0)
        })
        .await?
    }

    pub async fn mark_email_sent(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            conn.execute(
                "UPDATE notifications SET email_sent = 1, email_sent_at = ?2 WHERE id = ?1",
                params![id.to_string(), fmt_ts(at)],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<usize> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let count: i64 = conn.query_row(
                "SELECT COUNT(1) FROM notifications WHERE user_id = ?1 AND read = 0",
                params![user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok::<usize, anyhow::Error>(count as usize)
        })
        .await?
    }

    /// Bulk user-initiated clear; the only way notifications are deleted.
    pub async fn clear_notifications(&self, user_id: Uuid) -> Result<usize> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let affected = conn.execute(
                "DELETE FROM notifications WHERE user_id = ?1",
                params![user_id.to_string()],
            )?;
            Ok::<usize, anyhow::Error>(affected)
        })
        .await?
    }

    // ============================================================
    // Chats
    // ============================================================

    pub async fn create_chat(&self, user_id: Uuid, title: &str) -> Result<ChatHistory> {
        let db = Arc::clone(&self.db);
        let now = Utc::now();
        let chat = ChatHistory {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_owned(),
            messages: vec![],
            last_active: now,
            created_at: now,
        };
        let row = chat.clone();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            conn.execute(
                "INSERT INTO chats (id, user_id, title, last_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    row.id.to_string(),
                    row.user_id.to_string(),
                    row.title,
                    fmt_ts(row.last_active),
                    fmt_ts(row.created_at),
                ],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(chat)
    }

    /// Owner-checked load. A chat owned by someone else reads as absent.
    pub async fn get_chat(&self, id: Uuid, user_id: Uuid) -> Result<Option<ChatHistory>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let mut stmt = conn.prepare(
                "SELECT id, user_id, title, last_active, created_at
                 FROM chats WHERE id = ?1 AND user_id = ?2 LIMIT 1",
            )?;
            let meta = stmt
                .query_row(params![id.to_string(), user_id.to_string()], |row| {
                    let id_raw: String = row.get(0)?;
                    let user_raw: String = row.get(1)?;
                    let last_active_raw: String = row.get(3)?;
                    let created_raw: String = row.get(4)?;
                    Ok(ChatHistory {
                        id: parse_uuid_sql(&id_raw)?,
                        user_id: parse_uuid_sql(&user_raw)?,
                        title: row.get(2)?,
                        messages: vec![],
                        last_active: parse_datetime_sql(&last_active_raw)?,
                        created_at: parse_datetime_sql(&created_raw)?,
                    })
                })
                .optional()?;

            let Some(mut chat) = meta else {
                return Ok::<Option<ChatHistory>, anyhow::Error>(None);
            };

            let mut stmt = conn.prepare(
                "SELECT role, content, timestamp FROM chat_messages
                 WHERE chat_id = ?1 ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(params![id.to_string()], |row| {
                let role_raw: String = row.get(0)?;
                let ts_raw: String = row.get(2)?;
                Ok(ChatMessage {
                    role: Role::parse(&role_raw).unwrap_or(Role::User),
                    content: row.get(1)?,
                    timestamp: parse_datetime_sql(&ts_raw)?,
                })
            })?;
            for row in rows {
                chat.messages.push(row?);
            }
            Ok(Some(chat))
        })
        .await?
    }

    /// Append one message and bump the chat's last-active timestamp.
    pub async fn append_chat_message(&self, chat_id: Uuid, message: ChatMessage) -> Result<()> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let next_seq: i64 = conn.query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM chat_messages WHERE chat_id = ?1",
                params![chat_id.to_string()],
                |row| row.get(0),
            )?;
            conn.execute(
                "INSERT INTO chat_messages (chat_id, seq, role, content, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    chat_id.to_string(),
                    next_seq,
                    message.role.as_str(),
                    message.content,
                    fmt_ts(message.timestamp),
                ],
            )?;
            conn.execute(
                "UPDATE chats SET last_active = ?2 WHERE id = ?1",
                params![chat_id.to_string(), fmt_ts(Utc::now())],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    pub async fn set_chat_title(&self, chat_id: Uuid, title: &str) -> Result<()> {
        let db = Arc::clone(&self.db);
        let title = title.to_owned();
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            conn.execute(
                "UPDATE chats SET title = ?2 WHERE id = ?1",
                params![chat_id.to_string(), title],
            )?;
            Ok::<(), anyhow::Error>(())
        })
        .await??;
        Ok(())
    }

    pub async fn list_chats(&self, user_id: Uuid) -> Result<Vec<ChatSummary>> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let mut stmt = conn.prepare(
                "SELECT c.id, c.title, c.last_active, c.created_at,
                        (SELECT COUNT(1) FROM chat_messages m WHERE m.chat_id = c.id)
                 FROM chats c
                 WHERE c.user_id = ?1
                 ORDER BY c.last_active DESC",
            )?;
            let rows = stmt.query_map(params![user_id.to_string()], |row| {
                let id_raw: String = row.get(0)?;
                let last_active_raw: String = row.get(2)?;
                let created_raw: String = row.get(3)?;
                let count: i64 = row.get(4)?;
                Ok(ChatSummary {
                    id: parse_uuid_sql(&id_raw)?,
                    title: row.get(1)?,
                    last_active: parse_datetime_sql(&last_active_raw)?,
                    created_at: parse_datetime_sql(&created_raw)?,
                    message_count: count as usize,
                })
            })?;
            collect_rows(rows)
        })
        .await?
    }

    /// Owner-checked delete. Returns false when nothing was removed.
    pub async fn delete_chat(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            let affected = conn.execute(
                "DELETE FROM chats WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user_id.to_string()],
            )?;
            if affected > 0 {
                conn.execute(
                    "DELETE FROM chat_messages WHERE chat_id = ?1",
                    params![id.to_string()],
                )?;
            }
            Ok::<bool, anyhow::Error>(affected > 0)
        })
        .await?
    }

    pub async fn clear_chats(&self, user_id: Uuid) -> Result<usize> {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let conn = lock(&db)?;
            conn.execute(
                "DELETE FROM chat_messages WHERE chat_id IN
                 (SELECT id FROM chats WHERE user_id = ?1)",
                params![user_id.to_string()],
            )?;
            let affected = conn.execute(
                "DELETE FROM chats WHERE user_id = ?1",
                params![user_id.to_string()],
            )?;
            Ok::<usize, anyhow::Error>(affected)
        })
        .await?
    }
}

const TASK_COLUMNS: &str = "id, title, description, status, priority, due_at, assignee, creator, \
                            tags, notified_due_soon, notified_overdue, created_at, updated_at";

const NOTIFICATION_COLUMNS: &str = "id, user_id, kind, priority, title, message, entity_type, \
                                    entity_id, related, data, read, email_sent, email_sent_at, \
                                    created_at";

fn lock(db: &Arc<Mutex<Connection>>) -> Result<std::sync::MutexGuard<'_, Connection>> {
    db.lock().map_err(|_| anyhow!("failed to lock sqlite connection"))
}

fn collect_rows<T>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Fixed-width UTC timestamp so string comparison matches time order.
fn fmt_ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime_sql(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_uuid_sql(raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let id_raw: String = row.get(0)?;
    let status_raw: String = row.get(3)?;
    let priority_raw: String = row.get(4)?;
    let due_at_raw: Option<String> = row.get(5)?;
    let assignee_raw: Option<String> = row.get(6)?;
    let creator_raw: String = row.get(7)?;
    let tags_raw: String = row.get(8)?;
    let due_soon_raw: Option<String> = row.get(9)?;
    let overdue_raw: Option<String> = row.get(10)?;
    let created_raw: String = row.get(11)?;
    let updated_raw: String = row.get(12)?;

    let tags: Vec<String> = serde_json::from_str(&tags_raw).unwrap_or_default();

    Ok(Task {
        id: parse_uuid_sql(&id_raw)?,
        title: row.get(1)?,
        description: row.get(2)?,
        status: TaskStatus::parse(&status_raw).unwrap_or(TaskStatus::Pending),
        priority: Priority::parse(&priority_raw).unwrap_or(Priority::Medium),
        due_at: due_at_raw.as_deref().map(parse_datetime_sql).transpose()?,
        assignee: assignee_raw.as_deref().map(parse_uuid_sql).transpose()?,
        creator: parse_uuid_sql(&creator_raw)?,
        tags,
        notified: taskdeck_schema::NotificationMarkers {
            due_soon: due_soon_raw.as_deref().map(parse_datetime_sql).transpose()?,
            overdue: overdue_raw.as_deref().map(parse_datetime_sql).transpose()?,
        },
        created_at: parse_datetime_sql(&created_raw)?,
        updated_at: parse_datetime_sql(&updated_raw)?,
    })
}

fn row_to_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let id_raw: String = row.get(0)?;
    let user_raw: String = row.get(1)?;
    let kind_raw: String = row.get(2)?;
    let priority_raw: String = row.get(3)?;
    let entity_type: Option<String> = row.get(6)?;
    let entity_id_raw: Option<String> = row.get(7)?;
    let related_raw: String = row.get(8)?;
    let data_raw: String = row.get(9)?;
    let read: i64 = row.get(10)?;
    let email_sent: i64 = row.get(11)?;
    let email_sent_at_raw: Option<String> = row.get(12)?;
    let created_raw: String = row.get(13)?;

    let entity = match (entity_type, entity_id_raw) {
        (Some(entity_type), Some(id_raw)) => Some(EntityRef {
            entity_type,
            id: parse_uuid_sql(&id_raw)?,
        }),
        _ => None,
    };
    let related: Vec<EntityRef> = serde_json::from_str(&related_raw).unwrap_or_default();
    let data: serde_json::Value = serde_json::from_str(&data_raw).unwrap_or(serde_json::Value::Null);

    Ok(Notification {
        id: parse_uuid_sql(&id_raw)?,
        user_id: parse_uuid_sql(&user_raw)?,
        kind: NotificationKind::parse(&kind_raw).unwrap_or(NotificationKind::TaskAssigned),
        priority: NotificationPriority::parse(&priority_raw).unwrap_or_default(),
        title: row.get(4)?,
        message: row.get(5)?,
        entity,
        related,
        data,
        read: read != 0,
        email_sent: email_sent != 0,
        email_sent_at: email_sent_at_raw
            .as_deref()
            .map(parse_datetime_sql)
            .transpose()?,
        created_at: parse_datetime_sql(&created_raw)?,
    })
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<taskdeck_schema::User> {
    let id_raw: String = row.get(0)?;
    let opt_out_raw: String = row.get(3)?;
    let email_opt_out: Vec<NotificationKind> =
        serde_json::from_str(&opt_out_raw).unwrap_or_default();
    Ok(taskdeck_schema::User {
        id: parse_uuid_sql(&id_raw)?,
        name: row.get(1)?,
        email: row.get(2)?,
        email_opt_out,
    })
}
