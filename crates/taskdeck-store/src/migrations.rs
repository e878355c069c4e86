use anyhow::Result;
use rusqlite::Connection;

/// Idempotent schema setup. Timestamps are stored as fixed-width RFC 3339
/// text (microsecond precision, Z suffix) so range predicates compare
/// correctly as strings.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            name            TEXT NOT NULL,
            email           TEXT NOT NULL,
            email_opt_out   TEXT NOT NULL DEFAULT '[]'
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id                 TEXT PRIMARY KEY,
            title              TEXT NOT NULL,
            description        TEXT NOT NULL DEFAULT '',
            status             TEXT NOT NULL,
            priority           TEXT NOT NULL,
            due_at             TEXT,
            assignee           TEXT,
            creator            TEXT NOT NULL,
            tags               TEXT NOT NULL DEFAULT '[]',
            notified_due_soon  TEXT,
            notified_overdue   TEXT,
            created_at         TEXT NOT NULL,
            updated_at         TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_due_at ON tasks(due_at);
        CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);

        CREATE TABLE IF NOT EXISTS notifications (
            id             TEXT PRIMARY KEY,
            user_id        TEXT NOT NULL,
            kind           TEXT NOT NULL,
            priority       TEXT NOT NULL,
            title          TEXT NOT NULL,
            message        TEXT NOT NULL,
            entity_type    TEXT,
            entity_id      TEXT,
            related        TEXT NOT NULL DEFAULT '[]',
            data           TEXT NOT NULL DEFAULT 'null',
            read           INTEGER NOT NULL DEFAULT 0,
            email_sent     INTEGER NOT NULL DEFAULT 0,
            email_sent_at  TEXT,
            created_at     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at);

        CREATE TABLE IF NOT EXISTS chats (
            id           TEXT PRIMARY KEY,
            user_id      TEXT NOT NULL,
            title        TEXT NOT NULL,
            last_active  TEXT NOT NULL,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_chats_user ON chats(user_id, last_active);

        CREATE TABLE IF NOT EXISTS chat_messages (
            chat_id    TEXT NOT NULL,
            seq        INTEGER NOT NULL,
            role       TEXT NOT NULL,
            content    TEXT NOT NULL,
            timestamp  TEXT NOT NULL,
            PRIMARY KEY (chat_id, seq)
        );
        "#,
    )?;
    Ok(())
}
