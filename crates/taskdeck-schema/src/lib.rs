use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Completed and cancelled tasks are never candidates for reminders.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Per-task record of which reminder kinds already fired and when.
/// A kind re-fires only once strictly more than 24h have passed since the
/// recorded timestamp. Only the due-date monitor writes these.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationMarkers {
    #[serde(default)]
    pub due_soon: Option<DateTime<Utc>>,
    #[serde(default)]
    pub overdue: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assignee: Option<Uuid>,
    pub creator: Uuid,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notified: NotificationMarkers,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(title: impl Into<String>, creator: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            due_at: None,
            assignee: None,
            creator,
            tags: vec![],
            notified: NotificationMarkers::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_due_at(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn with_assignee(mut self, assignee: Uuid) -> Self {
        self.assignee = Some(assignee);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskAssigned,
    TaskDue,
    TaskOverdue,
    MentionedInComment,
    TeamMemberAdded,
    TeamMemberRemoved,
    TeamLeaderChanged,
    RecurringTaskGenerated,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskAssigned => "task_assigned",
            Self::TaskDue => "task_due",
            Self::TaskOverdue => "task_overdue",
            Self::MentionedInComment => "mentioned_in_comment",
            Self::TeamMemberAdded => "team_member_added",
            Self::TeamMemberRemoved => "team_member_removed",
            Self::TeamLeaderChanged => "team_leader_changed",
            Self::RecurringTaskGenerated => "recurring_task_generated",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "task_assigned" => Some(Self::TaskAssigned),
            "task_due" => Some(Self::TaskDue),
            "task_overdue" => Some(Self::TaskOverdue),
            "mentioned_in_comment" => Some(Self::MentionedInComment),
            "team_member_added" => Some(Self::TeamMemberAdded),
            "team_member_removed" => Some(Self::TeamMemberRemoved),
            "team_leader_changed" => Some(Self::TeamLeaderChanged),
            "recurring_task_generated" => Some(Self::RecurringTaskGenerated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    #[default]
    Normal,
    High,
    Urgent,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "urgent" => Some(Self::Urgent),
            _ => None,
        }
    }
}

/// Reference to the entity a notification is about (a task, a team, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRef {
    pub entity_type: String,
    pub id: Uuid,
}

impl EntityRef {
    pub fn task(id: Uuid) -> Self {
        Self {
            entity_type: "task".to_string(),
            id,
        }
    }

    pub fn team(id: Uuid) -> Self {
        Self {
            entity_type: "team".to_string(),
            id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub entity: Option<EntityRef>,
    #[serde(default)]
    pub related: Vec<EntityRef>,
    #[serde(default)]
    pub data: serde_json::Value,
    pub read: bool,
    pub email_sent: bool,
    #[serde(default)]
    pub email_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatHistory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub last_active: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    /// Notification kinds this user refuses email for.
    #[serde(default)]
    pub email_opt_out: Vec<NotificationKind>,
}

impl User {
    pub fn opted_out(&self, kind: NotificationKind) -> bool {
        self.email_opt_out.contains(&kind)
    }
}

/// Structured task suggestion extracted from free text by the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_round_trips_through_strings() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(TaskStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TaskStatus::parse("bogus"), None);
    }

    #[test]
    fn open_statuses() {
        assert!(TaskStatus::Pending.is_open());
        assert!(TaskStatus::InProgress.is_open());
        assert!(!TaskStatus::Completed.is_open());
        assert!(!TaskStatus::Cancelled.is_open());
    }

    #[test]
    fn notification_kind_serde_names_are_snake_case() {
        let json = serde_json::to_string(&NotificationKind::TaskOverdue).unwrap();
        assert_eq!(json, "\"task_overdue\"");
        let kind: NotificationKind = serde_json::from_str("\"team_leader_changed\"").unwrap();
        assert_eq!(kind, NotificationKind::TeamLeaderChanged);
    }

    #[test]
    fn markers_default_to_unset() {
        let task = Task::new("write report", Uuid::new_v4());
        assert!(task.notified.due_soon.is_none());
        assert!(task.notified.overdue.is_none());
    }

    #[test]
    fn user_opt_out_check() {
        let user = User {
            id: Uuid::new_v4(),
            name: "ada".into(),
            email: "ada@example.com".into(),
            email_opt_out: vec![NotificationKind::TaskDue],
        };
        assert!(user.opted_out(NotificationKind::TaskDue));
        assert!(!user.opted_out(NotificationKind::TaskOverdue));
    }

    #[test]
    fn task_builder_helpers() {
        let assignee = Uuid::new_v4();
        let task = Task::new("t", Uuid::new_v4())
            .with_assignee(assignee)
            .with_priority(Priority::Urgent);
        assert_eq!(task.assignee, Some(assignee));
        assert_eq!(task.priority, Priority::Urgent);
    }
}
