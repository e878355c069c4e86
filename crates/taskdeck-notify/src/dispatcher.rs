use chrono::{DateTime, Utc};
use uuid::Uuid;

use taskdeck_mailer::{Email, Mailer};
use taskdeck_schema::{
    EntityRef, Notification, NotificationKind, NotificationPriority,
};
use taskdeck_store::Store;

use crate::background::BackgroundTasks;
use crate::templates::email_content;

#[derive(Debug, Clone)]
pub struct CreateNotification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    pub entity: Option<EntityRef>,
    pub related: Vec<EntityRef>,
    pub data: serde_json::Value,
    pub send_email: bool,
}

impl CreateNotification {
    pub fn new(
        user_id: Uuid,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            kind,
            priority: NotificationPriority::Normal,
            title: title.into(),
            message: message.into(),
            entity: None,
            related: vec![],
            data: serde_json::Value::Null,
            send_email: false,
        }
    }

    pub fn priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn entity(mut self, entity: EntityRef) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn send_email(mut self, send_email: bool) -> Self {
        self.send_email = send_email;
        self
    }
}

/// Persists notifications and hands the optional email off to a background
/// task. Never fails the caller: a store error yields `None` with a log
/// line, and nothing on the email path is awaited inline.
#[derive(Clone)]
pub struct Dispatcher {
    store: Store,
    mailer: Mailer,
    tasks: BackgroundTasks,
    base_url: String,
}

impl Dispatcher {
    pub fn new(store: Store, mailer: Mailer, base_url: impl Into<String>) -> Self {
        Self {
            store,
            mailer,
            tasks: BackgroundTasks::new(),
            base_url: base_url.into(),
        }
    }

    /// Background task sink; tests drain it to await email completion.
    pub fn background(&self) -> &BackgroundTasks {
        &self.tasks
    }

    pub async fn create_notification(&self, req: CreateNotification) -> Option<Notification> {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id: req.user_id,
            kind: req.kind,
            priority: req.priority,
            title: req.title,
            message: req.message,
            entity: req.entity,
            related: req.related,
            data: req.data,
            read: false,
            email_sent: false,
            email_sent_at: None,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.insert_notification(notification.clone()).await {
            tracing::error!(
                user_id = %notification.user_id,
                kind = notification.kind.as_str(),
                error = %e,
                "failed to persist notification"
            );
            return None;
        }

        if req.send_email {
            // Email is queued after the DB write so a slow or broken mail
            // path never blocks notification creation.
            self.submit_email(notification.clone());
        }

        Some(notification)
    }

    fn submit_email(&self, notification: Notification) {
        let store = self.store.clone();
        let mailer = self.mailer.clone();
        let base_url = self.base_url.clone();

        self.tasks.submit(async move {
            if let Err(e) = deliver_email(&store, &mailer, &base_url, &notification).await {
                tracing::warn!(
                    notification_id = %notification.id,
                    error = %e,
                    "notification email not delivered"
                );
            }
        });
    }

    // ============================================================
    // Typed wrappers
    // ============================================================

    pub async fn notify_task_assigned(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        task_title: &str,
    ) -> Option<Notification> {
        self.create_notification(
            CreateNotification::new(
                user_id,
                NotificationKind::TaskAssigned,
                "New task assigned",
                format!("You have been assigned \"{task_title}\""),
            )
            .entity(EntityRef::task(task_id))
            .send_email(true),
        )
        .await
    }

    pub async fn notify_task_due(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        task_title: &str,
        due_at: DateTime<Utc>,
    ) -> Option<Notification> {
        self.create_notification(
            CreateNotification::new(
                user_id,
                NotificationKind::TaskDue,
                "Task due soon",
                format!(
                    "\"{task_title}\" is due {}",
                    due_at.format("%Y-%m-%d %H:%M UTC")
                ),
            )
            .priority(NotificationPriority::High)
            .entity(EntityRef::task(task_id))
            .send_email(true),
        )
        .await
    }

    pub async fn notify_task_overdue(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        task_title: &str,
        due_at: DateTime<Utc>,
    ) -> Option<Notification> {
        self.create_notification(
            CreateNotification::new(
                user_id,
                NotificationKind::TaskOverdue,
                "Task overdue",
                format!(
                    "\"{task_title}\" was due {}",
                    due_at.format("%Y-%m-%d %H:%M UTC")
                ),
            )
            .priority(NotificationPriority::Urgent)
            .entity(EntityRef::task(task_id))
            .send_email(true),
        )
        .await
    }

    pub async fn notify_mentioned_in_comment(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        task_title: &str,
        author: &str,
    ) -> Option<Notification> {
        self.create_notification(
            CreateNotification::new(
                user_id,
                NotificationKind::MentionedInComment,
                "You were mentioned",
                format!("{author} mentioned you on \"{task_title}\""),
            )
            .entity(EntityRef::task(task_id))
            .send_email(true),
        )
        .await
    }

    pub async fn notify_team_member_added(
        &self,
        user_id: Uuid,
        team_id: Uuid,
        team_name: &str,
    ) -> Option<Notification> {
        self.create_notification(
            CreateNotification::new(
                user_id,
                NotificationKind::TeamMemberAdded,
                "Added to team",
                format!("You were added to team \"{team_name}\""),
            )
            .entity(EntityRef::team(team_id))
            .send_email(true),
        )
        .await
    }

    pub async fn notify_team_member_removed(
        &self,
        user_id: Uuid,
        team_id: Uuid,
        team_name: &str,
    ) -> Option<Notification> {
        self.create_notification(
            CreateNotification::new(
                user_id,
                NotificationKind::TeamMemberRemoved,
                "Removed from team",
                format!("You were removed from team \"{team_name}\""),
            )
            .entity(EntityRef::team(team_id))
            .send_email(true),
        )
        .await
    }

    pub async fn notify_team_leader_changed(
        &self,
        user_id: Uuid,
        team_id: Uuid,
        team_name: &str,
        leader: &str,
    ) -> Option<Notification> {
        self.create_notification(
            CreateNotification::new(
                user_id,
                NotificationKind::TeamLeaderChanged,
                "Team leader changed",
                format!("{leader} now leads team \"{team_name}\""),
            )
            .entity(EntityRef::team(team_id))
            .send_email(true),
        )
        .await
    }

    /// Recurring-task generation deliberately skips email.
    pub async fn notify_recurring_task_generated(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        task_title: &str,
    ) -> Option<Notification> {
        self.create_notification(
            CreateNotification::new(
                user_id,
                NotificationKind::RecurringTaskGenerated,
                "Recurring task created",
                format!("A new instance of \"{task_title}\" was created"),
            )
            .entity(EntityRef::task(task_id))
            .send_email(false),
        )
        .await
    }
}

async fn deliver_email(
    store: &Store,
    mailer: &Mailer,
    base_url: &str,
    notification: &Notification,
) -> anyhow::Result<()> {
    let Some(user) = store.get_user(notification.user_id).await? else {
        tracing::debug!(user_id = %notification.user_id, "no user record, skipping email");
        return Ok(());
    };
    if user.opted_out(notification.kind) {
        tracing::debug!(
            user_id = %user.id,
            kind = notification.kind.as_str(),
            "user opted out of this email kind"
        );
        return Ok(());
    }

    // Re-read the record: another path may have emailed it already.
    let current = store.get_notification(notification.id).await?;
    if current.map(|n| n.email_sent).unwrap_or(false) {
        return Ok(());
    }

    let content = email_content(
        notification.kind,
        &notification.title,
        &notification.message,
        notification.entity.as_ref(),
        base_url,
    );

    mailer
        .send(Email::new(&user.email, content.subject, content.html))
        .await?;
    store
        .mark_email_sent(notification.id, Utc::now())
        .await?;
    Ok(())
}
