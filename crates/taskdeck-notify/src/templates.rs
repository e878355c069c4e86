use taskdeck_schema::{EntityRef, NotificationKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
}

/// Pure kind -> email content mapping. Kinds without a dedicated template
/// fall back to the notification's own title and message.
pub fn email_content(
    kind: NotificationKind,
    title: &str,
    message: &str,
    entity: Option<&EntityRef>,
    base_url: &str,
) -> EmailContent {
    let task_url = entity
        .map(|e| format!("{base_url}/{}s/{}", e.entity_type, e.id))
        .unwrap_or_else(|| base_url.to_string());

    // The notification title doubles as the subject line; the body varies
    // by kind.
    let html = match kind {
        NotificationKind::TaskAssigned => format!(
            "<h2>You have a new task</h2><p>{message}</p>\
             <p><a href=\"{{task_url}}\">Open the task</a></p>"
        ),
        NotificationKind::TaskDue => format!(
            "<h2>A task is due within 24 hours</h2><p>{message}</p>\
             <p><a href=\"{{task_url}}\">Open the task</a></p>"
        ),
        NotificationKind::TaskOverdue => format!(
            "<h2>A task is overdue</h2><p>{message}</p>\
             <p><a href=\"{{task_url}}\">Open the task</a></p>"
        ),
        NotificationKind::MentionedInComment => format!(
            "<h2>Someone mentioned you in a comment</h2><p>{message}</p>\
             <p><a href=\"{{task_url}}\">View the discussion</a></p>"
        ),
        // Team and recurring notifications share the generic shape.
        _ => format!("<h2>{title}</h2><p>{message}</p>"),
    };

    EmailContent {
        subject: title.to_string(),
        html: html.replace("{task_url}", &task_url),
    }
}
