use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use taskdeck_schema::{Priority, TaskDraft};

/// Outcome of asking the model to turn free text into a task. A reply the
/// model botched is not an error: callers get `success = false` and a
/// reason they can show the user.
#[derive(Debug, Clone, Serialize)]
pub struct TaskExtraction {
    pub success: bool,
    pub task: Option<TaskDraft>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskExtraction {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            task: None,
            error: Some(reason.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawExtraction {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "dueDate")]
    due_date: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Turn a model reply into a structured draft. Tolerates markdown code
/// fences and surrounding prose; a missing or empty title is the one
/// field that makes the whole extraction fail.
pub fn parse_extraction(reply: &str) -> TaskExtraction {
    let cleaned = strip_code_fences(reply);
    let raw: Option<RawExtraction> = serde_json::from_str(cleaned).ok().or_else(|| {
        extract_json_object(cleaned).and_then(|obj| serde_json::from_str(obj).ok())
    });

    let Some(raw) = raw else {
        return TaskExtraction::failure("model reply was not valid JSON");
    };
    let Some(title) = raw.title.filter(|t| !t.trim().is_empty()) else {
        return TaskExtraction::failure("model reply did not contain a task title");
    };

    TaskExtraction {
        success: true,
        task: Some(TaskDraft {
            title: title.trim().to_string(),
            description: raw.description.filter(|d| !d.trim().is_empty()),
            due_at: raw.due_date.as_deref().and_then(parse_due_date),
            priority: raw.priority.as_deref().and_then(Priority::parse),
            tags: raw.tags,
            confidence: raw.confidence,
        }),
        error: None,
    }
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Models hand back anything from full RFC 3339 to a bare date. Anything
/// unparseable becomes "no due date" instead of a failed extraction.
fn parse_due_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| DateTime::from_naive_utc_and_offset(ndt, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_json_extraction() {
        let result = parse_extraction(
            r#"{"title": "Ship the report", "priority": "high", "tags": ["q3"]}"#,
        );
        assert!(result.success);
        let task = result.task.unwrap();
        assert_eq!(task.title, "Ship the report");
        assert_eq!(task.priority, Some(Priority::High));
        assert_eq!(task.tags, vec!["q3".to_string()]);
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let result = parse_extraction(
            "```json\n{\"title\": \"Book flights\", \"dueDate\": \"2026-09-01\"}\n```",
        );
        assert!(result.success);
        let task = result.task.unwrap();
        assert_eq!(task.title, "Book flights");
        assert_eq!(
            task.due_at.unwrap().format("%Y-%m-%d").to_string(),
            "2026-09-01"
        );
    }

    #[test]
    fn json_buried_in_prose_is_found() {
        let result = parse_extraction(
            "Sure! Here is the task you asked for: {\"title\": \"Call Dana\"} Let me know.",
        );
        assert!(result.success);
        assert_eq!(result.task.unwrap().title, "Call Dana");
    }

    #[test]
    fn missing_title_is_a_structured_failure() {
        let result = parse_extraction(r#"{"description": "something vague"}"#);
        assert!(!result.success);
        assert!(result.task.is_none());
        assert!(result.error.unwrap().contains("title"));
    }

    #[test]
    fn empty_title_is_a_structured_failure() {
        let result = parse_extraction(r#"{"title": "   "}"#);
        assert!(!result.success);
    }

    #[test]
    fn non_json_reply_is_a_structured_failure() {
        let result = parse_extraction("I could not find a task in that message.");
        assert!(!result.success);
        assert!(result.error.unwrap().contains("JSON"));
    }

    #[test]
    fn unparseable_due_date_becomes_none() {
        let result = parse_extraction(r#"{"title": "Dentist", "dueDate": "next tuesday"}"#);
        assert!(result.success);
        assert!(result.task.unwrap().due_at.is_none());
    }

    #[test]
    fn rfc3339_due_date_is_normalized_to_utc() {
        let result =
            parse_extraction(r#"{"title": "Standup", "dueDate": "2026-09-01T09:00:00+02:00"}"#);
        let due = result.task.unwrap().due_at.unwrap();
        assert_eq!(due.format("%H:%M").to_string(), "07:00");
    }

    #[test]
    fn unknown_priority_is_dropped() {
        let result = parse_extraction(r#"{"title": "T", "priority": "mega"}"#);
        assert!(result.success);
        assert!(result.task.unwrap().priority.is_none());
    }
}
