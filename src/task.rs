// Task data model

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// `datetime-local` shapes, interpreted in the local time zone
const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Stable task identifier, assigned once at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// One to-do record
///
/// Serialized as `{"title", "desc", "deadline", "completed", "id"}`. The deadline
/// is kept verbatim as entered; it is parsed on demand. Records without a
/// deadline read as having an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    #[serde(rename = "desc")]
    pub description: String,
    #[serde(default)]
    pub deadline: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub id: TaskId,
}

impl Task {
    /// Parsed deadline, `None` when absent or unparseable
    pub fn deadline_at(&self) -> Option<DateTime<Utc>> {
        parse_deadline(&self.deadline)
    }

    /// Deadline present, strictly in the past, and the task not completed
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.deadline_at().is_some_and(|deadline| deadline < now)
    }
}

/// A task as seen through a listing: its current position plus derived status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskView {
    pub position: usize,
    #[serde(flatten)]
    pub task: Task,
    pub overdue: bool,
}

impl TaskView {
    pub fn new(position: usize, task: Task, now: DateTime<Utc>) -> Self {
        let overdue = task.is_overdue(now);
        Self { position, task, overdue }
    }

    /// Plain-text projection used for searching
    pub fn display_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TaskView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.task.completed {
            write!(f, "[DONE]  ")?;
        }
        write!(f, "{} - {}", self.task.title, self.task.description)?;
        if !self.task.deadline.is_empty() {
            write!(f, " (Deadline: {})", self.task.deadline)?;
        }
        if self.overdue {
            write!(f, " Overdue!")?;
        }
        Ok(())
    }
}

/// Parse deadline text: RFC 3339, or a local `datetime-local` value
pub fn parse_deadline(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    LOCAL_FORMATS.iter().find_map(|format| {
        let naive = NaiveDateTime::parse_from_str(text, format).ok()?;
        // Nonexistent local times (DST gaps) have no mapping
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn task(deadline: &str, completed: bool) -> Task {
        Task {
            title: "Buy groceries for week".to_string(),
            description: "Milk eggs bread cheese and other weekly essentials needed".to_string(),
            deadline: deadline.to_string(),
            completed,
            id: TaskId::new(),
        }
    }

    fn at(text: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(text).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_parse_rfc3339() {
        let parsed = parse_deadline("2026-10-16T12:00:00+02:00").unwrap();
        assert_eq!(parsed, at("2026-10-16T10:00:00Z"));
    }

    #[test]
    fn test_parse_datetime_local() {
        let expected = Local
            .with_ymd_and_hms(2026, 3, 1, 9, 30, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);

        assert_eq!(parse_deadline("2026-03-01T09:30"), Some(expected));
        assert_eq!(parse_deadline("2026-03-01T09:30:00"), Some(expected));
        assert_eq!(parse_deadline("2026-03-01 09:30"), Some(expected));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_deadline(""), None);
        assert_eq!(parse_deadline("   "), None);
        assert_eq!(parse_deadline("next tuesday"), None);
        assert_eq!(parse_deadline("2026-13-01T09:30"), None);
    }

    #[test]
    fn test_overdue_when_past_and_incomplete() {
        let now = at("2026-10-16T12:00:00Z");
        assert!(task("2026-10-16T11:59:59Z", false).is_overdue(now));
        assert!(!task("2026-10-16T12:00:00Z", false).is_overdue(now));
        assert!(!task("2026-10-16T12:00:01Z", false).is_overdue(now));
    }

    #[test]
    fn test_completed_is_never_overdue() {
        let now = at("2026-10-16T12:00:00Z");
        assert!(!task("2020-01-01T00:00:00Z", true).is_overdue(now));
    }

    #[test]
    fn test_missing_or_unparseable_deadline_is_never_overdue() {
        let now = at("2026-10-16T12:00:00Z");
        assert!(!task("", false).is_overdue(now));
        assert!(!task("someday", false).is_overdue(now));
    }

    #[test]
    fn test_view_follows_clock() {
        let now = at("2026-10-16T12:00:00Z");
        let deadline = (now + Duration::hours(1)).to_rfc3339();
        let task = task(&deadline, false);

        assert!(!TaskView::new(0, task.clone(), now).overdue);
        assert!(TaskView::new(0, task, now + Duration::hours(2)).overdue);
    }

    #[test]
    fn test_display_text() {
        let now = at("2026-10-16T12:00:00Z");

        let open = TaskView::new(0, task("2026-10-16T11:00:00Z", false), now);
        assert_eq!(
            open.display_text(),
            "Buy groceries for week - Milk eggs bread cheese and other weekly essentials needed \
             (Deadline: 2026-10-16T11:00:00Z) Overdue!"
        );

        let done = TaskView::new(1, task("2026-10-16T11:00:00Z", true), now);
        assert!(done.display_text().starts_with("[DONE]  Buy groceries"));
        assert!(!done.display_text().contains("Overdue!"));
    }

    #[test]
    fn test_serialized_field_names() {
        let task = task("2026-10-16T11:00", false);
        let value = serde_json::to_value(&task).unwrap();

        assert_eq!(value["title"], "Buy groceries for week");
        assert_eq!(value["desc"], "Milk eggs bread cheese and other weekly essentials needed");
        assert_eq!(value["deadline"], "2026-10-16T11:00");
        assert_eq!(value["completed"], false);
        assert_eq!(value["id"], task.id.to_string());
        assert!(value.get("description").is_none());
    }

    #[test]
    fn test_deserialize_without_deadline() {
        let task: Task = serde_json::from_str(
            r#"{"title":"Buy groceries for week","desc":"Milk eggs bread cheese and other weekly essentials needed"}"#,
        )
        .unwrap();

        assert_eq!(task.deadline, "");
        assert!(!task.completed);
        assert!(!task.is_overdue(at("2026-10-16T12:00:00Z")));
    }

    #[test]
    fn test_task_id_parse() {
        let id = TaskId::new();
        let parsed: TaskId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<TaskId>().is_err());
    }
}
