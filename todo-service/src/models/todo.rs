use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use validator::{Validate, ValidationError, ValidationErrors};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

/// A todo as stored in the `todos` collection.
///
/// Field names are camelCase on disk so sort keys coming from the query
/// string map onto document paths one to one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub due_date: Option<BsonDateTime>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Todo {
    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date.map(BsonDateTime::to_chrono)
    }

    /// Past its due date and still open.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.completed && self.due_date().is_some_and(|due| due < now)
    }
}

/// Current time at the precision the store keeps (milliseconds).
pub fn now() -> DateTime<Utc> {
    BsonDateTime::now().to_chrono()
}

fn validate_priority(priority: &str) -> Result<(), ValidationError> {
    if priority.parse::<Priority>().is_ok() {
        return Ok(());
    }
    let mut err = ValidationError::new("priority");
    err.message = Some(Cow::Owned(format!(
        "`{}` is not a valid priority (expected low, medium or high)",
        priority
    )));
    Err(err)
}

/// Input for a new record, checked by the store before it is written.
#[derive(Debug, Clone, Validate)]
pub struct NewTodo {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub description: String,
    #[validate(custom(function = "validate_priority"))]
    pub priority: String,
    pub due_date: Option<DateTime<Utc>>,
}

impl NewTodo {
    /// Validates the input and stamps identifier and timestamps.
    pub fn into_todo(self) -> Result<Todo, ValidationErrors> {
        self.validate()?;
        let now = now();
        Ok(Todo {
            id: ObjectId::new(),
            title: self.title,
            description: self.description,
            completed: false,
            priority: self.priority.parse().unwrap_or_default(),
            due_date: self.due_date.map(BsonDateTime::from_chrono),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Fields to change on an existing record. `None` leaves a field untouched;
/// `due_date: Some(None)` clears the due date.
#[derive(Debug, Clone, Default, Validate)]
pub struct TodoPatch {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl TodoPatch {
    pub fn apply(&self, todo: &mut Todo, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            todo.title = title.clone();
        }
        if let Some(description) = &self.description {
            todo.description = description.clone();
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
        if let Some(priority) = self.priority {
            todo.priority = priority;
        }
        if let Some(due_date) = self.due_date {
            todo.due_date = due_date.map(BsonDateTime::from_chrono);
        }
        todo.updated_at = now;
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TodoStats {
    pub total: u64,
    pub completed: u64,
    pub pending: u64,
    pub overdue: u64,
    pub priority: BTreeMap<String, u64>,
}

impl TodoStats {
    /// Assembles the summary from per-completion and per-priority counts.
    /// Every priority level appears, zero-filled when absent.
    pub fn from_counts(
        completed: u64,
        pending: u64,
        overdue: u64,
        by_priority: impl IntoIterator<Item = (String, u64)>,
    ) -> Self {
        let mut priority: BTreeMap<String, u64> = Priority::ALL
            .iter()
            .map(|p| (p.as_str().to_string(), 0))
            .collect();
        for (level, count) in by_priority {
            *priority.entry(level).or_insert(0) += count;
        }
        Self {
            total: completed + pending,
            completed,
            pending,
            overdue,
            priority,
        }
    }
}

/// Parses a due date the way clients send them: RFC 3339, a naive
/// `YYYY-MM-DDTHH:MM[:SS[.fff]]` taken as UTC, or a bare `YYYY-MM-DD`
/// meaning midnight UTC.
pub fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn new_todo(title: &str, priority: &str) -> NewTodo {
        NewTodo {
            title: title.to_string(),
            description: String::new(),
            priority: priority.to_string(),
            due_date: None,
        }
    }

    #[test]
    fn new_todo_defaults() {
        let todo = new_todo("Buy milk", "medium").into_todo().unwrap();

        assert_eq!(todo.title, "Buy milk");
        assert!(!todo.completed);
        assert_eq!(todo.priority, Priority::Medium);
        assert_eq!(todo.created_at, todo.updated_at);
        assert!(todo.due_date.is_none());
    }

    #[test]
    fn new_todo_rejects_unknown_priority() {
        let err = new_todo("Buy milk", "urgent").into_todo().unwrap_err();
        let messages = service_core::error::validation_messages(&err);

        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("urgent"));
    }

    #[test]
    fn new_todo_rejects_empty_title() {
        let err = new_todo("", "low").into_todo().unwrap_err();

        assert_eq!(
            service_core::error::validation_messages(&err),
            vec!["Title is required".to_string()]
        );
    }

    #[test]
    fn patch_leaves_absent_fields_alone() {
        let mut todo = new_todo("Write report", "high").into_todo().unwrap();
        let later = todo.updated_at + Duration::seconds(5);
        let patch = TodoPatch {
            completed: Some(true),
            ..Default::default()
        };

        patch.apply(&mut todo, later);

        assert!(todo.completed);
        assert_eq!(todo.title, "Write report");
        assert_eq!(todo.priority, Priority::High);
        assert_eq!(todo.updated_at, later);
    }

    #[test]
    fn patch_clears_due_date() {
        let mut todo = NewTodo {
            due_date: parse_due_date("2030-01-01"),
            ..new_todo("File taxes", "low")
        }
        .into_todo()
        .unwrap();
        assert!(todo.due_date.is_some());

        let patch = TodoPatch {
            due_date: Some(None),
            ..Default::default()
        };
        patch.apply(&mut todo, now());

        assert!(todo.due_date.is_none());
    }

    #[test]
    fn overdue_requires_open_and_past_due() {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        let mut todo = new_todo("Renew passport", "high").into_todo().unwrap();

        todo.due_date = Some(BsonDateTime::from_chrono(now - Duration::days(1)));
        assert!(todo.is_overdue(now));

        todo.completed = true;
        assert!(!todo.is_overdue(now));

        todo.completed = false;
        todo.due_date = Some(BsonDateTime::from_chrono(now));
        assert!(!todo.is_overdue(now));
    }

    #[test]
    fn due_date_formats() {
        let midnight = Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap();

        assert_eq!(parse_due_date("2025-03-14"), Some(midnight));
        assert_eq!(parse_due_date("2025-03-14T00:00:00Z"), Some(midnight));
        assert_eq!(parse_due_date("2025-03-14T02:00:00+02:00"), Some(midnight));
        assert_eq!(parse_due_date("2025-03-14T00:00:00.000"), Some(midnight));
        assert_eq!(parse_due_date("not a date"), None);
        assert_eq!(parse_due_date("2025-13-40"), None);
    }

    #[test]
    fn stats_fill_missing_priorities() {
        let stats = TodoStats::from_counts(2, 3, 1, vec![("high".to_string(), 5)]);

        assert_eq!(stats.total, 5);
        assert_eq!(stats.priority["high"], 5);
        assert_eq!(stats.priority["low"], 0);
        assert_eq!(stats.priority["medium"], 0);
    }
}
