//! Task data structures exchanged with the task service.
//!
//! This module defines the `Task` record as the service returns it, the
//! `TaskDraft` payload used for create and update, and the completion patch.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::fields::Priority;

/// Server-assigned task identifier.
pub type TaskId = i64;

/// Earliest due date the task form accepts.
pub fn min_due_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Latest due date the task form accepts.
pub fn max_due_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2050, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// A user-owned to-do item as known to the task service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub priority: Priority,
    #[serde(default, with = "wire_time::option")]
    pub due_date: Option<DateTime<Utc>>,
    pub is_completed: bool,
    #[serde(with = "wire_time")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "wire_time::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Copy of this task with the completion flag replaced.
    pub fn with_completion(&self, is_completed: bool) -> Task {
        Task {
            is_completed,
            ..self.clone()
        }
    }

    /// Description, treating an empty string as absent.
    pub fn description_text(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.trim().is_empty())
    }
}

/// Body for creating or replacing a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    #[serde(with = "wire_time::option")]
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskDraft {
    /// Start a draft with default priority and no due date.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: Priority::default(),
            due_date: None,
        }
    }

    /// Pre-populate a draft from an existing task for editing.
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            priority: task.priority,
            due_date: task.due_date,
        }
    }

    /// Set the description; blank text clears it.
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|d| !d.trim().is_empty());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due_date: Option<DateTime<Utc>>) -> Self {
        self.due_date = due_date;
        self
    }

    /// Check the draft before it is sent, trimming the title in place.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        let trimmed = self.title.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        self.title = trimmed.to_string();
        if let Some(due) = self.due_date {
            let day = due.date_naive();
            if day < min_due_date() || day > max_due_date() {
                return Err(ValidationError::DueDateOutOfRange {
                    min: min_due_date().to_string(),
                    max: max_due_date().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Body for the completion patch: only the flag is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionUpdate {
    pub is_completed: bool,
}

/// Timestamp codec tolerant of offset-less values.
///
/// The service may emit `2025-03-01T09:30:00` without a zone designator;
/// those are read as UTC. Values are always written as RFC 3339 UTC.
pub(crate) mod wire_time {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'")))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => super::serialize(dt, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                None => Ok(None),
                Some(raw) if raw.is_empty() => Ok(None),
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid timestamp '{raw}'"))),
            }
        }
    }
}
