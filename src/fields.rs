//! Enumerations and field types for tasks and task lists.
//!
//! This module defines the structured values used to describe a task's
//! priority and to filter and order task listings.

use std::fmt;

use clap::ValueEnum;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};

/// Importance of a task.
///
/// Encoded on the wire as an integer: Low = 1, Medium = 2, High = 3.
/// Decoding also accepts the label form ("Low", "medium", ...).
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// All priorities, lowest first.
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    /// Integer representation used by the task service.
    pub fn as_wire(self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
        }
    }

    /// Parse the integer representation used by the task service.
    pub fn from_wire(value: u64) -> Option<Self> {
        match value {
            1 => Some(Priority::Low),
            2 => Some(Priority::Medium),
            3 => Some(Priority::High),
            _ => None,
        }
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "1" => Some(Priority::Low),
            "medium" | "2" => Some(Priority::Medium),
            "high" | "3" => Some(Priority::High),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PriorityVisitor;

        impl Visitor<'_> for PriorityVisitor {
            type Value = Priority;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a priority between 1 and 3 or one of Low, Medium, High")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Priority, E> {
                Priority::from_wire(v)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Priority, E> {
                u64::try_from(v)
                    .ok()
                    .and_then(Priority::from_wire)
                    .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Priority, E> {
                Priority::from_label(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        deserializer.deserialize_any(PriorityVisitor)
    }
}

/// Available sorting options for task lists.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum SortKey {
    /// Newest first.
    Created,
    /// Earliest due first, tasks without a due date last.
    Due,
    /// Highest priority first.
    Priority,
    /// Server order by id.
    Id,
}

/// Filtering options for tasks based on due dates.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum DueFilter {
    Today,
    Overdue,
    None,
}

/// Which completion states a listing includes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    Pending,
    Completed,
    All,
}

impl StatusFilter {
    /// Whether a task with the given completion flag passes this filter.
    pub fn accepts(self, is_completed: bool) -> bool {
        match self {
            StatusFilter::Pending => !is_completed,
            StatusFilter::Completed => is_completed,
            StatusFilter::All => true,
        }
    }
}
