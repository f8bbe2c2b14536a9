use std::collections::HashMap;

use serde::Deserialize;

/// One scheduled session slot, as stored per college.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Slot {
    pub event_name: String,
    pub recurrence_days: RecurrenceDays,
    /// Civil "HH:MM" start time; see `clock::parse_clock_minutes`.
    pub start_time: String,
    pub room_number: String,
}

/// Recurrence weekdays (1 = Monday .. 7 = Sunday).
///
/// Older writers stored the list as an object keyed by index, so both shapes
/// decode to the same set of values. Any other shape decodes to an empty set
/// rather than failing the slot.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RecurrenceDays {
    List(Vec<u32>),
    Map(HashMap<String, u32>),
    Other(serde_json::Value),
}

impl Default for RecurrenceDays {
    fn default() -> RecurrenceDays {
        RecurrenceDays::List(Vec::new())
    }
}

impl RecurrenceDays {
    pub fn contains(&self, weekday: u32) -> bool {
        match self {
            RecurrenceDays::List(days) => days.contains(&weekday),
            RecurrenceDays::Map(days) => days.values().any(|d| *d == weekday),
            RecurrenceDays::Other(_) => false,
        }
    }
}

/// Derives the short course name from a slot's display name: everything
/// before the first " - ", then everything before the first " (", trimmed.
pub fn course_name(event_name: &str) -> &str {
    let head = event_name.split(" - ").next().unwrap_or("");
    let head = head.split(" (").next().unwrap_or("");
    head.trim()
}

/// Per-course enrichment for notification text. Both fields optional;
/// absence never blocks delivery.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubjectInfo {
    pub faculty: String,
    pub full_course_name: String,
}

/// Per-college timetable data. Both lookups return an empty map, never an
/// error, when the underlying path has no data.
#[async_trait::async_trait]
pub trait TimetableSource: Send + Sync {
    async fn slots(&self, college: &str) -> anyhow::Result<HashMap<String, Slot>>;

    async fn subjects(
        &self,
        college: &str,
        year_type: &str,
        year: &str,
        branch: &str,
    ) -> anyhow::Result<HashMap<String, SubjectInfo>>;
}
