//! Schedule entries
//!
//! One entry per report: who owns it, when the recurrence starts and how
//! often it repeats.

use crate::adapters::database::{
    decode_document, save_document, Collection, KeyValueStore, RecordKey,
};
use crate::domain::{OwnerId, PlatformId, ReportId, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Recurrence step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceUnit {
    Day,
    Week,
    Month,
}

impl fmt::Display for RecurrenceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecurrenceUnit::Day => "day",
            RecurrenceUnit::Week => "week",
            RecurrenceUnit::Month => "month",
        })
    }
}

/// Recurring extraction of one report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub report_id: ReportId,
    pub platform: PlatformId,
    pub owner_id: OwnerId,

    /// First occurrence; only its calendar date matters
    pub anchor: DateTime<Utc>,

    /// Number of units between occurrences
    pub every: u32,

    pub unit: RecurrenceUnit,

    #[serde(default)]
    pub paused: bool,

    #[serde(default = "default_active")]
    pub active: bool,

    #[serde(default)]
    pub recipients: Vec<String>,
}

fn default_active() -> bool {
    true
}

impl ScheduleEntry {
    /// Whether the entry can ever be due
    pub fn is_enabled(&self) -> bool {
        self.active && !self.paused && self.every > 0
    }
}

/// Store a schedule entry under its report id
pub async fn save_entry(store: &dyn KeyValueStore, entry: &ScheduleEntry) -> Result<()> {
    save_document(store, &RecordKey::schedule(&entry.report_id), entry).await
}

/// Load every stored schedule entry
///
/// Undecodable entries are skipped with a warning so one bad record does not
/// block the whole pass.
pub async fn list_entries(store: &dyn KeyValueStore) -> Result<Vec<ScheduleEntry>> {
    let mut entries = Vec::new();
    for (key, document) in store.list(Collection::Schedule).await? {
        match decode_document(&key, document) {
            Ok(entry) => entries.push(entry),
            Err(e) => tracing::warn!(key = %key, error = %e, "Skipping schedule entry"),
        }
    }
    Ok(entries)
}
