//! Refresh record tracking
//!
//! A tenant's refresh record carries two independent tracks: the nightly
//! (scheduled) refresh and user-triggered (on-demand) refreshes. Writers
//! touch individual track fields through conditional partial updates, so
//! the field names here are also the update paths.

use crate::domain::PlatformId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of one refresh track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
    /// No refresh has been recorded
    #[default]
    Unset,
    /// Refresh is currently running
    InProgress,
    /// Last refresh completed successfully
    Succeeded,
    /// Last refresh failed or was abandoned
    Error,
}

impl RefreshStatus {
    /// Stored representation, used in update conditions
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshStatus::Unset => "unset",
            RefreshStatus::InProgress => "in_progress",
            RefreshStatus::Succeeded => "succeeded",
            RefreshStatus::Error => "error",
        }
    }
}

impl fmt::Display for RefreshStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which refresh track an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Track {
    /// Nightly refresh driven by the scheduler
    Scheduled,
    /// User-requested refresh
    OnDemand,
}

impl Track {
    /// Field name of the track inside a [`RefreshRecord`]
    pub fn field(&self) -> &'static str {
        match self {
            Track::Scheduled => "scheduled",
            Track::OnDemand => "on_demand",
        }
    }

    /// Dotted path of the track's status field
    pub fn status_path(&self) -> String {
        format!("{}.status", self.field())
    }

    /// Dotted path of the track's last update timestamp
    pub fn last_update_path(&self) -> String {
        format!("{}.last_update", self.field())
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

/// Terminal result reported when a refresh finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshOutcome {
    Succeeded,
    Error,
}

impl RefreshOutcome {
    /// Track status recorded for this outcome
    pub fn status(&self) -> RefreshStatus {
        match self {
            RefreshOutcome::Succeeded => RefreshStatus::Succeeded,
            RefreshOutcome::Error => RefreshStatus::Error,
        }
    }
}

/// State of one refresh track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TrackState {
    #[serde(default)]
    pub status: RefreshStatus,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
}

impl TrackState {
    pub fn is_in_progress(&self) -> bool {
        self.status == RefreshStatus::InProgress
    }
}

/// Per-tenant refresh record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshRecord {
    /// Tenant the record belongs to
    pub platform: PlatformId,

    /// Nightly refresh track
    #[serde(default)]
    pub scheduled: TrackState,

    /// On-demand refresh track
    #[serde(default)]
    pub on_demand: TrackState,

    /// Start of the most recent scheduled refresh
    #[serde(default)]
    pub last_refresh_start: Option<DateTime<Utc>>,

    /// Consecutive failed refreshes
    #[serde(default)]
    pub error_count: u32,

    /// Execution id of the external workflow run backing the latest refresh
    #[serde(default)]
    pub workflow_execution_id: Option<String>,

    /// Start of the latest warehouse refresh, maintained outside the tracks
    #[serde(default)]
    pub warehouse_last_refresh_start: Option<DateTime<Utc>>,
}

impl RefreshRecord {
    /// Creates an empty record with both tracks unset
    pub fn new(platform: PlatformId) -> Self {
        Self {
            platform,
            scheduled: TrackState::default(),
            on_demand: TrackState::default(),
            last_refresh_start: None,
            error_count: 0,
            workflow_execution_id: None,
            warehouse_last_refresh_start: None,
        }
    }

    /// Returns the state of a track
    pub fn track(&self, track: Track) -> &TrackState {
        match track {
            Track::Scheduled => &self.scheduled,
            Track::OnDemand => &self.on_demand,
        }
    }

    /// Whether either track is running
    pub fn any_in_progress(&self) -> bool {
        self.scheduled.is_in_progress() || self.on_demand.is_in_progress()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(RefreshStatus::InProgress).unwrap(),
            json!("in_progress")
        );
        assert_eq!(RefreshStatus::InProgress.as_str(), "in_progress");
    }

    #[test]
    fn test_track_paths() {
        assert_eq!(Track::OnDemand.status_path(), "on_demand.status");
        assert_eq!(Track::Scheduled.last_update_path(), "scheduled.last_update");
    }

    #[test]
    fn test_sparse_document_decodes_with_defaults() {
        let record: RefreshRecord = serde_json::from_value(json!({
            "platform": "acme",
            "scheduled": {"status": "in_progress"}
        }))
        .unwrap();

        assert!(record.scheduled.is_in_progress());
        assert_eq!(record.on_demand.status, RefreshStatus::Unset);
        assert_eq!(record.error_count, 0);
        assert!(record.any_in_progress());
    }
}
