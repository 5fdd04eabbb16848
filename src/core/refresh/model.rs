//! Tenant refresh models and the effective refresh view
//!
//! The refresh model is selected once per tenant at the boundary and passed
//! in through [`TenantContext`]. [`evaluate`] is the pure part of
//! `RefreshManager::effective_refresh`.

use crate::config::ExpirationHoursConfig;
use crate::core::refresh::record::{RefreshRecord, RefreshStatus, TrackState};
use crate::domain::PlatformId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Installation tier, used to pick the expiration window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InstallationClass {
    Trial,
    Staging,
    Production,
    #[default]
    Unclassified,
}

/// How a tenant's data freshness is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum RefreshModel {
    /// Track status only; never asks for a refresh on its own
    Legacy,
    /// Tracks plus an expiration window per installation tier
    Managed { installation: InstallationClass },
    /// Only the warehouse refresh timestamp counts
    Warehouse { installation: InstallationClass },
}

/// Resolved tenant handed to the core by the calling layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub platform: PlatformId,
    pub model: RefreshModel,
}

impl TenantContext {
    pub fn new(platform: PlatformId, model: RefreshModel) -> Self {
        Self { platform, model }
    }
}

/// Freshness summary used to gate report execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectiveRefresh {
    pub status: RefreshStatus,
    pub date: Option<DateTime<Utc>>,
    pub is_refresh_needed: bool,
    pub error_count: u32,
}

/// Computes the effective refresh view of a tenant
///
/// A missing record is `Unset`: nothing to do under [`RefreshModel::Legacy`],
/// an immediate refresh under the other models.
pub fn evaluate(
    record: Option<&RefreshRecord>,
    model: RefreshModel,
    windows: &ExpirationHoursConfig,
    now: DateTime<Utc>,
) -> EffectiveRefresh {
    let Some(record) = record else {
        return EffectiveRefresh {
            status: RefreshStatus::Unset,
            date: None,
            is_refresh_needed: !matches!(model, RefreshModel::Legacy),
            error_count: 0,
        };
    };

    match model {
        RefreshModel::Warehouse { installation } => {
            let date = record.warehouse_last_refresh_start;
            let is_refresh_needed = match date {
                Some(started) => now - started >= windows.window(installation),
                None => true,
            };
            EffectiveRefresh {
                status: if date.is_some() {
                    RefreshStatus::Succeeded
                } else {
                    RefreshStatus::Unset
                },
                date,
                is_refresh_needed,
                error_count: record.error_count,
            }
        }
        RefreshModel::Legacy => {
            let (status, date) = latest_track(record);
            EffectiveRefresh {
                status,
                date,
                is_refresh_needed: false,
                error_count: record.error_count,
            }
        }
        RefreshModel::Managed { installation } => {
            let (status, date) = latest_track(record);
            let is_refresh_needed = status == RefreshStatus::Error
                || match date {
                    Some(updated) => now - updated >= windows.window(installation),
                    None => true,
                };
            EffectiveRefresh {
                status,
                date,
                is_refresh_needed,
                error_count: record.error_count,
            }
        }
    }
}

/// A running track wins, then the most recently updated one.
/// Ties go to the scheduled track; a missing timestamp sorts first.
fn latest_track(record: &RefreshRecord) -> (RefreshStatus, Option<DateTime<Utc>>) {
    if record.scheduled.is_in_progress() {
        return (RefreshStatus::InProgress, record.scheduled.last_update);
    }
    if record.on_demand.is_in_progress() {
        return (RefreshStatus::InProgress, record.on_demand.last_update);
    }

    let chosen: &TrackState = if record.on_demand.last_update > record.scheduled.last_update {
        &record.on_demand
    } else {
        &record.scheduled
    };
    (chosen.status, chosen.last_update)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn record() -> RefreshRecord {
        RefreshRecord::new(PlatformId::new("acme").unwrap())
    }

    fn track(status: RefreshStatus, hours_ago: i64) -> TrackState {
        TrackState {
            status,
            last_update: Some(now() - Duration::hours(hours_ago)),
        }
    }

    const MANAGED: RefreshModel = RefreshModel::Managed {
        installation: InstallationClass::Production,
    };

    #[test]
    fn test_missing_record_diverges_by_model() {
        let windows = ExpirationHoursConfig::default();

        let legacy = evaluate(None, RefreshModel::Legacy, &windows, now());
        assert_eq!(legacy.status, RefreshStatus::Unset);
        assert!(!legacy.is_refresh_needed);

        let managed = evaluate(None, MANAGED, &windows, now());
        assert_eq!(managed.status, RefreshStatus::Unset);
        assert!(managed.is_refresh_needed);
    }

    #[test]
    fn test_in_progress_wins_over_newer_track() {
        let mut rec = record();
        rec.scheduled = track(RefreshStatus::InProgress, 5);
        rec.on_demand = track(RefreshStatus::Succeeded, 1);

        let view = evaluate(Some(&rec), MANAGED, &ExpirationHoursConfig::default(), now());
        assert_eq!(view.status, RefreshStatus::InProgress);
        assert_eq!(view.date, rec.scheduled.last_update);
        assert!(!view.is_refresh_needed);
    }

    #[test]
    fn test_long_running_refresh_reports_expired_data() {
        let mut rec = record();
        rec.on_demand = track(RefreshStatus::InProgress, 72);

        let view = evaluate(Some(&rec), MANAGED, &ExpirationHoursConfig::default(), now());
        assert_eq!(view.status, RefreshStatus::InProgress);
        assert!(view.is_refresh_needed);
    }

    #[test]
    fn test_later_track_is_chosen() {
        let mut rec = record();
        rec.scheduled = track(RefreshStatus::Succeeded, 10);
        rec.on_demand = track(RefreshStatus::Error, 2);

        let view = evaluate(Some(&rec), RefreshModel::Legacy, &ExpirationHoursConfig::default(), now());
        assert_eq!(view.status, RefreshStatus::Error);
        assert!(!view.is_refresh_needed);

        let view = evaluate(Some(&rec), MANAGED, &ExpirationHoursConfig::default(), now());
        assert!(view.is_refresh_needed);
    }

    #[test]
    fn test_tie_goes_to_scheduled() {
        let mut rec = record();
        rec.scheduled = track(RefreshStatus::Succeeded, 3);
        rec.on_demand = track(RefreshStatus::Error, 3);

        let view = evaluate(Some(&rec), RefreshModel::Legacy, &ExpirationHoursConfig::default(), now());
        assert_eq!(view.status, RefreshStatus::Succeeded);
    }

    #[test]
    fn test_expiration_window_by_installation() {
        let windows = ExpirationHoursConfig {
            trial: 6,
            staging: 12,
            production: 24,
            default: 48,
        };
        let mut rec = record();
        rec.scheduled = track(RefreshStatus::Succeeded, 12);

        let trial = RefreshModel::Managed {
            installation: InstallationClass::Trial,
        };
        assert!(evaluate(Some(&rec), trial, &windows, now()).is_refresh_needed);

        let staging = RefreshModel::Managed {
            installation: InstallationClass::Staging,
        };
        assert!(evaluate(Some(&rec), staging, &windows, now()).is_refresh_needed);
        assert!(!evaluate(Some(&rec), MANAGED, &windows, now()).is_refresh_needed);
    }

    #[test]
    fn test_warehouse_ignores_tracks() {
        let mut rec = record();
        rec.scheduled = track(RefreshStatus::InProgress, 1);
        rec.warehouse_last_refresh_start = Some(now() - Duration::hours(30));

        let model = RefreshModel::Warehouse {
            installation: InstallationClass::Unclassified,
        };
        let windows = ExpirationHoursConfig::default();
        let view = evaluate(Some(&rec), model, &windows, now());
        assert_eq!(view.status, RefreshStatus::Succeeded);
        assert_eq!(view.date, rec.warehouse_last_refresh_start);
        assert!(view.is_refresh_needed);
    }

    #[test]
    fn test_model_serde_shape() {
        let model: RefreshModel =
            serde_json::from_str(r#"{"model":"managed","installation":"trial"}"#).unwrap();
        assert_eq!(
            model,
            RefreshModel::Managed {
                installation: InstallationClass::Trial
            }
        );
    }
}
