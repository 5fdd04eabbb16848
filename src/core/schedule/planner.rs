//! Scheduled extraction planner
//!
//! Given the current instant and every schedule entry, works out which
//! reports are due today in their owner's local timezone. The planner never
//! reads the clock or the store; timezones come from a [`TimezoneResolver`]
//! and are cached for a single pass only.

use crate::config::ScheduleConfig;
use crate::core::schedule::entry::ScheduleEntry;
use crate::core::schedule::recurrence::is_due;
use crate::domain::{OwnerId, PlatformId, ReportFlowError, ReportId, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::{BTreeMap, HashMap};
use tracing::Span;

/// Due reports grouped by tenant and owner
pub type DuePlan = BTreeMap<PlatformId, BTreeMap<OwnerId, Vec<ReportId>>>;

/// Looks up the timezone an owner's schedules are evaluated in
#[async_trait]
pub trait TimezoneResolver: Send + Sync {
    async fn resolve(&self, platform: &PlatformId, owner: &OwnerId) -> Result<Tz>;
}

/// Resolver backed by `[schedule]` configuration
pub struct ConfigTimezoneResolver {
    default: Tz,
    owners: HashMap<String, Tz>,
}

impl ConfigTimezoneResolver {
    /// Parse every configured timezone up front
    ///
    /// # Errors
    ///
    /// Returns a configuration error for names that are not IANA timezones.
    pub fn new(config: &ScheduleConfig) -> Result<Self> {
        let default = parse_tz(&config.default_timezone)?;
        let owners = config
            .owner_timezones
            .iter()
            .map(|(key, name)| Ok((key.clone(), parse_tz(name)?)))
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { default, owners })
    }
}

fn parse_tz(name: &str) -> Result<Tz> {
    name.parse::<Tz>()
        .map_err(|_| ReportFlowError::Configuration(format!("unknown timezone '{name}'")))
}

#[async_trait]
impl TimezoneResolver for ConfigTimezoneResolver {
    async fn resolve(&self, platform: &PlatformId, owner: &OwnerId) -> Result<Tz> {
        Ok(self
            .owners
            .get(&format!("{platform}/{owner}"))
            .copied()
            .unwrap_or(self.default))
    }
}

/// Computes which schedule entries fire today
pub struct ExtractionPlanner {
    span: Span,
}

impl Default for ExtractionPlanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractionPlanner {
    pub fn new() -> Self {
        Self {
            span: tracing::info_span!("extraction_planner"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Group the entries due at `now` by platform and owner
    ///
    /// Each owner's timezone is resolved at most once per call. When the
    /// resolver fails the owner's entries are evaluated in UTC.
    pub async fn plan(
        &self,
        now: DateTime<Utc>,
        entries: &[ScheduleEntry],
        resolver: &dyn TimezoneResolver,
    ) -> DuePlan {
        let mut zones: HashMap<(PlatformId, OwnerId), Tz> = HashMap::new();
        let mut plan = DuePlan::new();

        for entry in entries {
            if !entry.is_enabled() {
                continue;
            }

            let owner_key = (entry.platform.clone(), entry.owner_id.clone());
            let tz = match zones.get(&owner_key) {
                Some(tz) => *tz,
                None => {
                    let tz = match resolver.resolve(&entry.platform, &entry.owner_id).await {
                        Ok(tz) => tz,
                        Err(e) => {
                            tracing::warn!(
                                parent: &self.span,
                                platform = %entry.platform,
                                owner = %entry.owner_id,
                                error = %e,
                                "Timezone lookup failed, using UTC"
                            );
                            Tz::UTC
                        }
                    };
                    zones.insert(owner_key, tz);
                    tz
                }
            };

            let today = now.with_timezone(&tz).date_naive();
            if is_due(entry, today) {
                plan.entry(entry.platform.clone())
                    .or_default()
                    .entry(entry.owner_id.clone())
                    .or_default()
                    .push(entry.report_id.clone());
            }
        }

        let due: usize = plan.values().flat_map(|o| o.values()).map(Vec::len).sum();
        tracing::info!(
            parent: &self.span,
            entries = entries.len(),
            due,
            platforms = plan.len(),
            "Planned scheduled extractions"
        );
        plan
    }
}
