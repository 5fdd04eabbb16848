//! Forwarding a plan to the report-execution trigger

use crate::core::schedule::planner::DuePlan;
use crate::domain::{OwnerId, PlatformId, ReportFlowError, ReportId, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Mutex;
use tracing::Span;

/// Downstream trigger that starts report executions for one owner
#[async_trait]
pub trait ExtractionRequestSink: Send + Sync {
    async fn request_extractions(
        &self,
        platform: &PlatformId,
        owner: &OwnerId,
        reports: &[ReportId],
    ) -> Result<()>;
}

/// A group the sink rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchFailure {
    pub platform: PlatformId,
    pub owner: OwnerId,
    pub reports: Vec<ReportId>,
    pub error: String,
}

/// Outcome of one dispatch pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub groups_dispatched: usize,
    pub reports_dispatched: usize,
    pub failures: Vec<DispatchFailure>,
}

impl DispatchSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sends every `(platform, owner)` group of a plan to a sink
pub struct ScheduleDispatcher {
    span: Span,
}

impl Default for ScheduleDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleDispatcher {
    pub fn new() -> Self {
        Self {
            span: tracing::info_span!("schedule_dispatcher"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Forward each group; a failing group is recorded and the pass goes on
    pub async fn dispatch(
        &self,
        plan: &DuePlan,
        sink: &dyn ExtractionRequestSink,
    ) -> DispatchSummary {
        let mut summary = DispatchSummary::default();

        for (platform, owners) in plan {
            for (owner, reports) in owners {
                match sink.request_extractions(platform, owner, reports).await {
                    Ok(()) => {
                        summary.groups_dispatched += 1;
                        summary.reports_dispatched += reports.len();
                    }
                    Err(e) => {
                        tracing::error!(
                            parent: &self.span,
                            platform = %platform,
                            owner = %owner,
                            reports = reports.len(),
                            error = %e,
                            "Failed to dispatch scheduled extractions"
                        );
                        summary.failures.push(DispatchFailure {
                            platform: platform.clone(),
                            owner: owner.clone(),
                            reports: reports.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        tracing::info!(
            parent: &self.span,
            groups = summary.groups_dispatched,
            reports = summary.reports_dispatched,
            failures = summary.failures.len(),
            "Dispatch complete"
        );
        summary
    }
}

/// Sink that keeps every request in memory
///
/// Used for dry runs and tests. Platforms listed in `reject` fail.
#[derive(Default)]
pub struct RecordingSink {
    requests: Mutex<Vec<(PlatformId, OwnerId, Vec<ReportId>)>>,
    reject: Vec<PlatformId>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(platforms: Vec<PlatformId>) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            reject: platforms,
        }
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Result<Vec<(PlatformId, OwnerId, Vec<ReportId>)>> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .map_err(|_| ReportFlowError::Other("recording sink lock poisoned".to_string()))
    }
}

#[async_trait]
impl ExtractionRequestSink for RecordingSink {
    async fn request_extractions(
        &self,
        platform: &PlatformId,
        owner: &OwnerId,
        reports: &[ReportId],
    ) -> Result<()> {
        if self.reject.contains(platform) {
            return Err(ReportFlowError::Other(format!(
                "report trigger rejected platform {platform}"
            )));
        }
        self.requests
            .lock()
            .map_err(|_| ReportFlowError::Other("recording sink lock poisoned".to_string()))?
            .push((platform.clone(), owner.clone(), reports.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> DuePlan {
        let mut plan = DuePlan::new();
        for (platform, owner, report) in [
            ("acme", "u-1", "daily"),
            ("acme", "u-2", "weekly"),
            ("globex", "u-1", "monthly"),
        ] {
            plan.entry(PlatformId::new(platform).unwrap())
                .or_default()
                .entry(OwnerId::new(owner).unwrap())
                .or_default()
                .push(ReportId::new(report).unwrap());
        }
        plan
    }

    #[tokio::test]
    async fn test_dispatch_every_group() {
        let sink = RecordingSink::new();
        let summary = ScheduleDispatcher::new().dispatch(&plan(), &sink).await;

        assert!(summary.is_success());
        assert_eq!(summary.groups_dispatched, 3);
        assert_eq!(sink.requests().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_group_does_not_abort_pass() {
        let sink = RecordingSink::rejecting(vec![PlatformId::new("acme").unwrap()]);
        let summary = ScheduleDispatcher::new().dispatch(&plan(), &sink).await;

        assert_eq!(summary.failures.len(), 2);
        assert_eq!(summary.groups_dispatched, 1);
        assert_eq!(
            sink.requests().unwrap()[0].0,
            PlatformId::new("globex").unwrap()
        );
    }
}
