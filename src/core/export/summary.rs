//! Export job summary
//!
//! Aggregates stored job records for reporting.

use crate::core::export::job::{ExtractionJob, FailureKind, JobKey, JobStatus};
use crate::domain::PlatformId;
use serde::Serialize;
use std::collections::BTreeMap;

/// A failed job as shown in the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedJob {
    pub key: JobKey,
    pub platform: PlatformId,
    pub kind: Option<FailureKind>,
    pub detail: Option<String>,
}

/// Summary over a set of export jobs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    /// Number of jobs considered
    pub total: usize,

    /// Job count per status
    pub by_status: BTreeMap<JobStatus, usize>,

    /// Every failed job
    pub failures: Vec<FailedJob>,
}

impl JobSummary {
    pub fn from_jobs(jobs: &[ExtractionJob]) -> Self {
        let mut summary = Self {
            total: jobs.len(),
            ..Self::default()
        };

        for job in jobs {
            *summary.by_status.entry(job.status).or_default() += 1;
            if job.status == JobStatus::Failed {
                summary.failures.push(FailedJob {
                    key: job.key(),
                    platform: job.platform.clone(),
                    kind: job.failure_kind,
                    detail: job.error_detail.clone(),
                });
            }
        }
        summary
    }

    /// Restrict to one tenant's jobs
    pub fn for_platform(jobs: &[ExtractionJob], platform: &PlatformId) -> Self {
        let selected: Vec<ExtractionJob> = jobs
            .iter()
            .filter(|j| &j.platform == platform)
            .cloned()
            .collect();
        Self::from_jobs(&selected)
    }

    /// Count of jobs in `status`
    pub fn count(&self, status: JobStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    /// Jobs that are neither succeeded nor failed
    pub fn in_flight(&self) -> usize {
        self.by_status
            .iter()
            .filter(|(status, _)| !status.is_terminal())
            .map(|(_, n)| n)
            .sum()
    }

    /// Whether no job failed
    pub fn is_successful(&self) -> bool {
        self.failures.is_empty()
    }
}
