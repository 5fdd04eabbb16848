//! Extraction job records
//!
//! One record per export execution. Status only moves forward; terminal
//! jobs keep their data and may only have their download URL reissued.

use crate::adapters::database::{
    decode_document, load_document, Collection, FieldUpdate, KeyValueStore, RecordKey,
    UpdateOutcome,
};
use crate::adapters::query::QueryHandle;
use crate::domain::{ExecutionId, PlatformId, ReportFlowError, ReportId, Result};
use crate::log_job_transition;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::Span;

/// Export job lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting for a tenant refresh before submission
    Queued,
    /// Query submitted to the backend
    Running,
    /// Raw result being turned into a spreadsheet
    Converting,
    /// Artifact being compressed
    Compressing,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Converting => "converting",
            JobStatus::Compressing => "compressing",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }

    /// Whether the job may move from `self` to `next`
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (Queued, Running) | (Queued, Failed) => true,
            (Running, Converting) | (Running, Compressing) | (Running, Succeeded) => true,
            (Converting, Compressing) | (Converting, Succeeded) => true,
            (Compressing, Succeeded) => true,
            (Running | Converting | Compressing, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Artifact format requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

/// Shape of the delivered artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExportOptions {
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub compress: bool,
}

/// Why a job failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Ran past the time limit without a heartbeat
    DeadlineExceeded,
    /// The query backend reported the query as failed
    BackendReported,
    /// Anything else: store, object store, submission
    Internal,
}

impl FailureKind {
    /// Classify an error that ended a job
    pub fn of(error: &ReportFlowError) -> Self {
        match error {
            ReportFlowError::DeadlineExceeded(_) => FailureKind::DeadlineExceeded,
            ReportFlowError::Backend(crate::domain::BackendError::QueryFailed(_)) => {
                FailureKind::BackendReported
            }
            _ => FailureKind::Internal,
        }
    }
}

/// Identifies one export execution
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobKey {
    pub report_id: ReportId,
    pub execution_id: ExecutionId,
}

impl JobKey {
    pub fn new(report_id: ReportId, execution_id: ExecutionId) -> Self {
        Self {
            report_id,
            execution_id,
        }
    }

    pub fn record_key(&self) -> RecordKey {
        RecordKey::extraction_job(&self.report_id, &self.execution_id)
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.report_id, self.execution_id)
    }
}

/// Persisted export execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionJob {
    pub report_id: ReportId,
    pub execution_id: ExecutionId,
    pub platform: PlatformId,
    pub report_name: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default)]
    pub compress: bool,
    #[serde(default)]
    pub backend_handle: Option<QueryHandle>,
    /// Query held back until the tenant refresh finishes; only set while queued
    #[serde(default)]
    pub deferred_query: Option<String>,
    #[serde(default)]
    pub error_detail: Option<String>,
    #[serde(default)]
    pub failure_kind: Option<FailureKind>,
    #[serde(default)]
    pub failed_query: Option<String>,
    #[serde(default)]
    pub artifact_key: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl ExtractionJob {
    /// A job that has not been submitted to the backend
    pub fn queued(
        key: &JobKey,
        platform: PlatformId,
        report_name: &str,
        options: ExportOptions,
        query: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let mut job = Self::blank(key, platform, report_name, options, now);
        job.deferred_query = Some(query.to_string());
        job
    }

    /// A job whose query is running under `handle`
    pub fn running(
        key: &JobKey,
        platform: PlatformId,
        report_name: &str,
        options: ExportOptions,
        handle: QueryHandle,
        now: DateTime<Utc>,
    ) -> Self {
        let mut job = Self::blank(key, platform, report_name, options, now);
        job.status = JobStatus::Running;
        job.backend_handle = Some(handle);
        job
    }

    fn blank(
        key: &JobKey,
        platform: PlatformId,
        report_name: &str,
        options: ExportOptions,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            report_id: key.report_id.clone(),
            execution_id: key.execution_id.clone(),
            platform,
            report_name: report_name.to_string(),
            status: JobStatus::Queued,
            started_at: now,
            ended_at: None,
            last_heartbeat: None,
            format: options.format,
            compress: options.compress,
            backend_handle: None,
            deferred_query: None,
            error_detail: None,
            failure_kind: None,
            failed_query: None,
            artifact_key: None,
            download_url: None,
        }
    }

    pub fn key(&self) -> JobKey {
        JobKey::new(self.report_id.clone(), self.execution_id.clone())
    }

    pub fn options(&self) -> ExportOptions {
        ExportOptions {
            format: self.format,
            compress: self.compress,
        }
    }

    /// Most recent sign of life, for staleness checks
    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_heartbeat.unwrap_or(self.started_at)
    }
}

/// Typed access to job records in the shared store
///
/// Every status change is a conditional write guarded on the status the
/// caller observed, so two writers can never both move the same job.
#[derive(Clone)]
pub struct JobStore {
    store: Arc<dyn KeyValueStore>,
    span: Span,
}

impl JobStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            span: tracing::info_span!("job_store"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Persist a new job
    ///
    /// # Errors
    ///
    /// Returns a validation error if a job with the same key already exists.
    pub async fn create(&self, job: &ExtractionJob) -> Result<()> {
        let key = job.key();
        let created = self
            .store
            .put_if_absent(&key.record_key(), serde_json::to_value(job)?)
            .await?;
        if !created {
            return Err(ReportFlowError::Validation(format!("job {key} already exists")));
        }
        tracing::info!(parent: &self.span, job = %key, status = %job.status, "Created export job");
        Ok(())
    }

    pub async fn load(&self, key: &JobKey) -> Result<Option<ExtractionJob>> {
        load_document(self.store.as_ref(), &key.record_key()).await
    }

    /// Load a job or fail with `NotFound`
    pub async fn require(&self, key: &JobKey) -> Result<ExtractionJob> {
        self.load(key)
            .await?
            .ok_or_else(|| ReportFlowError::NotFound(format!("export job {key}")))
    }

    /// Every stored job, ordered by key
    pub async fn list(&self) -> Result<Vec<ExtractionJob>> {
        self.store
            .list(Collection::ExtractionJob)
            .await?
            .into_iter()
            .map(|(key, document)| decode_document(&key, document))
            .collect()
    }

    /// Move `job` to `to`, applying `update` in the same write
    ///
    /// # Returns
    ///
    /// The updated job, or `None` when the stored status no longer matches
    /// `job.status`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` for a backward move and `NotFound` when
    /// the record is gone.
    pub async fn transition(
        &self,
        job: &ExtractionJob,
        to: JobStatus,
        update: FieldUpdate,
    ) -> Result<Option<ExtractionJob>> {
        let key = job.key();
        if !job.status.can_transition_to(to) {
            return Err(ReportFlowError::InvalidTransition(format!(
                "job {key}: {} -> {to}",
                job.status
            )));
        }

        let update = update
            .when_equals("status", job.status)
            .set("status", to);
        let record_key = key.record_key();

        match self.store.update(&record_key, &update).await? {
            UpdateOutcome::Applied(document) => {
                log_job_transition!(parent: &self.span, key, job.status, to);
                decode_document(&record_key, document).map(Some)
            }
            UpdateOutcome::ConditionFailed => Ok(None),
            UpdateOutcome::NotFound => {
                Err(ReportFlowError::NotFound(format!("export job {key}")))
            }
        }
    }

    /// Mark a job failed with a classified reason
    pub async fn fail(
        &self,
        job: &ExtractionJob,
        error: &ReportFlowError,
        query: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<ExtractionJob>> {
        let kind = FailureKind::of(error);
        tracing::warn!(
            parent: &self.span,
            job = %job.key(),
            kind = ?kind,
            error = %error,
            "Export job failed"
        );

        let update = FieldUpdate::new()
            .set("ended_at", now)
            .set("error_detail", error.to_string())
            .set("failure_kind", kind)
            .set("failed_query", query)
            .set("deferred_query", Option::<String>::None);
        self.transition(job, JobStatus::Failed, update).await
    }

    /// Record a heartbeat on a job that is still active
    ///
    /// # Returns
    ///
    /// `false` once the job is terminal or gone
    pub async fn heartbeat(&self, key: &JobKey, now: DateTime<Utc>) -> Result<bool> {
        let update = FieldUpdate::new()
            .when_not_equals("status", JobStatus::Succeeded)
            .when_not_equals("status", JobStatus::Failed)
            .set("last_heartbeat", now);
        Ok(self
            .store
            .update(&key.record_key(), &update)
            .await?
            .is_applied())
    }

    /// Apply fields to a job without changing its status
    ///
    /// The write is guarded on the observed status.
    pub async fn amend(
        &self,
        job: &ExtractionJob,
        update: FieldUpdate,
    ) -> Result<Option<ExtractionJob>> {
        let record_key = job.key().record_key();
        let update = update.when_equals("status", job.status);
        match self.store.update(&record_key, &update).await? {
            UpdateOutcome::Applied(document) => decode_document(&record_key, document).map(Some),
            UpdateOutcome::ConditionFailed => Ok(None),
            UpdateOutcome::NotFound => Err(ReportFlowError::NotFound(format!(
                "export job {}",
                job.key()
            ))),
        }
    }
}
