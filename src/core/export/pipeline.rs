//! Post-processing of a finished query
//!
//! Fetches the result, stores it as CSV, optionally converts and compresses
//! it, and issues a download URL. Artifact keys depend only on the job, so
//! running the pipeline twice for the same execution overwrites the same
//! objects.

use crate::adapters::database::FieldUpdate;
use crate::adapters::objects::ObjectStore;
use crate::adapters::query::{QueryBackend, QueryHandle};
use crate::core::export::job::{ExportFormat, ExtractionJob, JobStatus, JobStore};
use crate::domain::{ReportFlowError, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::Span;

/// Object keys of one execution's artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub raw: String,
    pub spreadsheet: String,
    pub archive: String,
}

impl ArtifactPaths {
    /// Keys under `exports/{platform}/{execution_id}/`
    ///
    /// The spreadsheet is named after the report and the export date.
    pub fn for_job(job: &ExtractionJob) -> Self {
        let prefix = format!("exports/{}/{}", job.platform, job.execution_id);
        let name = object_name(&job.report_name);
        let dated = format!("{}_{}", name, job.started_at.format("%Y-%m-%d"));
        let delivered = match job.format {
            ExportFormat::Csv => format!("{name}.csv"),
            ExportFormat::Xlsx => format!("{dated}.xlsx"),
        };
        Self {
            raw: format!("{prefix}/{name}.csv"),
            spreadsheet: format!("{prefix}/{dated}.xlsx"),
            archive: format!("{prefix}/{delivered}.zip"),
        }
    }
}

/// Report names become object names: anything but ASCII letters and digits
/// turns into `_`
fn object_name(report_name: &str) -> String {
    let name: String = report_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if name.is_empty() {
        "report".to_string()
    } else {
        name
    }
}

/// Turns a succeeded query into a downloadable artifact
#[derive(Clone)]
pub struct PostProcessor {
    backend: Arc<dyn QueryBackend>,
    objects: Arc<dyn ObjectStore>,
    jobs: JobStore,
    url_ttl: Duration,
    span: Span,
}

impl PostProcessor {
    pub fn new(
        backend: Arc<dyn QueryBackend>,
        objects: Arc<dyn ObjectStore>,
        jobs: JobStore,
        url_ttl: Duration,
    ) -> Self {
        Self {
            backend,
            objects,
            jobs,
            url_ttl,
            span: tracing::info_span!("post_processor"),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Lifetime of issued download URLs
    pub fn url_ttl(&self) -> Duration {
        self.url_ttl
    }

    /// Run every stage and mark the job `Succeeded`
    ///
    /// Each status change is persisted before its stage starts. A job that
    /// is already past a stage (a repeated run) redoes the work without
    /// moving its status backwards. When another worker claims the next
    /// stage first, the job is returned as that worker left it.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage fails or the job was moved out from
    /// under this run without progressing.
    pub async fn run(&self, job: ExtractionJob, handle: &QueryHandle) -> Result<ExtractionJob> {
        let paths = ArtifactPaths::for_job(&job);

        let result = self.backend.fetch_result(handle).await?;
        let raw = self.objects.write_artifact(&paths.raw, result).await?;
        tracing::info!(
            parent: &self.span,
            job = %job.key(),
            key = %raw.key,
            bytes = raw.size_bytes,
            "Wrote raw artifact"
        );
        let mut artifact = raw.key;
        let mut job = job;

        if job.format == ExportFormat::Xlsx {
            job = match self.advance(job, JobStatus::Converting).await? {
                Claim::Won(job) => job,
                Claim::Lost(current) => return Ok(current),
            };
            artifact = self
                .objects
                .convert_to_spreadsheet(&artifact, &paths.spreadsheet)
                .await?
                .key;
        }

        if job.compress {
            job = match self.advance(job, JobStatus::Compressing).await? {
                Claim::Won(job) => job,
                Claim::Lost(current) => return Ok(current),
            };
            artifact = self.objects.compress(&artifact, &paths.archive).await?.key;
        }

        let now = Utc::now();
        let url = self.issue_url(&artifact, now).await?;
        let update = FieldUpdate::new()
            .set("artifact_key", &artifact)
            .set("download_url", &url)
            .set("ended_at", now);

        match self.claim(job, JobStatus::Succeeded, update).await? {
            Claim::Won(job) | Claim::Lost(job) => Ok(job),
        }
    }

    /// Presign `key` for the configured lifetime
    pub async fn issue_url(&self, key: &str, now: DateTime<Utc>) -> Result<String> {
        self.objects.presign_download(key, now + self.url_ttl).await
    }

    async fn advance(&self, job: ExtractionJob, to: JobStatus) -> Result<Claim> {
        if job.status >= to {
            return Ok(Claim::Won(job));
        }
        // Staleness of a stage is measured from its start
        let update = FieldUpdate::new().set("last_heartbeat", Utc::now());
        self.claim(job, to, update).await
    }

    /// Conditionally move `job` to `to`
    ///
    /// Losing to a writer that already moved the job further yields that
    /// writer's job; losing any other way is an error.
    async fn claim(
        &self,
        job: ExtractionJob,
        to: JobStatus,
        update: FieldUpdate,
    ) -> Result<Claim> {
        if let Some(next) = self.jobs.transition(&job, to, update).await? {
            return Ok(Claim::Won(next));
        }
        let current = self.jobs.require(&job.key()).await?;
        if current.status > job.status {
            tracing::debug!(
                parent: &self.span,
                job = %job.key(),
                status = %current.status,
                "Stage taken over by another worker"
            );
            return Ok(Claim::Lost(current));
        }
        Err(moved(&job))
    }
}

/// Result of a conditional stage transition
enum Claim {
    Won(ExtractionJob),
    /// Another worker moved the job first
    Lost(ExtractionJob),
}

fn moved(job: &ExtractionJob) -> ReportFlowError {
    ReportFlowError::InvalidTransition(format!(
        "job {} changed status while post-processing",
        job.key()
    ))
}
