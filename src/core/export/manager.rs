//! Export job manager
//!
//! Gates each export on the tenant's refresh state, submits it to the query
//! backend and carries the job record through to a downloadable artifact.
//! Two paths share the same records: [`ExportJobManager::submit_export`]
//! returns immediately and callers poll, while
//! [`ExportJobManager::run_export`] drives the job to completion in process
//! under a deadline and heartbeat.

use crate::adapters::database::{FieldUpdate, KeyValueStore};
use crate::adapters::objects::ObjectStore;
use crate::adapters::query::{QueryBackend, QueryHandle, QueryState};
use crate::config::ExportConfig;
use crate::core::export::job::{ExportOptions, ExtractionJob, JobKey, JobStatus, JobStore};
use crate::core::export::pipeline::PostProcessor;
use crate::core::export::summary::JobSummary;
use crate::core::export::watchdog::{run_until, spawn_heartbeat, Deadline};
use crate::core::refresh::{RefreshManager, RefreshStatus, TenantContext, TriggerOutcome};
use crate::domain::{BackendError, ExecutionId, ReportFlowError, ReportId, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::Span;

/// One export request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub report_id: ReportId,
    pub report_name: String,
    pub query: String,
    pub options: ExportOptions,
}

/// Whether an export may go to the backend now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionDecision {
    Immediate,
    /// Wait for a tenant refresh; `refresh_triggered` is set when this
    /// request started it
    Defer { refresh_triggered: bool },
}

/// Result of [`ExportJobManager::resume_deferred_export`]
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
    /// The deferred query was submitted (or its submission failed and the
    /// job is now `Failed`)
    Resumed(ExtractionJob),
    /// Someone else already resumed the job
    AlreadyResumed(ExtractionJob),
    /// The tenant refresh is still running
    StillDeferred(ExtractionJob),
}

/// Export job orchestration
pub struct ExportJobManager {
    jobs: JobStore,
    refresh: Arc<RefreshManager>,
    backend: Arc<dyn QueryBackend>,
    post: PostProcessor,
    config: ExportConfig,
    span: Span,
}

impl ExportJobManager {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        refresh: Arc<RefreshManager>,
        backend: Arc<dyn QueryBackend>,
        objects: Arc<dyn ObjectStore>,
        config: ExportConfig,
    ) -> Self {
        let span = tracing::info_span!("export_manager");
        let jobs = JobStore::new(store).with_span(span.clone());
        let url_ttl = chrono::Duration::seconds(
            i64::try_from(config.download_url_ttl_seconds).unwrap_or(i64::MAX / 1000),
        );
        let post = PostProcessor::new(backend.clone(), objects, jobs.clone(), url_ttl)
            .with_span(span.clone());
        Self {
            jobs,
            refresh,
            backend,
            post,
            config,
            span,
        }
    }

    /// Replace the span events are emitted under, for every part of the manager
    pub fn with_span(mut self, span: Span) -> Self {
        self.jobs = self.jobs.with_span(span.clone());
        self.post = self.post.with_span(span.clone());
        self.span = span;
        self
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    /// Decide whether to submit now or wait for a refresh
    ///
    /// A refresh that is needed but not running is triggered first. When it
    /// cannot be triggered (no budget, no engine, engine error) the export
    /// runs against the data as it is.
    pub async fn decide(
        &self,
        ctx: &TenantContext,
        now: DateTime<Utc>,
    ) -> Result<SubmissionDecision> {
        let view = self.refresh.effective_refresh(ctx, now).await?;

        if view.status == RefreshStatus::InProgress {
            return Ok(SubmissionDecision::Defer {
                refresh_triggered: false,
            });
        }
        if !view.is_refresh_needed {
            return Ok(SubmissionDecision::Immediate);
        }

        match self
            .refresh
            .trigger_on_demand_refresh(&ctx.platform, now)
            .await
        {
            Ok(TriggerOutcome::Triggered { execution_id }) => {
                tracing::info!(
                    parent: &self.span,
                    platform = %ctx.platform,
                    execution_id = %execution_id,
                    "Deferring export behind on-demand refresh"
                );
                Ok(SubmissionDecision::Defer {
                    refresh_triggered: true,
                })
            }
            Ok(TriggerOutcome::BudgetExhausted) => Ok(SubmissionDecision::Immediate),
            Err(e) => {
                tracing::warn!(
                    parent: &self.span,
                    platform = %ctx.platform,
                    error = %e,
                    "Could not trigger refresh, exporting current data"
                );
                Ok(SubmissionDecision::Immediate)
            }
        }
    }

    /// Start an export and return its key without waiting
    ///
    /// The job is either `Queued` behind a refresh, `Running` on the
    /// backend, or `Failed` if submission was refused.
    pub async fn submit_export(
        &self,
        ctx: &TenantContext,
        request: &ExportRequest,
    ) -> Result<JobKey> {
        let now = Utc::now();
        let key = JobKey::new(request.report_id.clone(), ExecutionId::generate());

        let job = match self.decide(ctx, now).await? {
            SubmissionDecision::Defer { .. } => self.persist_deferred(ctx, &key, request, now).await?,
            SubmissionDecision::Immediate => self.submit_now(ctx, &key, request, now).await?,
        };
        Ok(job.key())
    }

    /// Run an export to a terminal state in this process
    ///
    /// A deferred export is returned as `Queued`. Otherwise the returned job
    /// is `Succeeded` or `Failed`, unless a concurrent poll took over a
    /// post-processing stage, in which case it is returned in that stage.
    pub async fn run_export(
        &self,
        ctx: &TenantContext,
        request: &ExportRequest,
    ) -> Result<ExtractionJob> {
        let now = Utc::now();
        let key = JobKey::new(request.report_id.clone(), ExecutionId::generate());

        match self.decide(ctx, now).await? {
            SubmissionDecision::Defer { .. } => self.persist_deferred(ctx, &key, request, now).await,
            SubmissionDecision::Immediate => {
                let job = self.submit_now(ctx, &key, request, now).await?;
                if job.status != JobStatus::Running {
                    return Ok(job);
                }
                self.drive(job, &request.query).await
            }
        }
    }

    async fn persist_deferred(
        &self,
        ctx: &TenantContext,
        key: &JobKey,
        request: &ExportRequest,
        now: DateTime<Utc>,
    ) -> Result<ExtractionJob> {
        let job = ExtractionJob::queued(
            key,
            ctx.platform.clone(),
            &request.report_name,
            request.options,
            &request.query,
            now,
        );
        self.jobs.create(&job).await?;
        Ok(job)
    }

    async fn submit_now(
        &self,
        ctx: &TenantContext,
        key: &JobKey,
        request: &ExportRequest,
        now: DateTime<Utc>,
    ) -> Result<ExtractionJob> {
        match self.backend.submit(&request.query).await {
            Ok(handle) => {
                let job = ExtractionJob::running(
                    key,
                    ctx.platform.clone(),
                    &request.report_name,
                    request.options,
                    handle,
                    now,
                );
                self.jobs.create(&job).await?;
                Ok(job)
            }
            Err(e) => {
                // Record the refusal on a job so callers see it when polling
                let job = ExtractionJob::queued(
                    key,
                    ctx.platform.clone(),
                    &request.report_name,
                    request.options,
                    &request.query,
                    now,
                );
                self.jobs.create(&job).await?;
                self.fail_job(&job, &e, Some(&request.query)).await
            }
        }
    }

    /// Drive a running job under the deadline with a heartbeat
    async fn drive(&self, job: ExtractionJob, query: &str) -> Result<ExtractionJob> {
        let key = job.key();
        let deadline = Deadline::after(self.config.time_limit());
        let heartbeat = spawn_heartbeat(
            self.jobs.clone(),
            key.clone(),
            self.config.heartbeat_interval(),
            self.span.clone(),
        );

        let outcome = run_until(deadline, self.complete(job, deadline)).await;
        drop(heartbeat);

        match outcome {
            Ok(done) => Ok(done),
            Err(e) => {
                let current = self.jobs.require(&key).await?;
                if current.status.is_terminal() {
                    return Ok(current);
                }
                self.fail_job(&current, &e, Some(query)).await
            }
        }
    }

    async fn complete(&self, job: ExtractionJob, deadline: Deadline) -> Result<ExtractionJob> {
        let handle = job.backend_handle.clone().ok_or_else(|| {
            ReportFlowError::Other(format!("job {} has no backend handle", job.key()))
        })?;
        self.wait_for_backend(&handle, deadline).await?;
        self.post.run(job, &handle).await
    }

    /// Poll the backend until the query finishes
    ///
    /// Throttled status checks back off and retry for as long as the
    /// deadline allows.
    async fn wait_for_backend(&self, handle: &QueryHandle, deadline: Deadline) -> Result<()> {
        loop {
            if deadline.has_expired() {
                return Err(ReportFlowError::DeadlineExceeded(format!(
                    "query {handle} still running at deadline"
                )));
            }

            match self.backend.status(handle).await {
                Ok(QueryState::Succeeded) => return Ok(()),
                Ok(QueryState::Failed { reason }) => {
                    return Err(BackendError::QueryFailed(reason).into())
                }
                Ok(QueryState::Queued | QueryState::Running) => {
                    tokio::time::sleep(self.config.poll_interval()).await
                }
                Err(ReportFlowError::Backend(e)) if e.is_transient() => {
                    tracing::debug!(parent: &self.span, handle = %handle, error = %e, "Backend throttled");
                    tokio::time::sleep(self.config.throttle_backoff()).await
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Current state of a job, advancing it one step if possible
    ///
    /// Jobs that have not shown a sign of life within the time limit are
    /// failed before responding. For a queued job that is its request time,
    /// so an export waiting on a refresh that never finishes does not wait
    /// forever. A running job whose query finished is post-processed; a job
    /// already converting or compressing belongs to the worker that claimed
    /// the stage and is only reported.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown key.
    pub async fn poll_export(&self, key: &JobKey) -> Result<ExtractionJob> {
        let job = self.jobs.require(key).await?;
        if job.status.is_terminal() {
            return Ok(job);
        }

        let now = Utc::now();
        let limit = chrono::Duration::from_std(self.config.time_limit())
            .map_err(|e| ReportFlowError::Configuration(format!("export.time_limit_seconds: {e}")))?;
        if now - job.last_seen() > limit {
            let error = ReportFlowError::DeadlineExceeded(format!(
                "no sign of life since {}",
                job.last_seen()
            ));
            return self.fail_job(&job, &error, job.deferred_query.as_deref()).await;
        }

        if job.status != JobStatus::Running {
            return Ok(job);
        }
        let Some(handle) = job.backend_handle.clone() else {
            return Ok(job);
        };

        match self.backend.status(&handle).await {
            Ok(QueryState::Queued | QueryState::Running) => return Ok(job),
            Ok(QueryState::Failed { reason }) => {
                let error: ReportFlowError = BackendError::QueryFailed(reason).into();
                return self.fail_job(&job, &error, None).await;
            }
            Ok(QueryState::Succeeded) => {}
            Err(ReportFlowError::Backend(e)) if e.is_transient() => return Ok(job),
            Err(e) => return self.fail_job(&job, &e, None).await,
        }

        match self.post.run(job, &handle).await {
            Ok(current) => Ok(current),
            Err(e) => {
                let current = self.jobs.require(key).await?;
                if current.status.is_terminal() {
                    return Ok(current);
                }
                self.fail_job(&current, &e, None).await
            }
        }
    }

    /// Submit a deferred export once its refresh has finished
    ///
    /// Safe to call repeatedly and concurrently: the job is claimed with a
    /// conditional `Queued -> Running` write right before submission, and
    /// only the caller that wins the claim submits.
    pub async fn resume_deferred_export(
        &self,
        ctx: &TenantContext,
        key: &JobKey,
    ) -> Result<ResumeOutcome> {
        let job = self.jobs.require(key).await?;
        if job.status != JobStatus::Queued {
            return Ok(ResumeOutcome::AlreadyResumed(job));
        }

        let now = Utc::now();
        let view = self.refresh.effective_refresh(ctx, now).await?;
        if view.status == RefreshStatus::InProgress {
            return Ok(ResumeOutcome::StillDeferred(job));
        }

        let Some(query) = job.deferred_query.clone() else {
            let error = ReportFlowError::Other(format!("queued job {key} has no query"));
            return self.fail_job(&job, &error, None).await.map(ResumeOutcome::Resumed);
        };

        // Staleness is measured from the claim, not from the original request
        let claim = FieldUpdate::new().set("last_heartbeat", now);
        let Some(running) = self.jobs.transition(&job, JobStatus::Running, claim).await? else {
            let current = self.jobs.require(key).await?;
            return Ok(ResumeOutcome::AlreadyResumed(current));
        };

        let handle = match self.backend.submit(&query).await {
            Ok(handle) => handle,
            Err(e) => {
                return self
                    .fail_job(&running, &e, Some(&query))
                    .await
                    .map(ResumeOutcome::Resumed)
            }
        };

        let update = FieldUpdate::new()
            .set("backend_handle", &handle)
            .set("deferred_query", Option::<String>::None);
        let resumed = match self.jobs.amend(&running, update).await? {
            Some(job) => job,
            None => self.jobs.require(key).await?,
        };
        tracing::info!(parent: &self.span, job = %key, handle = %handle, "Resumed deferred export");
        Ok(ResumeOutcome::Resumed(resumed))
    }

    /// Issue a fresh download URL for a succeeded job
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the job succeeded with an artifact.
    pub async fn reissue_download_url(&self, key: &JobKey) -> Result<String> {
        let job = self.jobs.require(key).await?;
        let artifact = match (&job.status, &job.artifact_key) {
            (JobStatus::Succeeded, Some(artifact)) => artifact.clone(),
            _ => {
                return Err(ReportFlowError::InvalidTransition(format!(
                    "job {key} is {} and has no artifact to share",
                    job.status
                )))
            }
        };

        let url = self.post.issue_url(&artifact, Utc::now()).await?;
        self.jobs
            .amend(&job, FieldUpdate::new().set("download_url", &url))
            .await?;
        tracing::info!(parent: &self.span, job = %key, "Reissued download URL");
        Ok(url)
    }

    /// Status counts and failures over every stored job
    pub async fn summary(&self) -> Result<JobSummary> {
        Ok(JobSummary::from_jobs(&self.jobs.list().await?))
    }

    async fn fail_job(
        &self,
        job: &ExtractionJob,
        error: &ReportFlowError,
        query: Option<&str>,
    ) -> Result<ExtractionJob> {
        match self.jobs.fail(job, error, query, Utc::now()).await? {
            Some(failed) => Ok(failed),
            None => self.jobs.require(&job.key()).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::InMemoryStore;
    use crate::adapters::objects::{InMemoryObjectStore, UrlSigner};
    use crate::adapters::query::{InMemoryQueryBackend, ScriptStep};
    use crate::adapters::workflow::InMemoryWorkflowEngine;
    use crate::config::{secret_string, RefreshConfig};
    use crate::core::export::job::{ExportFormat, FailureKind};
    use crate::core::refresh::{InstallationClass, RefreshModel, RefreshOutcome, Track};
    use crate::domain::PlatformId;

    struct Fixture {
        manager: ExportJobManager,
        refresh: Arc<RefreshManager>,
        backend: Arc<InMemoryQueryBackend>,
        store: Arc<InMemoryStore>,
    }

    fn fixture(script: Vec<ScriptStep>, workflow: bool) -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let engine: Option<Arc<dyn crate::adapters::workflow::WorkflowEngine>> = if workflow {
            Some(Arc::new(InMemoryWorkflowEngine::new()))
        } else {
            None
        };
        let refresh = Arc::new(RefreshManager::new(
            store.clone(),
            engine,
            RefreshConfig::default(),
        ));
        let backend = Arc::new(
            InMemoryQueryBackend::new()
                .with_script(script)
                .with_result(&["id"], vec![vec!["1"]]),
        );
        let signer =
            UrlSigner::new("https://dl.example.com/", secret_string("k".to_string())).unwrap();
        let manager = ExportJobManager::new(
            store.clone(),
            refresh.clone(),
            backend.clone(),
            Arc::new(InMemoryObjectStore::new(signer)),
            ExportConfig::default(),
        );
        Fixture {
            manager,
            refresh,
            backend,
            store,
        }
    }

    fn legacy() -> TenantContext {
        TenantContext::new(PlatformId::new("acme").unwrap(), RefreshModel::Legacy)
    }

    fn managed() -> TenantContext {
        TenantContext::new(
            PlatformId::new("acme").unwrap(),
            RefreshModel::Managed {
                installation: InstallationClass::Production,
            },
        )
    }

    fn request() -> ExportRequest {
        ExportRequest {
            report_id: ReportId::new("weekly").unwrap(),
            report_name: "Weekly".to_string(),
            query: "SELECT id FROM sales".to_string(),
            options: ExportOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_immediate_submit_then_poll_to_success() {
        let f = fixture(vec![ScriptStep::Running, ScriptStep::Succeeded], false);
        let key = f.manager.submit_export(&legacy(), &request()).await.unwrap();

        let job = f.manager.poll_export(&key).await.unwrap();
        assert_eq!(job.status, JobStatus::Running);

        let job = f.manager.poll_export(&key).await.unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(job.download_url.is_some());

        // Terminal jobs are returned unchanged
        assert_eq!(f.manager.poll_export(&key).await.unwrap(), job);
        assert_eq!(f.backend.status_calls().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_poll_unknown_job_is_not_found() {
        let f = fixture(vec![], false);
        let key = JobKey::new(ReportId::new("nope").unwrap(), ExecutionId::generate());
        assert!(matches!(
            f.manager.poll_export(&key).await,
            Err(ReportFlowError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_backend_failure_is_reported_verbatim() {
        let f = fixture(vec![ScriptStep::Failed("Table sales not found".into())], false);
        let job = f.manager.run_export(&legacy(), &request()).await.unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_kind, Some(FailureKind::BackendReported));
        assert!(job.error_detail.unwrap().contains("Table sales not found"));
        assert_eq!(job.failed_query.as_deref(), Some("SELECT id FROM sales"));
    }

    #[tokio::test]
    async fn test_submission_refusal_fails_job() {
        let f = fixture(vec![], false);
        f.backend
            .fail_submissions(Some(BackendError::ConnectionFailed("down".into())))
            .unwrap();

        let key = f.manager.submit_export(&legacy(), &request()).await.unwrap();
        let job = f.manager.poll_export(&key).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_kind, Some(FailureKind::Internal));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttling_is_retried() {
        let f = fixture(
            vec![
                ScriptStep::Throttled,
                ScriptStep::Throttled,
                ScriptStep::Running,
                ScriptStep::Succeeded,
            ],
            false,
        );
        let job = f.manager.run_export(&legacy(), &request()).await.unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert_eq!(f.backend.status_calls().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_needed_refresh_defers_export() {
        let f = fixture(vec![], true);
        let key = f.manager.submit_export(&managed(), &request()).await.unwrap();

        let job = f.manager.poll_export(&key).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.deferred_query.as_deref(), Some("SELECT id FROM sales"));
        assert!(f.backend.submitted().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_needed_refresh_without_engine_runs_immediately() {
        let f = fixture(vec![], false);
        let job = f.manager.run_export(&managed(), &request()).await.unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_poll_fails_export_stuck_behind_refresh() {
        let f = fixture(vec![], true);
        let ctx = managed();
        let key = f.manager.submit_export(&ctx, &request()).await.unwrap();

        // The triggered refresh never reports back
        let old = Utc::now() - chrono::Duration::days(3);
        f.store
            .update(&key.record_key(), &FieldUpdate::new().set("started_at", old))
            .await
            .unwrap();

        let job = f.manager.poll_export(&key).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_kind, Some(FailureKind::DeadlineExceeded));
        assert_eq!(job.failed_query.as_deref(), Some("SELECT id FROM sales"));
        assert!(job.deferred_query.is_none());

        assert!(matches!(
            f.manager.resume_deferred_export(&ctx, &key).await.unwrap(),
            ResumeOutcome::AlreadyResumed(_)
        ));
        assert!(f.backend.submitted().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_poll_leaves_claimed_stage_to_its_worker() {
        let f = fixture(vec![], false);
        let mut req = request();
        req.options.format = ExportFormat::Xlsx;
        let key = f.manager.submit_export(&legacy(), &req).await.unwrap();

        let running = f.manager.jobs().require(&key).await.unwrap();
        f.manager
            .jobs()
            .transition(
                &running,
                JobStatus::Converting,
                FieldUpdate::new().set("last_heartbeat", Utc::now()),
            )
            .await
            .unwrap()
            .unwrap();

        let job = f.manager.poll_export(&key).await.unwrap();
        assert_eq!(job.status, JobStatus::Converting);
        assert!(job.error_detail.is_none());
        assert_eq!(f.backend.status_calls().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_resume_is_idempotent() {
        let f = fixture(vec![], true);
        let ctx = managed();
        let key = f.manager.submit_export(&ctx, &request()).await.unwrap();

        assert!(matches!(
            f.manager.resume_deferred_export(&ctx, &key).await.unwrap(),
            ResumeOutcome::StillDeferred(_)
        ));

        f.refresh
            .complete_refresh(&ctx.platform, Track::OnDemand, RefreshOutcome::Succeeded, Utc::now())
            .await
            .unwrap();

        let ResumeOutcome::Resumed(job) =
            f.manager.resume_deferred_export(&ctx, &key).await.unwrap()
        else {
            panic!("expected the first resume to submit");
        };
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.backend_handle.is_some());
        assert!(job.deferred_query.is_none());

        assert!(matches!(
            f.manager.resume_deferred_export(&ctx, &key).await.unwrap(),
            ResumeOutcome::AlreadyResumed(_)
        ));
        assert_eq!(f.backend.submitted().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_poll_fails_stale_job_permanently() {
        let f = fixture(vec![ScriptStep::Running], false);
        let key = f.manager.submit_export(&legacy(), &request()).await.unwrap();

        // Pretend the job was last seen long ago
        let record = key.record_key();
        let old = Utc::now() - chrono::Duration::hours(2);
        f.store
            .update(
                &record,
                &FieldUpdate::new()
                    .set("started_at", old)
                    .set("last_heartbeat", old),
            )
            .await
            .unwrap();

        let job = f.manager.poll_export(&key).await.unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failure_kind, Some(FailureKind::DeadlineExceeded));
        assert_eq!(f.manager.poll_export(&key).await.unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_reissue_download_url() {
        let f = fixture(vec![], false);
        let mut req = request();
        req.options = ExportOptions {
            format: ExportFormat::Xlsx,
            compress: true,
        };
        let job = f.manager.run_export(&legacy(), &req).await.unwrap();
        assert_eq!(job.status, JobStatus::Succeeded);
        assert!(job.artifact_key.as_deref().unwrap().ends_with(".xlsx.zip"));

        let url = f.manager.reissue_download_url(&job.key()).await.unwrap();
        let stored = f.manager.poll_export(&job.key()).await.unwrap();
        assert_eq!(stored.download_url, Some(url));
    }

    #[tokio::test]
    async fn test_reissue_rejected_for_failed_job() {
        let f = fixture(vec![ScriptStep::Failed("boom".into())], false);
        let job = f.manager.run_export(&legacy(), &request()).await.unwrap();
        assert!(matches!(
            f.manager.reissue_download_url(&job.key()).await,
            Err(ReportFlowError::InvalidTransition(_))
        ));
    }

    #[tokio::test]
    async fn test_summary_counts_statuses() {
        let f = fixture(vec![], false);
        f.manager.run_export(&legacy(), &request()).await.unwrap();
        f.manager.submit_export(&legacy(), &request()).await.unwrap();

        let summary = f.manager.summary().await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.by_status.get(&JobStatus::Succeeded), Some(&1));
        assert_eq!(summary.by_status.get(&JobStatus::Running), Some(&1));
    }
}
