//! Refresh state machine
//!
//! [`RefreshManager`] owns the per-tenant refresh record and token budget.
//! Every mutation is a partial conditional update against the shared store,
//! so concurrent writers touching different fields of the same record do
//! not overwrite each other.

use crate::adapters::database::{
    decode_document, load_document, Collection, FieldUpdate, KeyValueStore, RecordKey,
    UpdateOutcome,
};
use crate::adapters::workflow::{WorkflowEngine, WorkflowStatus};
use crate::config::RefreshConfig;
use crate::core::refresh::budget::{BudgetReset, RefreshTokenBudget};
use crate::core::refresh::model::{evaluate, EffectiveRefresh, TenantContext};
use crate::core::refresh::record::{RefreshOutcome, RefreshRecord, RefreshStatus, Track};
use crate::domain::{PlatformId, ReportFlowError, Result};
use crate::log_refresh_transition;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::Span;

/// Result of [`RefreshManager::begin_refresh`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    Started,
    /// Another caller already holds the scheduled track
    AlreadyInProgress,
}

/// Result of [`RefreshManager::reconcile_with_workflow`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing to reconcile: no record, no execution id, no engine or the
    /// scheduled track is not running
    NotApplicable,
    StillRunning,
    Succeeded,
    Failed,
    /// The status check failed; the record was left unchanged
    StatusUnavailable,
}

/// Result of [`RefreshManager::trigger_on_demand_refresh`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Triggered { execution_id: String },
    /// No token left today or this month
    BudgetExhausted,
}

/// Per-tenant refresh state machine
pub struct RefreshManager {
    store: Arc<dyn KeyValueStore>,
    workflow: Option<Arc<dyn WorkflowEngine>>,
    config: RefreshConfig,
    span: Span,
}

impl RefreshManager {
    /// Create a manager over the shared store
    ///
    /// Without a workflow engine on-demand refreshes cannot be triggered and
    /// reconciliation is a no-op.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        workflow: Option<Arc<dyn WorkflowEngine>>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            store,
            workflow,
            config,
            span: tracing::info_span!("refresh_manager"),
        }
    }

    /// Replace the span events are emitted under
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Load a tenant's refresh record
    pub async fn load_record(&self, platform: &PlatformId) -> Result<Option<RefreshRecord>> {
        load_document(self.store.as_ref(), &RecordKey::refresh(platform)).await
    }

    /// Create the record with both tracks unset unless one exists
    async fn ensure_record(&self, platform: &PlatformId) -> Result<()> {
        let record = serde_json::to_value(RefreshRecord::new(platform.clone()))?;
        if self
            .store
            .put_if_absent(&RecordKey::refresh(platform), record)
            .await?
        {
            tracing::debug!(parent: &self.span, platform = %platform, "Created refresh record");
        }
        Ok(())
    }

    async fn update_record(
        &self,
        platform: &PlatformId,
        update: &FieldUpdate,
    ) -> Result<UpdateOutcome> {
        match self
            .store
            .update(&RecordKey::refresh(platform), update)
            .await?
        {
            UpdateOutcome::NotFound => Err(ReportFlowError::NotFound(format!(
                "refresh record for platform {platform}"
            ))),
            outcome => Ok(outcome),
        }
    }

    /// Freshness view used to gate report execution
    pub async fn effective_refresh(
        &self,
        ctx: &TenantContext,
        now: DateTime<Utc>,
    ) -> Result<EffectiveRefresh> {
        let record = self.load_record(&ctx.platform).await?;
        Ok(evaluate(
            record.as_ref(),
            ctx.model,
            &self.config.expiration_hours,
            now,
        ))
    }

    /// Mark a track as running
    ///
    /// Starting the scheduled track is exclusive: the write only lands when
    /// the scheduled track is not already running, and it forces the
    /// on-demand track to `Error` in the same write. Starting the on-demand
    /// track is unconditional.
    pub async fn begin_refresh(
        &self,
        platform: &PlatformId,
        track: Track,
        now: DateTime<Utc>,
    ) -> Result<BeginOutcome> {
        self.ensure_record(platform).await?;

        let update = match track {
            Track::Scheduled => FieldUpdate::new()
                .when_not_equals(&Track::Scheduled.status_path(), RefreshStatus::InProgress)
                .set(&Track::Scheduled.status_path(), RefreshStatus::InProgress)
                .set(&Track::Scheduled.last_update_path(), now)
                .set("last_refresh_start", now)
                .set(&Track::OnDemand.status_path(), RefreshStatus::Error)
                .set(&Track::OnDemand.last_update_path(), now),
            Track::OnDemand => FieldUpdate::new()
                .set(&Track::OnDemand.status_path(), RefreshStatus::InProgress)
                .set(&Track::OnDemand.last_update_path(), now),
        };

        match self.update_record(platform, &update).await? {
            UpdateOutcome::Applied(_) => {
                log_refresh_transition!(parent: &self.span, platform, track, RefreshStatus::InProgress);
                Ok(BeginOutcome::Started)
            }
            _ => {
                tracing::info!(
                    parent: &self.span,
                    platform = %platform,
                    track = %track,
                    "Refresh already in progress"
                );
                Ok(BeginOutcome::AlreadyInProgress)
            }
        }
    }

    /// Record the terminal status of a track
    ///
    /// `Error` increments the error count; `Succeeded` clears it.
    pub async fn complete_refresh(
        &self,
        platform: &PlatformId,
        track: Track,
        outcome: RefreshOutcome,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_record(platform).await?;

        let update = FieldUpdate::new()
            .set(&track.status_path(), outcome.status())
            .set(&track.last_update_path(), now);
        let update = match outcome {
            RefreshOutcome::Error => update.increment("error_count", 1),
            RefreshOutcome::Succeeded => update.set("error_count", 0),
        };

        self.update_record(platform, &update).await?;
        log_refresh_transition!(parent: &self.span, platform, track, outcome.status());
        Ok(())
    }

    /// Fail a nightly refresh that has run longer than `timeout_minutes`
    ///
    /// Only applies when the scheduled track is running and the on-demand
    /// track is not. The write is guarded on the observed `last_update`, so a
    /// refresh restarted in the meantime is left alone.
    ///
    /// # Returns
    ///
    /// `true` if the scheduled track was forced to `Error`
    pub async fn detect_nightly_timeout(
        &self,
        platform: &PlatformId,
        timeout_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(record) = self.load_record(platform).await? else {
            return Ok(false);
        };
        self.expire_if_stale(&record, timeout_minutes, now).await
    }

    async fn expire_if_stale(
        &self,
        record: &RefreshRecord,
        timeout_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if !record.scheduled.is_in_progress() || record.on_demand.is_in_progress() {
            return Ok(false);
        }
        let Some(started) = record.scheduled.last_update else {
            return Ok(false);
        };
        if now - started <= Duration::minutes(i64::from(timeout_minutes)) {
            return Ok(false);
        }

        let update = FieldUpdate::new()
            .when_equals(&Track::Scheduled.status_path(), RefreshStatus::InProgress)
            .when_equals(&Track::Scheduled.last_update_path(), started)
            .set(&Track::Scheduled.status_path(), RefreshStatus::Error)
            .set(&Track::Scheduled.last_update_path(), now)
            .increment("error_count", 1);

        let expired = self
            .update_record(&record.platform, &update)
            .await?
            .is_applied();
        if expired {
            tracing::warn!(
                parent: &self.span,
                platform = %record.platform,
                started = %started,
                timeout_minutes,
                "Nightly refresh timed out"
            );
        }
        Ok(expired)
    }

    /// Run the nightly timeout check over every stored record
    ///
    /// Records that cannot be decoded or updated are logged and skipped.
    ///
    /// # Returns
    ///
    /// Platforms whose scheduled track was forced to `Error`
    pub async fn sweep_nightly_timeouts(
        &self,
        timeout_minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<PlatformId>> {
        let mut expired = Vec::new();
        for (key, document) in self.store.list(Collection::Refresh).await? {
            let outcome = match decode_document::<RefreshRecord>(&key, document) {
                Ok(record) => self
                    .expire_if_stale(&record, timeout_minutes, now)
                    .await
                    .map(|hit| hit.then_some(record.platform)),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(Some(platform)) => expired.push(platform),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(parent: &self.span, key = %key, error = %e, "Watchdog skipped record")
                }
            }
        }
        Ok(expired)
    }

    /// Bring a running scheduled refresh in line with its workflow execution
    ///
    /// Failures of the status check are logged and leave the record as is.
    pub async fn reconcile_with_workflow(
        &self,
        platform: &PlatformId,
        now: DateTime<Utc>,
    ) -> Result<ReconcileOutcome> {
        let Some(engine) = self.workflow.as_ref() else {
            return Ok(ReconcileOutcome::NotApplicable);
        };
        let Some(record) = self.load_record(platform).await? else {
            return Ok(ReconcileOutcome::NotApplicable);
        };
        let Some(execution_id) = record.workflow_execution_id.clone() else {
            return Ok(ReconcileOutcome::NotApplicable);
        };
        if !record.scheduled.is_in_progress() {
            return Ok(ReconcileOutcome::NotApplicable);
        }

        let status = match engine.status(&execution_id).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(
                    parent: &self.span,
                    platform = %platform,
                    execution_id = %execution_id,
                    error = %e,
                    "Workflow status check failed"
                );
                return Ok(ReconcileOutcome::StatusUnavailable);
            }
        };

        let (final_status, outcome) = match status {
            WorkflowStatus::Running => return Ok(ReconcileOutcome::StillRunning),
            WorkflowStatus::Succeeded => (RefreshStatus::Succeeded, ReconcileOutcome::Succeeded),
            WorkflowStatus::Failed => (RefreshStatus::Error, ReconcileOutcome::Failed),
        };

        let mut update = FieldUpdate::new()
            .when_equals("workflow_execution_id", &execution_id)
            .when_equals(&Track::Scheduled.status_path(), RefreshStatus::InProgress);
        for track in [Track::Scheduled, Track::OnDemand] {
            update = update
                .set(&track.status_path(), final_status)
                .set(&track.last_update_path(), now);
        }
        update = match final_status {
            RefreshStatus::Error => update.increment("error_count", 1),
            _ => update.set("error_count", 0),
        };

        if !self.update_record(platform, &update).await?.is_applied() {
            return Ok(ReconcileOutcome::NotApplicable);
        }

        log_refresh_transition!(parent: &self.span, platform, "all", final_status);
        Ok(outcome)
    }

    /// Take one on-demand refresh token
    ///
    /// Counters are refilled first when a new UTC day or month has started.
    ///
    /// # Returns
    ///
    /// `false` when the daily or monthly allowance is used up
    pub async fn consume_token(&self, platform: &PlatformId, now: DateTime<Utc>) -> Result<bool> {
        let key = RecordKey::token_budget(platform);
        let limits = self.config.token_limits();

        let fresh = serde_json::to_value(RefreshTokenBudget::new(limits, now))?;
        self.store.put_if_absent(&key, fresh).await?;

        let budget: RefreshTokenBudget = load_document(self.store.as_ref(), &key)
            .await?
            .ok_or_else(|| ReportFlowError::NotFound(format!("token budget for {platform}")))?;

        let reset = match budget.reset_due(now) {
            BudgetReset::None => None,
            BudgetReset::Daily => Some(FieldUpdate::new().set("daily_remaining", limits.daily)),
            BudgetReset::Monthly => Some(
                FieldUpdate::new()
                    .set("daily_remaining", limits.daily)
                    .set("monthly_remaining", limits.monthly),
            ),
        };
        if let Some(reset) = reset {
            // A concurrent consumer may win the refill; either way it happened once
            let reset = reset
                .when_equals("last_reset", budget.last_reset)
                .set("last_reset", now);
            self.store.update(&key, &reset).await?;
        }

        let take = FieldUpdate::new()
            .when_greater_than("daily_remaining", 0)
            .when_greater_than("monthly_remaining", 0)
            .increment("daily_remaining", -1)
            .increment("monthly_remaining", -1)
            .set("last_request", now);

        let consumed = self.store.update(&key, &take).await?.is_applied();
        if !consumed {
            tracing::info!(parent: &self.span, platform = %platform, "Refresh token budget exhausted");
        }
        Ok(consumed)
    }

    /// Hand back one daily and one monthly token
    pub async fn restore_token_budget(&self, platform: &PlatformId) -> Result<()> {
        let update = FieldUpdate::new()
            .increment("daily_remaining", 1)
            .increment("monthly_remaining", 1);

        match self
            .store
            .update(&RecordKey::token_budget(platform), &update)
            .await?
        {
            UpdateOutcome::NotFound => Err(ReportFlowError::NotFound(format!(
                "token budget for {platform}"
            ))),
            _ => {
                tracing::info!(parent: &self.span, platform = %platform, "Restored refresh token");
                Ok(())
            }
        }
    }

    /// Start an on-demand refresh through the workflow engine
    ///
    /// Consumes a token, starts the execution, records its id and marks the
    /// on-demand track as running. The token is handed back if the engine
    /// refuses the start.
    ///
    /// # Errors
    ///
    /// Returns an error if no workflow engine is configured or the engine
    /// could not start the refresh.
    pub async fn trigger_on_demand_refresh(
        &self,
        platform: &PlatformId,
        now: DateTime<Utc>,
    ) -> Result<TriggerOutcome> {
        let engine = self.workflow.as_ref().ok_or_else(|| {
            ReportFlowError::Configuration("no workflow engine configured".to_string())
        })?;

        if !self.consume_token(platform, now).await? {
            return Ok(TriggerOutcome::BudgetExhausted);
        }

        let execution_id = match engine.start_refresh(platform).await {
            Ok(id) => id,
            Err(e) => {
                self.restore_token_budget(platform).await?;
                return Err(e);
            }
        };

        self.ensure_record(platform).await?;
        self.update_record(
            platform,
            &FieldUpdate::new().set("workflow_execution_id", &execution_id),
        )
        .await?;
        self.begin_refresh(platform, Track::OnDemand, now).await?;

        Ok(TriggerOutcome::Triggered { execution_id })
    }

    /// Downstream ingestion reported that an on-demand refresh produced nothing
    pub async fn report_ingestion_failure(
        &self,
        platform: &PlatformId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.complete_refresh(platform, Track::OnDemand, RefreshOutcome::Error, now)
            .await?;
        self.restore_token_budget(platform).await
    }
}
