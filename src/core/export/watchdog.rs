//! Deadline and heartbeat for in-process export runs
//!
//! The work future races a deadline timer. While it runs, a spawned task
//! touches the job's `last_heartbeat` so other processes polling the job can
//! tell it is alive. The heartbeat task stops when its guard is dropped.

use crate::core::export::job::{JobKey, JobStore};
use crate::domain::{ReportFlowError, Result};
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::Span;

/// Instant by which an export must finish
///
/// Shared by value between the deadline race and the backend polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
        }
    }

    pub fn at(&self) -> Instant {
        self.at
    }

    pub fn has_expired(&self) -> bool {
        Instant::now() >= self.at
    }

    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

/// Run `work` unless `deadline` passes first
///
/// When the deadline wins the work future is dropped; nothing is cancelled
/// on the backend.
pub async fn run_until<F, T>(deadline: Deadline, work: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        result = work => result,
        _ = tokio::time::sleep_until(deadline.at()) => Err(ReportFlowError::DeadlineExceeded(
            "export did not finish within its time limit".to_string(),
        )),
    }
}

/// Aborts the heartbeat task when dropped
pub struct HeartbeatGuard {
    handle: JoinHandle<()>,
}

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Touch the job every `interval` until the guard is dropped or the job is terminal
pub fn spawn_heartbeat(
    jobs: JobStore,
    key: JobKey,
    interval: Duration,
    span: Span,
) -> HeartbeatGuard {
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match jobs.heartbeat(&key, Utc::now()).await {
                Ok(true) => tracing::debug!(parent: &span, job = %key, "Heartbeat"),
                Ok(false) => break,
                Err(e) => {
                    tracing::warn!(parent: &span, job = %key, error = %e, "Heartbeat write failed")
                }
            }
        }
    });
    HeartbeatGuard { handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::database::InMemoryStore;
    use crate::adapters::query::QueryHandle;
    use crate::core::export::job::{ExportOptions, ExtractionJob};
    use crate::domain::{ExecutionId, PlatformId, ReportId};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_wins_over_slow_work() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let result: Result<()> = run_until(deadline, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(ReportFlowError::DeadlineExceeded(_))));
        assert!(deadline.has_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_work_wins() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let result = run_until(deadline, async { Ok(7) }).await.unwrap();
        assert_eq!(result, 7);
        assert!(!deadline.has_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_touches_job_until_dropped() {
        let jobs = JobStore::new(Arc::new(InMemoryStore::new()));
        let key = JobKey::new(
            ReportId::new("weekly").unwrap(),
            ExecutionId::new("e-1").unwrap(),
        );
        let job = ExtractionJob::running(
            &key,
            PlatformId::new("acme").unwrap(),
            "Weekly",
            ExportOptions::default(),
            QueryHandle::new("q-1"),
            Utc::now(),
        );
        jobs.create(&job).await.unwrap();

        let guard = spawn_heartbeat(
            jobs.clone(),
            key.clone(),
            Duration::from_secs(60),
            Span::none(),
        );
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(jobs.require(&key).await.unwrap().last_heartbeat.is_some());

        drop(guard);
        let seen = jobs.require(&key).await.unwrap().last_heartbeat;
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(jobs.require(&key).await.unwrap().last_heartbeat, seen);
    }
}
