//! In-process workflow engine for tests and local runs

use super::{WorkflowEngine, WorkflowStatus};
use crate::domain::{PlatformId, ReportFlowError, Result, WorkflowError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct State {
    next_id: u64,
    executions: HashMap<String, WorkflowStatus>,
    started: Vec<PlatformId>,
    fail_start: bool,
    fail_status: bool,
}

/// Workflow engine whose executions are driven by the test
///
/// Started executions are `Running` until [`InMemoryWorkflowEngine::finish`]
/// is called.
#[derive(Default)]
pub struct InMemoryWorkflowEngine {
    state: Mutex<State>,
}

impl InMemoryWorkflowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| ReportFlowError::Other("workflow engine lock poisoned".to_string()))
    }

    /// Registers an execution with a known id and status
    pub fn insert(&self, execution_id: &str, status: WorkflowStatus) -> Result<()> {
        self.lock()?
            .executions
            .insert(execution_id.to_string(), status);
        Ok(())
    }

    /// Moves an execution to its final status
    pub fn finish(&self, execution_id: &str, status: WorkflowStatus) -> Result<()> {
        self.insert(execution_id, status)
    }

    /// Makes every subsequent `start_refresh` fail
    pub fn fail_starts(&self, fail: bool) -> Result<()> {
        self.lock()?.fail_start = fail;
        Ok(())
    }

    /// Makes every subsequent `status` call fail
    pub fn fail_status_checks(&self, fail: bool) -> Result<()> {
        self.lock()?.fail_status = fail;
        Ok(())
    }

    /// Platforms refreshes were started for, in order
    pub fn started(&self) -> Result<Vec<PlatformId>> {
        Ok(self.lock()?.started.clone())
    }
}

#[async_trait]
impl WorkflowEngine for InMemoryWorkflowEngine {
    async fn start_refresh(&self, platform: &PlatformId) -> Result<String> {
        let mut state = self.lock()?;
        if state.fail_start {
            return Err(WorkflowError::ServerError {
                status: 503,
                message: "workflow engine unavailable".to_string(),
            }
            .into());
        }

        state.next_id += 1;
        let execution_id = format!("wf-{}-{}", platform, state.next_id);
        state
            .executions
            .insert(execution_id.clone(), WorkflowStatus::Running);
        state.started.push(platform.clone());
        Ok(execution_id)
    }

    async fn status(&self, execution_id: &str) -> Result<WorkflowStatus> {
        let state = self.lock()?;
        if state.fail_status {
            return Err(WorkflowError::ConnectionFailed("connection reset".to_string()).into());
        }
        state
            .executions
            .get(execution_id)
            .copied()
            .ok_or_else(|| WorkflowError::ExecutionNotFound(execution_id.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_started_execution_runs_until_finished() {
        let engine = InMemoryWorkflowEngine::new();
        let platform = PlatformId::new("acme").unwrap();

        let id = engine.start_refresh(&platform).await.unwrap();
        assert_eq!(engine.status(&id).await.unwrap(), WorkflowStatus::Running);

        engine.finish(&id, WorkflowStatus::Succeeded).unwrap();
        assert_eq!(engine.status(&id).await.unwrap(), WorkflowStatus::Succeeded);
        assert_eq!(engine.started().unwrap(), vec![platform]);
    }

    #[tokio::test]
    async fn test_unknown_execution() {
        let engine = InMemoryWorkflowEngine::new();
        let err = engine.status("missing").await.unwrap_err();
        assert!(matches!(
            err,
            ReportFlowError::Workflow(WorkflowError::ExecutionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_start_failure() {
        let engine = InMemoryWorkflowEngine::new();
        engine.fail_starts(true).unwrap();
        let platform = PlatformId::new("acme").unwrap();
        assert!(engine.start_refresh(&platform).await.is_err());
        assert!(engine.started().unwrap().is_empty());
    }
}
