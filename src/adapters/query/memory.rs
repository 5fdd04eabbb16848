//! Scripted in-process query backend
//!
//! Every submitted query walks through the configured script, one step per
//! `status` call; the last step repeats forever. An empty script means the
//! query succeeds on the first check.

use super::{QueryBackend, QueryHandle, QueryState, TabularResult};
use crate::domain::{BackendError, ReportFlowError, Result};
use async_trait::async_trait;
use futures::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// One scripted answer to a `status` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    Queued,
    Running,
    Throttled,
    Succeeded,
    Failed(String),
}

struct Execution {
    sql: String,
    script: VecDeque<ScriptStep>,
    last: ScriptStep,
}

#[derive(Default)]
struct State {
    next_id: u64,
    script: Vec<ScriptStep>,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    submit_error: Option<BackendError>,
    executions: HashMap<QueryHandle, Execution>,
    submitted: Vec<String>,
    status_calls: usize,
}

/// Query backend driven by a script
#[derive(Default)]
pub struct InMemoryQueryBackend {
    state: Mutex<State>,
}

impl InMemoryQueryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| ReportFlowError::Other("query backend lock poisoned".to_string()))
    }

    /// Script used for queries submitted from now on
    pub fn with_script(self, steps: Vec<ScriptStep>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.script = steps;
        }
        self
    }

    /// Result returned for every succeeded query
    pub fn with_result(self, columns: &[&str], rows: Vec<Vec<&str>>) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.columns = columns.iter().map(|c| c.to_string()).collect();
            state.rows = rows
                .into_iter()
                .map(|r| r.into_iter().map(str::to_string).collect())
                .collect();
        }
        self
    }

    /// Makes subsequent submissions fail with `error`, or succeed again with `None`
    pub fn fail_submissions(&self, error: Option<BackendError>) -> Result<()> {
        self.lock()?.submit_error = error;
        Ok(())
    }

    /// Every query text submitted so far, in order
    pub fn submitted(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.submitted.clone())
    }

    /// Number of `status` calls served
    pub fn status_calls(&self) -> Result<usize> {
        Ok(self.lock()?.status_calls)
    }

    /// Query text behind a handle
    pub fn sql_for(&self, handle: &QueryHandle) -> Result<Option<String>> {
        Ok(self.lock()?.executions.get(handle).map(|e| e.sql.clone()))
    }
}

#[async_trait]
impl QueryBackend for InMemoryQueryBackend {
    async fn submit(&self, sql: &str) -> Result<QueryHandle> {
        let mut state = self.lock()?;
        if let Some(err) = state.submit_error.clone() {
            return Err(err.into());
        }

        state.next_id += 1;
        let handle = QueryHandle::new(format!("q-{}", state.next_id));
        let execution = Execution {
            sql: sql.to_string(),
            script: state.script.iter().cloned().collect(),
            last: ScriptStep::Succeeded,
        };
        state.executions.insert(handle.clone(), execution);
        state.submitted.push(sql.to_string());
        Ok(handle)
    }

    async fn status(&self, handle: &QueryHandle) -> Result<QueryState> {
        let mut state = self.lock()?;
        state.status_calls += 1;

        let execution = state
            .executions
            .get_mut(handle)
            .ok_or_else(|| BackendError::UnknownExecution(handle.to_string()))?;

        let step = match execution.script.pop_front() {
            Some(step) => {
                execution.last = step.clone();
                step
            }
            None => execution.last.clone(),
        };

        match step {
            ScriptStep::Queued => Ok(QueryState::Queued),
            ScriptStep::Running => Ok(QueryState::Running),
            ScriptStep::Succeeded => Ok(QueryState::Succeeded),
            ScriptStep::Failed(reason) => Ok(QueryState::Failed { reason }),
            ScriptStep::Throttled => {
                Err(BackendError::Throttled("rate exceeded".to_string()).into())
            }
        }
    }

    async fn fetch_result(&self, handle: &QueryHandle) -> Result<TabularResult> {
        let state = self.lock()?;
        if !state.executions.contains_key(handle) {
            return Err(BackendError::UnknownExecution(handle.to_string()).into());
        }

        let rows: Vec<Result<Vec<String>>> = state.rows.iter().cloned().map(Ok).collect();
        Ok(TabularResult {
            columns: state.columns.clone(),
            rows: Box::pin(stream::iter(rows)),
        })
    }
}
