//! Analytical query backend abstraction
//!
//! Exports run as asynchronous queries: submit returns a handle, the handle
//! is polled until the backend reports a terminal state, then the tabular
//! result is streamed out.

pub mod memory;

use crate::domain::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use memory::{InMemoryQueryBackend, ScriptStep};

/// Backend-assigned identifier of a submitted query
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryHandle(String);

impl QueryHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution state reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState {
    Queued,
    Running,
    Succeeded,
    /// Backend-reported failure; the reason is surfaced verbatim
    Failed { reason: String },
}

impl QueryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryState::Succeeded | QueryState::Failed { .. })
    }
}

/// Result set of a finished query
pub struct TabularResult {
    /// Column header
    pub columns: Vec<String>,
    /// Rows in header order
    pub rows: BoxStream<'static, Result<Vec<String>>>,
}

impl fmt::Debug for TabularResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabularResult")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// Query backend trait
///
/// Throttling is reported as [`BackendError::Throttled`](crate::domain::BackendError)
/// from `status`; callers back off and retry.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Submit a query for asynchronous execution
    async fn submit(&self, sql: &str) -> Result<QueryHandle>;

    /// Check the state of a submitted query
    async fn status(&self, handle: &QueryHandle) -> Result<QueryState>;

    /// Stream the result of a succeeded query
    async fn fetch_result(&self, handle: &QueryHandle) -> Result<TabularResult>;
}
