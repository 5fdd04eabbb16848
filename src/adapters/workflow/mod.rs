//! Refresh workflow engine integration
//!
//! On-demand refreshes run as executions of an external workflow engine.
//! The refresh state machine starts executions and later reconciles its
//! record with their status.

pub mod http;
pub mod memory;

use crate::domain::{PlatformId, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use http::HttpWorkflowEngine;
pub use memory::InMemoryWorkflowEngine;

/// Status of one workflow execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Queued or executing
    Running,
    Succeeded,
    /// Failed, aborted or timed out
    Failed,
}

impl WorkflowStatus {
    /// Maps the engine's status vocabulary onto [`WorkflowStatus`]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "pending" | "queued" | "running" => Some(WorkflowStatus::Running),
            "succeeded" | "success" | "completed" => Some(WorkflowStatus::Succeeded),
            "failed" | "aborted" | "timed_out" | "cancelled" => Some(WorkflowStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkflowStatus::Running => "running",
            WorkflowStatus::Succeeded => "succeeded",
            WorkflowStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Workflow engine trait
///
/// Implementations translate transport failures into
/// [`WorkflowError`](crate::domain::WorkflowError).
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Start a data refresh for a tenant
    ///
    /// # Returns
    ///
    /// The execution id assigned by the engine
    async fn start_refresh(&self, platform: &PlatformId) -> Result<String>;

    /// Current status of an execution
    async fn status(&self, execution_id: &str) -> Result<WorkflowStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_vocabulary() {
        assert_eq!(WorkflowStatus::parse("RUNNING"), Some(WorkflowStatus::Running));
        assert_eq!(WorkflowStatus::parse("queued"), Some(WorkflowStatus::Running));
        assert_eq!(
            WorkflowStatus::parse("completed"),
            Some(WorkflowStatus::Succeeded)
        );
        assert_eq!(WorkflowStatus::parse("timed_out"), Some(WorkflowStatus::Failed));
        assert_eq!(WorkflowStatus::parse("exploded"), None);
    }
}
