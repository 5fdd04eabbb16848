//! Export job orchestration
//!
//! This module provides the export path of reportflow, including:
//! - Extraction job records and their forward-only lifecycle
//! - Deadline and heartbeat for in-process runs
//! - Post-processing into CSV, spreadsheet and archive artifacts
//! - Summary and reporting

pub mod job;
pub mod manager;
pub mod pipeline;
pub mod summary;
pub mod watchdog;

pub use job::{
    ExportFormat, ExportOptions, ExtractionJob, FailureKind, JobKey, JobStatus, JobStore,
};
pub use manager::{ExportJobManager, ExportRequest, ResumeOutcome, SubmissionDecision};
pub use pipeline::{ArtifactPaths, PostProcessor};
pub use summary::{FailedJob, JobSummary};
pub use watchdog::{run_until, spawn_heartbeat, Deadline, HeartbeatGuard};
