//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - JSON-formatted file logs with rotation
//! - Configurable log levels
//! - Helper macros for the state transitions operators search for
//!
//! Components never look up an ambient logger: each one owns a
//! [`tracing::Span`] handed in at construction and the macros below take
//! that span as an explicit `parent`.
//!
//! # Example
//!
//! ```no_run
//! use reportflow::logging::init_logging;
//! use reportflow::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log an export job status change
///
/// # Example
///
/// ```no_run
/// use reportflow::log_job_transition;
///
/// let span = tracing::info_span!("export");
/// log_job_transition!(parent: &span, "weekly#e-1", "queued", "running");
/// ```
#[macro_export]
macro_rules! log_job_transition {
    (parent: $span:expr, $job:expr, $from:expr, $to:expr) => {
        tracing::info!(
            parent: $span,
            job = %$job,
            from = %$from,
            to = %$to,
            "Export job transition"
        );
    };
}

/// Log a refresh track status change
///
/// # Example
///
/// ```no_run
/// use reportflow::log_refresh_transition;
///
/// let span = tracing::info_span!("refresh");
/// log_refresh_transition!(parent: &span, "acme", "scheduled", "in_progress");
/// ```
#[macro_export]
macro_rules! log_refresh_transition {
    (parent: $span:expr, $platform:expr, $track:expr, $status:expr) => {
        tracing::info!(
            parent: $span,
            platform = %$platform,
            track = %$track,
            status = %$status,
            "Refresh track transition"
        );
    };
}

/// Log a retry attempt
///
/// # Example
///
/// ```no_run
/// use reportflow::log_retry_attempt;
///
/// let span = tracing::info_span!("workflow");
/// log_retry_attempt!(parent: &span, 2, 3, "Connection timeout");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    (parent: $span:expr, $attempt:expr, $max_attempts:expr, $reason:expr) => {
        tracing::warn!(
            parent: $span,
            attempt = $attempt,
            max_attempts = $max_attempts,
            reason = %$reason,
            "Retrying operation"
        );
    };
}
