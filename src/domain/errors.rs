//! Domain error types
//!
//! This module defines the error hierarchy for reportflow. All errors are
//! domain-specific and don't expose third-party types; adapters translate
//! driver errors into [`StoreError`], [`BackendError`] or [`WorkflowError`].

use thiserror::Error;

/// Main reportflow error type
///
/// This is the primary error type used throughout the library.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum ReportFlowError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No record exists for the requested tenant, report or job.
    /// Surfaced to the caller and never retried.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Key-value store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Query backend errors
    #[error("Query backend error: {0}")]
    Backend(#[from] BackendError),

    /// Workflow engine errors
    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// Object store errors
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Locally detected timeout of an export job
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Rejected state transition
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

/// Key-value store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to reach the store
    #[error("Failed to connect to store: {0}")]
    ConnectionFailed(String),

    /// A read or write failed
    #[error("Store query failed: {0}")]
    QueryFailed(String),

    /// Stored document could not be decoded
    #[error("Corrupt document {key}: {message}")]
    CorruptDocument { key: String, message: String },

    /// Update targeted a field that is not an object/number as expected
    #[error("Invalid field update on {path}: {message}")]
    InvalidUpdate { path: String, message: String },
}

/// Query backend errors
///
/// Errors raised by the analytical query engine. Throttling is the only
/// transient variant; everything else is terminal for the job.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// The backend asked us to slow down (rate limit / throttling)
    #[error("Query backend throttled: {0}")]
    Throttled(String),

    /// The backend reports that the query failed; reason kept verbatim
    #[error("{0}")]
    QueryFailed(String),

    /// Unknown execution handle
    #[error("Unknown query execution: {0}")]
    UnknownExecution(String),

    /// Failed to reach the backend
    #[error("Failed to connect to query backend: {0}")]
    ConnectionFailed(String),

    /// Result could not be read
    #[error("Failed to read query result: {0}")]
    ResultUnavailable(String),
}

impl BackendError {
    /// Whether the error should be retried after a fixed backoff
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Throttled(_))
    }
}

/// Workflow engine errors
///
/// These errors don't expose third-party HTTP client types.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Failed to connect to the workflow engine
    #[error("Failed to connect to workflow engine: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Execution not found
    #[error("Workflow execution not found: {0}")]
    ExecutionNotFound(String),

    /// Invalid response from server
    #[error("Invalid response from workflow engine: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded, retry after: {0}")]
    RateLimitExceeded(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },
}

impl WorkflowError {
    /// Whether a retry might succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkflowError::ConnectionFailed(_)
                | WorkflowError::RateLimitExceeded(_)
                | WorkflowError::ServerError { .. }
        )
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for ReportFlowError {
    fn from(err: std::io::Error) -> Self {
        ReportFlowError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for ReportFlowError {
    fn from(err: serde_json::Error) -> Self {
        ReportFlowError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for ReportFlowError {
    fn from(err: toml::de::Error) -> Self {
        ReportFlowError::Configuration(format!("TOML parse error: {err}"))
    }
}
