//! Domain types for reportflow.
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`PlatformId`], [`OwnerId`], [`ReportId`], [`ExecutionId`])
//! - **Error types** ([`ReportFlowError`], [`StoreError`], [`BackendError`], [`WorkflowError`])
//! - **Result type alias** ([`Result`])
//!
//! Record types owned by a single component live next to that component
//! (`core::refresh`, `core::schedule`, `core::export`).
//!
//! # Type Safety
//!
//! Identifiers are newtypes so a report ID can never be passed where a
//! platform ID is expected:
//!
//! ```rust
//! use reportflow::domain::{PlatformId, ReportId};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let platform = PlatformId::new("acme-prod")?;
//! let report = ReportId::new("weekly-sales")?;
//!
//! // This won't compile - type safety prevents mixing IDs
//! // let wrong: PlatformId = report;
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod ids;
pub mod result;

// Re-export commonly used types for convenience
pub use errors::{BackendError, ReportFlowError, StoreError, WorkflowError};
pub use ids::{ExecutionId, OwnerId, PlatformId, ReportId};
pub use result::Result;
