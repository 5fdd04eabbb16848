//! Core business logic for reportflow.
//!
//! # Modules
//!
//! - [`refresh`] - Per-tenant refresh state machine and token budget
//! - [`schedule`] - Scheduled extraction planning and dispatch
//! - [`export`] - Export job lifecycle, watchdog and post-processing
//!
//! # Export Workflow
//!
//! 1. **Gate**: Read the tenant's effective refresh state
//! 2. **Defer or submit**: Queue behind a running refresh, or submit the query
//! 3. **Wait**: Poll the query backend, backing off when throttled
//! 4. **Post-process**: Write CSV, convert, compress
//! 5. **Deliver**: Issue a time-bounded download URL
//!
//! # Example
//!
//! ```rust,no_run
//! use reportflow::adapters::database::InMemoryStore;
//! use reportflow::config::RefreshConfig;
//! use reportflow::core::refresh::{RefreshManager, RefreshModel, TenantContext};
//! use reportflow::domain::PlatformId;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryStore::new());
//! let refresh = RefreshManager::new(store, None, RefreshConfig::default());
//!
//! let ctx = TenantContext::new(PlatformId::new("acme")?, RefreshModel::Legacy);
//! let view = refresh.effective_refresh(&ctx, chrono::Utc::now()).await?;
//! println!("status: {}, refresh needed: {}", view.status, view.is_refresh_needed);
//! # Ok(())
//! # }
//! ```

pub mod export;
pub mod refresh;
pub mod schedule;
