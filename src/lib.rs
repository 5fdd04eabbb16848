// Reportflow - Refresh gating, scheduled extraction and export orchestration
// Copyright (c) 2025 Reportflow Contributors
// Licensed under the MIT License

//! # Reportflow
//!
//! Reportflow coordinates three things for a multi-tenant reporting product:
//! when a tenant's data is fresh enough to report on, which scheduled
//! reports are due today, and the lifecycle of export jobs that turn a query
//! into a downloadable file.
//!
//! ## Overview
//!
//! - **Refreshing** tenant data: nightly and on-demand tracks, a watchdog
//!   for stuck nightly runs, and a daily/monthly token budget
//! - **Planning** scheduled extractions per owner timezone
//! - **Exporting** query results through submit, poll and post-processing,
//!   with a deadline and heartbeat
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (refresh, schedule, export)
//! - [`adapters`] - External integrations (store, query backend, workflow engine, objects)
//! - [`domain`] - Identifiers, errors and the result type
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reportflow::adapters::database::create_store;
//! use reportflow::config::load_config;
//! use reportflow::core::refresh::{RefreshManager, TenantContext};
//! use reportflow::domain::PlatformId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("reportflow.toml")?;
//!     let store = create_store(&config).await?;
//!     let refresh = RefreshManager::new(store, None, config.refresh.clone());
//!
//!     let platform = PlatformId::new("acme")?;
//!     let model = config.refresh.model_for(platform.as_str());
//!     let view = refresh
//!         .effective_refresh(&TenantContext::new(platform, model), chrono::Utc::now())
//!         .await?;
//!
//!     println!("{} (refresh needed: {})", view.status, view.is_refresh_needed);
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! The library uses [`domain::ReportFlowError`] for all errors; the binary
//! wraps them in `anyhow` and maps them to exit codes.
//!
//! ## Logging
//!
//! Components own a `tracing::Span` passed in with `with_span` and emit
//! every event under it:
//!
//! ```rust,no_run
//! use reportflow::adapters::database::InMemoryStore;
//! use reportflow::config::RefreshConfig;
//! use reportflow::core::refresh::RefreshManager;
//! use std::sync::Arc;
//!
//! let span = tracing::info_span!("nightly", run = 42);
//! let manager = RefreshManager::new(Arc::new(InMemoryStore::new()), None, RefreshConfig::default())
//!     .with_span(span);
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
