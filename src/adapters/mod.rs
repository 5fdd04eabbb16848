//! External system integrations for reportflow.
//!
//! - [`database`] - Key-value store abstraction (trait-based) and in-memory store
//! - [`postgresql`] - PostgreSQL store
//! - [`query`] - Analytical query backend abstraction
//! - [`workflow`] - Workflow engine running tenant data refreshes
//! - [`objects`] - Artifact storage and signed download URLs
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern** to isolate external dependencies and
//! enable testing with in-memory implementations. The core only ever sees
//! the traits.
//!
//! ```rust,no_run
//! use reportflow::adapters::workflow::{HttpWorkflowEngine, WorkflowEngine};
//! use reportflow::config::WorkflowConfig;
//! use reportflow::domain::PlatformId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WorkflowConfig {
//!     base_url: "https://workflows.example.com/api/".to_string(),
//!     api_token: None,
//!     timeout_seconds: 30,
//!     tls_verify: true,
//!     retry: Default::default(),
//! };
//!
//! let engine = HttpWorkflowEngine::new(config)?;
//! let execution = engine.start_refresh(&PlatformId::new("acme")?).await?;
//! println!("started {execution}");
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod objects;
pub mod postgresql;
pub mod query;
pub mod workflow;
