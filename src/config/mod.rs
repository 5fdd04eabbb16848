//! Configuration management for reportflow.
//!
//! TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `REPORTFLOW_*` environment overrides
//! - Default values for optional settings
//! - Validation of every section on load
//!
//! # Example Configuration
//!
//! ```toml
//! environment = "staging"
//! store_backend = "postgresql"
//!
//! [postgresql]
//! connection_string = "${REPORTFLOW_PG_URL}"
//!
//! [workflow]
//! base_url = "https://workflows.example.com/api/"
//! api_token = "${REPORTFLOW_WORKFLOW_TOKEN}"
//!
//! [refresh]
//! nightly_timeout_minutes = 180
//! default_model = { model = "managed", installation = "production" }
//!
//! [refresh.tenants.acme]
//! model = "warehouse"
//! installation = "trial"
//!
//! [export]
//! time_limit_seconds = 900
//! url_signing_key = "${REPORTFLOW_URL_KEY}"
//!
//! [schedule]
//! default_timezone = "UTC"
//! owner_timezones = { "acme/alice" = "Europe/Berlin" }
//! ```
//!
//! ```rust,no_run
//! use reportflow::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("reportflow.toml")?;
//! println!("Nightly timeout: {} min", config.refresh.nightly_timeout_minutes);
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, load_config_str};
pub use schema::{
    ApplicationConfig, Environment, ExpirationHoursConfig, ExportConfig, LoggingConfig,
    PostgreSQLConfig, RefreshConfig, ReportFlowConfig, RetryConfig, ScheduleConfig, StoreBackend,
    WorkflowConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
