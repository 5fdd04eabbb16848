//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "reportflow.toml")]
    pub output: String,

    /// Include example values and comments
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing reportflow configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            Self::generate_config_with_examples()
        } else {
            Self::generate_minimal_config()
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your settings", self.output);
                println!("  2. Set store_backend to 'memory' or 'postgresql'");
                println!("  3. Create a .env file with your credentials:");
                println!("     - REPORTFLOW_PG_URL (if using PostgreSQL)");
                println!("     - REPORTFLOW_WORKFLOW_TOKEN (if using a workflow engine)");
                println!("     - REPORTFLOW_URL_KEY for signed download links");
                println!(
                    "  4. For PostgreSQL: psql -f migrations/001_initial_schema.sql"
                );
                println!("  5. Validate configuration: reportflow validate-config");
                println!("  6. Preview today's extractions: reportflow plan");
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {}", e);
                Ok(5)
            }
        }
    }

    fn generate_minimal_config() -> String {
        r#"# reportflow configuration

environment = "development"
store_backend = "memory"  # memory | postgresql

[application]
log_level = "info"

# [postgresql]
# connection_string = "${REPORTFLOW_PG_URL}"
# max_connections = 10
# ssl_mode = "require"

# [workflow]
# base_url = "https://workflows.example.com/api/"
# api_token = "${REPORTFLOW_WORKFLOW_TOKEN}"

[refresh]
nightly_timeout_minutes = 180
daily_token_limit = 3
monthly_token_limit = 30
default_model = { model = "legacy" }

[export]
time_limit_seconds = 900
heartbeat_interval_seconds = 60
download_url_ttl_seconds = 3600
download_base_url = "https://downloads.localhost/"

[schedule]
default_timezone = "UTC"

[logging]
local_enabled = false
local_path = "/var/log/reportflow"
local_rotation = "daily"
"#
        .to_string()
    }

    fn generate_config_with_examples() -> String {
        r#"# reportflow configuration
#
# Refresh bookkeeping, scheduled extraction planning and export jobs.
# Values of the form ${VAR} are read from the environment (or .env).
# Any key can also be overridden with REPORTFLOW_<SECTION>_<KEY>.

# ============================================================================
# Runtime
# ============================================================================
# development | staging | production
environment = "development"

# Where refresh, token budget, schedule and job records are kept
#   memory:     process-local, lost on exit (not allowed in production)
#   postgresql: one JSONB document table, see migrations/
store_backend = "memory"

[application]
# Log level (trace, debug, info, warn, error)
log_level = "info"

# ============================================================================
# PostgreSQL store
# ============================================================================
# Uncomment when store_backend = "postgresql"
#
# [postgresql]
# connection_string = "${REPORTFLOW_PG_URL}"
# max_connections = 10                # 1-100
# connection_timeout_seconds = 30
# statement_timeout_seconds = 60
# # disable | prefer | require | verify-ca | verify-full
# ssl_mode = "require"

# ============================================================================
# Workflow engine
# ============================================================================
# Starts on-demand refreshes and reports execution status. Without it,
# on-demand refresh is unavailable and exports never wait on a refresh.
#
# [workflow]
# base_url = "https://workflows.example.com/api/"
# api_token = "${REPORTFLOW_WORKFLOW_TOKEN}"
# timeout_seconds = 30
# tls_verify = true
#
# [workflow.retry]
# max_retries = 3
# initial_delay_ms = 1000
# max_delay_ms = 30000
# backoff_multiplier = 2.0

# ============================================================================
# Refresh
# ============================================================================
[refresh]
# A nightly refresh running longer than this is marked as failed
nightly_timeout_minutes = 180

# On-demand refresh allowance, reset at UTC day and month boundaries
daily_token_limit = 3
monthly_token_limit = 30

# Model for tenants without an override:
#   { model = "legacy" }
#   { model = "managed", installation = "production" }
#   { model = "warehouse", installation = "trial" }
default_model = { model = "legacy" }

# Hours after a successful refresh before data counts as stale
[refresh.expiration_hours]
trial = 12
staging = 24
production = 24
default = 24

# Per-tenant model overrides
# [refresh.tenants.acme]
# model = "managed"
# installation = "production"

# ============================================================================
# Export jobs
# ============================================================================
[export]
# Wall-clock limit of one export, measured from the last heartbeat
time_limit_seconds = 900

# How often a running export proves it is alive
heartbeat_interval_seconds = 60

# Backend status polling and throttling backoff
poll_interval_ms = 1000
throttle_backoff_ms = 2000

# Signed download links
download_url_ttl_seconds = 3600
download_base_url = "https://downloads.localhost/"
# url_signing_key = "${REPORTFLOW_URL_KEY}"

# ============================================================================
# Scheduled extractions
# ============================================================================
[schedule]
# IANA timezone used when an owner has no entry below
default_timezone = "UTC"

# Owner timezones keyed by "{platform}/{owner}"
# owner_timezones = { "acme/alice" = "Europe/Berlin" }

# ============================================================================
# Logging
# ============================================================================
[logging]
# JSON file logs next to the console output
local_enabled = false
local_path = "/var/log/reportflow"

# daily | hourly | never
local_rotation = "daily"
"#
        .to_string()
    }
}
