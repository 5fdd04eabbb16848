//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the reportflow configuration file.

use crate::config::{load_config, StoreBackend};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config runs validation as part of loading
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(2);
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Environment: {:?}", config.environment);
        println!("  Log Level: {}", config.application.log_level);

        match config.store_backend {
            StoreBackend::Memory => println!("  Store: in-memory"),
            StoreBackend::PostgreSQL => {
                if let Some(ref pg_config) = config.postgresql {
                    use secrecy::ExposeSecret;
                    println!("  Store: PostgreSQL");
                    println!(
                        "  PostgreSQL Connection: {}",
                        pg_config
                            .connection_string
                            .expose_secret()
                            .as_ref()
                            .split('@')
                            .next_back()
                            .unwrap_or("***")
                    );
                    println!("  Max Connections: {}", pg_config.max_connections);
                }
            }
        }

        match config.workflow {
            Some(ref workflow) => println!("  Workflow Engine: {}", workflow.base_url),
            None => println!("  Workflow Engine: none (on-demand refresh disabled)"),
        }

        println!(
            "  Nightly Timeout: {} min",
            config.refresh.nightly_timeout_minutes
        );
        println!(
            "  Refresh Tokens: {}/day, {}/month",
            config.refresh.daily_token_limit, config.refresh.monthly_token_limit
        );
        println!("  Default Refresh Model: {:?}", config.refresh.default_model);
        println!("  Tenant Overrides: {}", config.refresh.tenants.len());
        println!("  Export Time Limit: {}s", config.export.time_limit_seconds);
        println!(
            "  Download URL TTL: {}s",
            config.export.download_url_ttl_seconds
        );
        println!("  Default Timezone: {}", config.schedule.default_timezone);
        println!();
        Ok(0)
    }
}
