//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod init;
pub mod jobs;
pub mod plan;
pub mod refresh;
pub mod validate;

use crate::adapters::database::{create_store, KeyValueStore};
use crate::config::{load_config, ReportFlowConfig};
use std::sync::Arc;

/// Load configuration, printing the failure
///
/// Returns the exit code to use on failure.
pub(crate) fn load_or_report(config_path: &str) -> Result<ReportFlowConfig, i32> {
    load_config(config_path).map_err(|e| {
        println!("❌ Failed to load configuration file");
        println!("   Error: {e}");
        2
    })
}

/// Connect to the configured store, printing the failure
pub(crate) async fn connect_or_report(
    config: &ReportFlowConfig,
) -> Result<Arc<dyn KeyValueStore>, i32> {
    create_store(config).await.map_err(|e| {
        println!("❌ Failed to connect to store");
        println!("   Error: {e}");
        4
    })
}
