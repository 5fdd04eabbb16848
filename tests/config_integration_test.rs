//! Integration tests for configuration loading and validation
//!
//! Note: Tests that modify environment variables should be run with --test-threads=1
//! to avoid interference between tests.

use reportflow::config::{load_config, Environment, StoreBackend};
use reportflow::core::refresh::{InstallationClass, RefreshModel};
use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

// Mutex to serialize tests that modify environment variables
static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn cleanup_env_vars() {
    std::env::remove_var("REPORTFLOW_APPLICATION_LOG_LEVEL");
    std::env::remove_var("REPORTFLOW_STORE_BACKEND");
    std::env::remove_var("REPORTFLOW_REFRESH_NIGHTLY_TIMEOUT_MINUTES");
    std::env::remove_var("REPORTFLOW_EXPORT_TIME_LIMIT_SECONDS");
    std::env::remove_var("TEST_REPORTFLOW_PG_URL");
    std::env::remove_var("TEST_REPORTFLOW_WORKFLOW_TOKEN");
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("TEST_REPORTFLOW_PG_URL", "postgresql://rf@db:5432/reportflow");
    std::env::set_var("TEST_REPORTFLOW_WORKFLOW_TOKEN", "wf-secret");

    let file = write_config(
        r#"
environment = "staging"
store_backend = "postgresql"

[application]
log_level = "debug"

[postgresql]
connection_string = "${TEST_REPORTFLOW_PG_URL}"
max_connections = 4
ssl_mode = "require"

[workflow]
base_url = "https://workflows.example.com/api/"
api_token = "${TEST_REPORTFLOW_WORKFLOW_TOKEN}"

[refresh]
nightly_timeout_minutes = 120
daily_token_limit = 2
monthly_token_limit = 20
default_model = { model = "managed", installation = "production" }

[refresh.tenants.globex]
model = "warehouse"
installation = "trial"

[export]
time_limit_seconds = 600
heartbeat_interval_seconds = 30
download_base_url = "https://downloads.example.com/"

[schedule]
default_timezone = "Europe/Berlin"
owner_timezones = { "acme/alice" = "America/New_York" }
"#,
    );

    let config = load_config(file.path()).unwrap();
    cleanup_env_vars();

    assert_eq!(config.environment, Environment::Staging);
    assert_eq!(config.store_backend, StoreBackend::PostgreSQL);
    assert_eq!(config.application.log_level, "debug");

    let pg = config.postgresql.unwrap();
    assert_eq!(
        pg.connection_string.expose_secret().as_ref(),
        "postgresql://rf@db:5432/reportflow"
    );
    assert_eq!(pg.max_connections, 4);

    let workflow = config.workflow.unwrap();
    assert_eq!(
        workflow.api_token.unwrap().expose_secret().as_ref(),
        "wf-secret"
    );

    assert_eq!(config.refresh.nightly_timeout_minutes, 120);
    assert_eq!(
        config.refresh.model_for("acme"),
        RefreshModel::Managed {
            installation: InstallationClass::Production
        }
    );
    assert_eq!(
        config.refresh.model_for("globex"),
        RefreshModel::Warehouse {
            installation: InstallationClass::Trial
        }
    );
    assert_eq!(config.export.time_limit_seconds, 600);
    assert_eq!(config.schedule.default_timezone, "Europe/Berlin");
}

#[test]
fn test_empty_file_uses_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config("");
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.store_backend, StoreBackend::Memory);
    assert_eq!(config.refresh.model_for("anyone"), RefreshModel::Legacy);
    assert!(config.workflow.is_none());
    assert_eq!(config.schedule.default_timezone, "UTC");
}

#[test]
fn test_environment_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();
    std::env::set_var("REPORTFLOW_APPLICATION_LOG_LEVEL", "warn");
    std::env::set_var("REPORTFLOW_REFRESH_NIGHTLY_TIMEOUT_MINUTES", "45");
    std::env::set_var("REPORTFLOW_EXPORT_TIME_LIMIT_SECONDS", "1200");

    let file = write_config("[refresh]\nnightly_timeout_minutes = 90\n");
    let config = load_config(file.path());
    cleanup_env_vars();

    let config = config.unwrap();
    assert_eq!(config.application.log_level, "warn");
    assert_eq!(config.refresh.nightly_timeout_minutes, 45);
    assert_eq!(config.export.time_limit_seconds, 1200);
}

#[test]
fn test_missing_variable_is_reported() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config(
        r#"
[workflow]
base_url = "https://workflows.example.com/api/"
api_token = "${TEST_REPORTFLOW_WORKFLOW_TOKEN}"
"#,
    );
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("TEST_REPORTFLOW_WORKFLOW_TOKEN"));
}

#[test]
fn test_memory_store_rejected_in_production() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config("environment = \"production\"\n");
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("not allowed in production"));
}

#[test]
fn test_unknown_timezone_is_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    cleanup_env_vars();

    let file = write_config("[schedule]\ndefault_timezone = \"Mars/Olympus\"\n");
    assert!(load_config(file.path()).is_err());
}

#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/reportflow.toml").unwrap_err();
    assert!(err.to_string().contains("not found"));
}
