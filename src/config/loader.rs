//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{ReportFlowConfig, StoreBackend};
use super::secret::secret_string;
use crate::domain::errors::ReportFlowError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into ReportFlowConfig
/// 4. Applies environment variable overrides (REPORTFLOW_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns a [`ReportFlowError::Configuration`] if the file cannot be read,
/// a referenced variable is unset, parsing fails or validation fails.
///
/// # Examples
///
/// ```no_run
/// use reportflow::config::loader::load_config;
///
/// let config = load_config("reportflow.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<ReportFlowConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ReportFlowError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        ReportFlowError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    load_config_str(&contents)
}

/// Loads configuration from TOML text; see [`load_config`]
pub fn load_config_str(contents: &str) -> Result<ReportFlowConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: ReportFlowConfig = toml::from_str(&contents)
        .map_err(|e| ReportFlowError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        ReportFlowError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| ReportFlowError::Configuration(format!("Invalid placeholder pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let processed = re.replace_all(line, |cap: &regex::Captures<'_>| {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => value,
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                    String::new()
                }
            }
        });
        lines.push(processed.into_owned());
    }

    if !missing_vars.is_empty() {
        return Err(ReportFlowError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn env_parsed<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env(name) {
        Some(raw) => raw.parse().map(Some).map_err(|_| {
            ReportFlowError::Configuration(format!("Invalid value for {name}: '{raw}'"))
        }),
        None => Ok(None),
    }
}

/// Applies environment variable overrides using REPORTFLOW_* prefix
///
/// Environment variables follow the pattern: REPORTFLOW_<SECTION>_<KEY>
/// For example: REPORTFLOW_EXPORT_TIME_LIMIT_SECONDS, REPORTFLOW_WORKFLOW_API_TOKEN
fn apply_env_overrides(config: &mut ReportFlowConfig) -> Result<()> {
    if let Some(val) = env("REPORTFLOW_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }

    if let Some(val) = env("REPORTFLOW_STORE_BACKEND") {
        config.store_backend = match val.to_lowercase().as_str() {
            "memory" => StoreBackend::Memory,
            "postgresql" => StoreBackend::PostgreSQL,
            other => {
                return Err(ReportFlowError::Configuration(format!(
                    "Invalid value for REPORTFLOW_STORE_BACKEND: '{other}'"
                )))
            }
        };
    }

    if let Some(ref mut pg) = config.postgresql {
        if let Some(val) = env("REPORTFLOW_POSTGRESQL_CONNECTION_STRING") {
            pg.connection_string = secret_string(val);
        }
        if let Some(val) = env_parsed("REPORTFLOW_POSTGRESQL_MAX_CONNECTIONS")? {
            pg.max_connections = val;
        }
        if let Some(val) = env("REPORTFLOW_POSTGRESQL_SSL_MODE") {
            pg.ssl_mode = val;
        }
    }

    if let Some(ref mut workflow) = config.workflow {
        if let Some(val) = env("REPORTFLOW_WORKFLOW_BASE_URL") {
            workflow.base_url = val;
        }
        if let Some(val) = env("REPORTFLOW_WORKFLOW_API_TOKEN") {
            workflow.api_token = Some(secret_string(val));
        }
        if let Some(val) = env_parsed("REPORTFLOW_WORKFLOW_TIMEOUT_SECONDS")? {
            workflow.timeout_seconds = val;
        }
    }

    if let Some(val) = env_parsed("REPORTFLOW_REFRESH_NIGHTLY_TIMEOUT_MINUTES")? {
        config.refresh.nightly_timeout_minutes = val;
    }
    if let Some(val) = env_parsed("REPORTFLOW_REFRESH_DAILY_TOKEN_LIMIT")? {
        config.refresh.daily_token_limit = val;
    }
    if let Some(val) = env_parsed("REPORTFLOW_REFRESH_MONTHLY_TOKEN_LIMIT")? {
        config.refresh.monthly_token_limit = val;
    }

    if let Some(val) = env_parsed("REPORTFLOW_EXPORT_TIME_LIMIT_SECONDS")? {
        config.export.time_limit_seconds = val;
    }
    if let Some(val) = env_parsed("REPORTFLOW_EXPORT_HEARTBEAT_INTERVAL_SECONDS")? {
        config.export.heartbeat_interval_seconds = val;
    }
    if let Some(val) = env("REPORTFLOW_EXPORT_DOWNLOAD_BASE_URL") {
        config.export.download_base_url = val;
    }
    if let Some(val) = env("REPORTFLOW_EXPORT_URL_SIGNING_KEY") {
        config.export.url_signing_key = Some(secret_string(val));
    }

    if let Some(val) = env("REPORTFLOW_SCHEDULE_DEFAULT_TIMEZONE") {
        config.schedule.default_timezone = val;
    }

    if let Some(val) = env_parsed("REPORTFLOW_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = val;
    }
    if let Some(val) = env("REPORTFLOW_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}
