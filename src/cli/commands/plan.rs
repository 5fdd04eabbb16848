//! Plan command implementation
//!
//! Prints the scheduled extractions due at a given instant, grouped by
//! platform and owner. Entries come from a JSON file or from the store.

use crate::cli::commands::{connect_or_report, load_or_report};
use crate::core::schedule::{list_entries, ConfigTimezoneResolver, ExtractionPlanner, ScheduleEntry};
use chrono::{DateTime, Utc};
use clap::Args;
use std::path::PathBuf;

/// Arguments for the plan command
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// JSON file holding an array of schedule entries (default: read from the store)
    #[arg(long)]
    pub entries: Option<PathBuf>,

    /// Instant to plan for, RFC 3339 (default: now)
    #[arg(long)]
    pub now: Option<String>,
}

impl PlanArgs {
    /// Execute the plan command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_or_report(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };

        let now = match &self.now {
            Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                Ok(t) => t.with_timezone(&Utc),
                Err(e) => {
                    println!("❌ Invalid --now '{raw}': {e}");
                    return Ok(2);
                }
            },
            None => Utc::now(),
        };

        let entries: Vec<ScheduleEntry> = match &self.entries {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str(&raw)?
            }
            None => {
                let store = match connect_or_report(&config).await {
                    Ok(s) => s,
                    Err(code) => return Ok(code),
                };
                list_entries(store.as_ref()).await?
            }
        };

        let resolver = match ConfigTimezoneResolver::new(&config.schedule) {
            Ok(r) => r,
            Err(e) => {
                println!("❌ {e}");
                return Ok(2);
            }
        };

        tracing::info!(entries = entries.len(), now = %now, "Planning scheduled extractions");
        let plan = ExtractionPlanner::new().plan(now, &entries, &resolver).await;

        println!("{}", serde_json::to_string_pretty(&plan)?);
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_plan_from_entries_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("reportflow.toml");
        std::fs::write(&config_path, "").unwrap();

        let mut entries = tempfile::NamedTempFile::new().unwrap();
        write!(
            entries,
            r#"[{{"report_id":"daily","platform":"acme","owner_id":"u-1",
                 "anchor":"2019-09-26T00:00:00Z","every":1,"unit":"day"}}]"#
        )
        .unwrap();

        let args = PlanArgs {
            entries: Some(entries.path().to_path_buf()),
            now: Some("2019-10-07T12:00:00Z".to_string()),
        };
        let code = args
            .execute(config_path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }

    #[tokio::test]
    async fn test_invalid_now_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("reportflow.toml");
        std::fs::write(&config_path, "").unwrap();

        let args = PlanArgs {
            entries: None,
            now: Some("yesterday".to_string()),
        };
        assert_eq!(args.execute(config_path.to_str().unwrap()).await.unwrap(), 2);
    }
}
