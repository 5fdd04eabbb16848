//! Jobs command implementation
//!
//! This module implements the `jobs` command for displaying export job
//! counts and failures.

use crate::cli::commands::{connect_or_report, load_or_report};
use crate::core::export::{JobStatus, JobStore, JobSummary};
use crate::domain::PlatformId;
use clap::Args;

/// Arguments for the jobs command
#[derive(Args, Debug)]
pub struct JobsArgs {
    /// Filter by platform ID
    #[arg(long)]
    pub platform: Option<String>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl JobsArgs {
    /// Execute the jobs command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Summarizing export jobs");

        let config = match load_or_report(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let store = match connect_or_report(&config).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };

        let jobs = match JobStore::new(store).list().await {
            Ok(jobs) => jobs,
            Err(e) => {
                println!("❌ Failed to load export jobs");
                println!("   Error: {}", e);
                return Ok(5);
            }
        };

        let summary = match &self.platform {
            Some(platform) => match PlatformId::new(platform.as_str()) {
                Ok(platform) => JobSummary::for_platform(&jobs, &platform),
                Err(e) => {
                    println!("❌ {e}");
                    return Ok(2);
                }
            },
            None => JobSummary::from_jobs(&jobs),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            print_summary(&summary);
        }
        Ok(0)
    }
}

fn print_summary(summary: &JobSummary) {
    println!("📊 Export Jobs");
    println!();

    if summary.total == 0 {
        println!("No export jobs found.");
        return;
    }

    println!("{:<15} {:<10}", "Status", "Count");
    println!("{}", "-".repeat(26));
    for status in [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Converting,
        JobStatus::Compressing,
        JobStatus::Succeeded,
        JobStatus::Failed,
    ] {
        println!("{:<15} {:<10}", status.as_str(), summary.count(status));
    }
    println!();

    if !summary.failures.is_empty() {
        println!("Failures:");
        for failed in &summary.failures {
            let kind = failed
                .kind
                .map(|k| format!("{k:?}"))
                .unwrap_or_else(|| "unknown".to_string());
            println!(
                "  ❌ {} ({}) {}: {}",
                failed.key,
                failed.platform,
                kind,
                failed.detail.as_deref().unwrap_or("-")
            );
        }
        println!();
    }
}
