//! Refresh command implementation
//!
//! Operator access to the refresh state machine: inspect a tenant, mark
//! tracks started or finished, run the nightly watchdog, reconcile with the
//! workflow engine and hand back refresh tokens.

use crate::adapters::workflow::{HttpWorkflowEngine, WorkflowEngine};
use crate::cli::commands::{connect_or_report, load_or_report};
use crate::config::ReportFlowConfig;
use crate::core::refresh::{
    BeginOutcome, RefreshManager, RefreshOutcome, TenantContext, Track, TriggerOutcome,
};
use crate::domain::PlatformId;
use chrono::Utc;
use clap::{Args, Subcommand, ValueEnum};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Arguments for the refresh command
#[derive(Args, Debug)]
pub struct RefreshArgs {
    #[command(subcommand)]
    pub command: RefreshCommand,
}

/// Refresh track selector
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackArg {
    Scheduled,
    OnDemand,
}

impl From<TrackArg> for Track {
    fn from(arg: TrackArg) -> Self {
        match arg {
            TrackArg::Scheduled => Track::Scheduled,
            TrackArg::OnDemand => Track::OnDemand,
        }
    }
}

/// Terminal refresh result
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutcomeArg {
    Succeeded,
    Error,
}

impl From<OutcomeArg> for RefreshOutcome {
    fn from(arg: OutcomeArg) -> Self {
        match arg {
            OutcomeArg::Succeeded => RefreshOutcome::Succeeded,
            OutcomeArg::Error => RefreshOutcome::Error,
        }
    }
}

/// Refresh subcommands
#[derive(Subcommand, Debug)]
pub enum RefreshCommand {
    /// Show the effective refresh state of a tenant
    Status {
        #[arg(long)]
        platform: String,
    },

    /// Mark a track as running
    Begin {
        #[arg(long)]
        platform: String,
        #[arg(long, value_enum)]
        track: TrackArg,
    },

    /// Record the result of a track
    Complete {
        #[arg(long)]
        platform: String,
        #[arg(long, value_enum)]
        track: TrackArg,
        #[arg(long, value_enum)]
        outcome: OutcomeArg,
    },

    /// Fail nightly refreshes that exceeded the timeout
    Watchdog {
        /// Timeout in minutes (default: refresh.nightly_timeout_minutes)
        #[arg(long)]
        timeout_minutes: Option<u32>,

        /// Keep sweeping at this interval until interrupted
        #[arg(long)]
        every_minutes: Option<u64>,
    },

    /// Align a running refresh with its workflow execution
    Reconcile {
        #[arg(long)]
        platform: String,
    },

    /// Start an on-demand refresh through the workflow engine
    Trigger {
        #[arg(long)]
        platform: String,
    },

    /// Give back one refresh token after a failed ingestion
    RestoreToken {
        #[arg(long)]
        platform: String,
    },
}

fn workflow_engine(config: &ReportFlowConfig) -> anyhow::Result<Option<Arc<dyn WorkflowEngine>>> {
    match &config.workflow {
        Some(workflow) => {
            let engine = HttpWorkflowEngine::new(workflow.clone())?;
            Ok(Some(Arc::new(engine)))
        }
        None => Ok(None),
    }
}

fn platform_id(raw: &str) -> Result<PlatformId, i32> {
    PlatformId::new(raw).map_err(|e| {
        println!("❌ {e}");
        2
    })
}

impl RefreshArgs {
    /// Execute the refresh command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        let config = match load_or_report(config_path) {
            Ok(c) => c,
            Err(code) => return Ok(code),
        };
        let store = match connect_or_report(&config).await {
            Ok(s) => s,
            Err(code) => return Ok(code),
        };
        let manager = RefreshManager::new(store, workflow_engine(&config)?, config.refresh.clone());

        match self.run(&manager, shutdown).await {
            Ok(code) | Err(code) => Ok(code),
        }
    }

    async fn run(
        &self,
        manager: &RefreshManager,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<i32, i32> {
        let now = Utc::now();
        match &self.command {
            RefreshCommand::Status { platform } => {
                let platform = platform_id(platform)?;
                let model = manager.config().model_for(platform.as_str());
                let ctx = TenantContext::new(platform, model);
                let view = manager.effective_refresh(&ctx, now).await.map_err(fatal)?;
                println!("{}", serde_json::to_string_pretty(&view).map_err(fatal)?);
                Ok(0)
            }
            RefreshCommand::Begin { platform, track } => {
                let platform = platform_id(platform)?;
                match manager
                    .begin_refresh(&platform, (*track).into(), now)
                    .await
                    .map_err(fatal)?
                {
                    BeginOutcome::Started => println!("✅ {} refresh started", Track::from(*track)),
                    BeginOutcome::AlreadyInProgress => {
                        println!("⏸️  Scheduled refresh already in progress")
                    }
                }
                Ok(0)
            }
            RefreshCommand::Complete {
                platform,
                track,
                outcome,
            } => {
                let platform = platform_id(platform)?;
                let outcome = RefreshOutcome::from(*outcome);
                manager
                    .complete_refresh(&platform, (*track).into(), outcome, now)
                    .await
                    .map_err(fatal)?;
                println!("✅ {} refresh marked {}", Track::from(*track), outcome.status());
                Ok(0)
            }
            RefreshCommand::Watchdog {
                timeout_minutes,
                every_minutes,
            } => {
                let timeout = timeout_minutes.unwrap_or(manager.config().nightly_timeout_minutes);
                loop {
                    let expired = manager
                        .sweep_nightly_timeouts(timeout, Utc::now())
                        .await
                        .map_err(fatal)?;
                    for platform in &expired {
                        println!("⚠️  Nightly refresh of {platform} timed out");
                    }

                    let Some(every) = every_minutes else {
                        return Ok(0);
                    };
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(every * 60)) => {}
                        _ = shutdown.changed() => {
                            tracing::info!("Watchdog stopped");
                            return Ok(0);
                        }
                    }
                }
            }
            RefreshCommand::Reconcile { platform } => {
                let platform = platform_id(platform)?;
                let outcome = manager
                    .reconcile_with_workflow(&platform, now)
                    .await
                    .map_err(fatal)?;
                println!("{outcome:?}");
                Ok(0)
            }
            RefreshCommand::Trigger { platform } => {
                let platform = platform_id(platform)?;
                match manager.trigger_on_demand_refresh(&platform, now).await {
                    Ok(TriggerOutcome::Triggered { execution_id }) => {
                        println!("✅ Refresh started: {execution_id}");
                        Ok(0)
                    }
                    Ok(TriggerOutcome::BudgetExhausted) => {
                        println!("⏸️  No refresh tokens left for {platform}");
                        Ok(0)
                    }
                    Err(e) => {
                        println!("❌ Failed to start refresh");
                        println!("   Error: {e}");
                        Err(4)
                    }
                }
            }
            RefreshCommand::RestoreToken { platform } => {
                let platform = platform_id(platform)?;
                manager
                    .restore_token_budget(&platform)
                    .await
                    .map_err(fatal)?;
                println!("✅ Restored one refresh token for {platform}");
                Ok(0)
            }
        }
    }
}

fn fatal(e: impl std::fmt::Display) -> i32 {
    println!("❌ {e}");
    5
}
