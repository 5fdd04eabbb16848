//! Tenant data refresh state
//!
//! Each tenant has a refresh record with two tracks (nightly and on-demand),
//! a token budget limiting on-demand requests, and a refresh model that
//! decides how freshness is judged.

pub mod budget;
pub mod manager;
pub mod model;
pub mod record;

pub use budget::{BudgetReset, RefreshTokenBudget, TokenLimits};
pub use manager::{BeginOutcome, ReconcileOutcome, RefreshManager, TriggerOutcome};
pub use model::{evaluate, EffectiveRefresh, InstallationClass, RefreshModel, TenantContext};
pub use record::{RefreshOutcome, RefreshRecord, RefreshStatus, Track, TrackState};
