//! Refresh token budget
//!
//! Each tenant may request a limited number of on-demand refreshes per UTC
//! day and per UTC month. A token is consumed per request and handed back
//! when the downstream ingestion reports that the attempt produced nothing.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Configured daily and monthly allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenLimits {
    pub daily: i64,
    pub monthly: i64,
}

/// Which counters must be refilled before consuming
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetReset {
    /// Same day, nothing to refill
    None,
    /// New UTC day: refill the daily counter
    Daily,
    /// New UTC month: refill both counters
    Monthly,
}

/// Per-tenant on-demand refresh allowance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshTokenBudget {
    pub daily_remaining: i64,
    pub monthly_remaining: i64,
    #[serde(default)]
    pub last_request: Option<DateTime<Utc>>,
    pub last_reset: DateTime<Utc>,
}

impl RefreshTokenBudget {
    /// Creates a full budget
    pub fn new(limits: TokenLimits, now: DateTime<Utc>) -> Self {
        Self {
            daily_remaining: limits.daily,
            monthly_remaining: limits.monthly,
            last_request: None,
            last_reset: now,
        }
    }

    /// Determines which counters are due for a refill at `now`
    pub fn reset_due(&self, now: DateTime<Utc>) -> BudgetReset {
        let last = self.last_reset.date_naive();
        let today = now.date_naive();

        if (today.year(), today.month()) > (last.year(), last.month()) {
            BudgetReset::Monthly
        } else if today > last {
            BudgetReset::Daily
        } else {
            BudgetReset::None
        }
    }

    /// Whether a token can be consumed without a refill
    pub fn has_tokens(&self) -> bool {
        self.daily_remaining > 0 && self.monthly_remaining > 0
    }
}
