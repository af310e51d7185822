use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of the file scanner's usage versus limits.
///
/// A limit of zero reads as fully exhausted: providers report zero for
/// plans that do not include the corresponding window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    /// Requests consumed today.
    pub daily_used: u64,
    /// Daily request allowance.
    pub daily_limit: u64,
    /// Requests consumed this hour.
    pub hourly_used: u64,
    /// Hourly request allowance.
    pub hourly_limit: u64,
    /// Requests consumed this month.
    pub monthly_used: u64,
    /// Monthly request allowance.
    pub monthly_limit: u64,
    /// Lifetime API requests consumed.
    pub api_used: u64,
    /// Lifetime API request allowance.
    pub api_limit: u64,
    /// When this snapshot was observed.
    pub observed_at: DateTime<Utc>,
}

impl QuotaSnapshot {
    /// Remaining daily requests.
    #[must_use]
    pub const fn daily_remaining(&self) -> u64 {
        self.daily_limit.saturating_sub(self.daily_used)
    }

    /// Remaining hourly requests.
    #[must_use]
    pub const fn hourly_remaining(&self) -> u64 {
        self.hourly_limit.saturating_sub(self.hourly_used)
    }

    /// Remaining lifetime API requests.
    #[must_use]
    pub const fn api_remaining(&self) -> u64 {
        self.api_limit.saturating_sub(self.api_used)
    }

    /// Daily usage as a percentage; 100 when the limit is zero.
    #[must_use]
    pub fn daily_usage_percent(&self) -> f64 {
        Self::percent(self.daily_used, self.daily_limit)
    }

    /// Hourly usage as a percentage; 100 when the limit is zero.
    #[must_use]
    pub fn hourly_usage_percent(&self) -> f64 {
        Self::percent(self.hourly_used, self.hourly_limit)
    }

    /// The higher of the daily and hourly usage percentages.
    #[must_use]
    pub fn peak_usage_percent(&self) -> f64 {
        self.daily_usage_percent().max(self.hourly_usage_percent())
    }

    fn percent(used: u64, limit: u64) -> f64 {
        if limit == 0 {
            return 100.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            (used as f64 / limit as f64) * 100.0
        }
    }
}
