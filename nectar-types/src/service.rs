use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One of the four upstream providers consumed by the enrichment core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    /// Network reputation service (per-IP attack reports).
    Dshield,
    /// URL/host abuse feed (per-host malicious URL tags).
    Urlhaus,
    /// IP context service (infrastructure and client behavior).
    Spur,
    /// File-scanning service (per-hash analysis verdicts).
    Virustotal,
}

impl Service {
    /// All services, in the order the façade consults them.
    pub const ALL: [Self; 4] = [Self::Dshield, Self::Urlhaus, Self::Spur, Self::Virustotal];

    /// Stable lowercase name used in cache keys, log targets, and telemetry.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dshield => "dshield",
            Self::Urlhaus => "urlhaus",
            Self::Spur => "spur",
            Self::Virustotal => "virustotal",
        }
    }

    /// Default cache time-to-live for this service.
    ///
    /// Reputation and IP-context data age slowly; the abuse feed churns
    /// daily; file-scan verdicts are effectively immutable.
    #[must_use]
    pub const fn default_ttl(self) -> Duration {
        match self {
            Self::Dshield | Self::Spur => Duration::from_secs(7 * 24 * 3600),
            Self::Urlhaus => Duration::from_secs(24 * 3600),
            Self::Virustotal => Duration::from_secs(30 * 24 * 3600),
        }
    }

    /// Baseline token-bucket parameters `(rate_per_second, burst)`.
    ///
    /// The file scanner's free tier allows four requests per minute.
    #[must_use]
    pub const fn default_rate_limit(self) -> (f64, u32) {
        match self {
            Self::Dshield | Self::Spur => (1.0, 2),
            Self::Urlhaus => (2.0, 3),
            Self::Virustotal => (0.067, 1),
        }
    }
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
