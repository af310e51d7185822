use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the nectar workspace.
///
/// Variants are grouped by semantic kind rather than by transport type:
/// transient network faults, rate-limit signals, quota exhaustion, cache
/// I/O, and malformed provider payloads all map here so the façade can
/// collapse them into per-service empty sentinels.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NectarError {
    /// Invalid input argument.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// A provider returned an error that fits no other variant.
    #[error("{service} failed: {msg}")]
    Provider {
        /// Service name that failed.
        service: String,
        /// Human-readable error message.
        msg: String,
    },

    /// A connection-level network failure (reset, refused, DNS).
    #[error("{service} network error: {msg}")]
    Network {
        /// Service name the exchange targeted.
        service: String,
        /// Human-readable error message.
        msg: String,
    },

    /// A single HTTP exchange exceeded its per-request timeout.
    #[error("{service} request timed out")]
    Timeout {
        /// Service name the exchange targeted.
        service: String,
    },

    /// The provider's wall-clock deadline for the entire call expired.
    #[error("{service} deadline expired")]
    DeadlineExpired {
        /// Service name the call targeted.
        service: String,
    },

    /// Non-success HTTP status that is not a rate-limit signal.
    #[error("{service} returned status {status}")]
    Status {
        /// Service name that responded.
        service: String,
        /// HTTP status code.
        status: u16,
    },

    /// The provider signalled a rate limit (429, or 401 on the file scanner).
    #[error("{service} rate limited (status {status})")]
    RateLimited {
        /// Service name that responded.
        service: String,
        /// HTTP status carrying the signal.
        status: u16,
        /// Server-indicated delay in milliseconds, when supplied.
        retry_after_ms: Option<u64>,
    },

    /// The file-scanner quota manager refused the call.
    #[error("quota exhausted: recommended backoff {backoff_ms}ms")]
    QuotaExhausted {
        /// Recommended backoff before the next attempt, milliseconds.
        backoff_ms: u64,
    },

    /// The requested resource does not exist upstream.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource, e.g. a file hash.
        what: String,
    },

    /// The provider returned a payload that could not be parsed or repaired.
    #[error("{service} returned malformed payload: {msg}")]
    Malformed {
        /// Service name that responded.
        service: String,
        /// Short description of the parse failure.
        msg: String,
    },

    /// A cache tier failed an I/O operation.
    #[error("cache error: {0}")]
    Cache(String),

    /// The caller's cancellation token tripped while the call was blocked.
    #[error("cancelled")]
    Cancelled,

    /// The service has been closed; no further calls are accepted.
    #[error("service closed")]
    Closed,
}

impl NectarError {
    /// Helper: build a `Provider` error with the service name and message.
    pub fn provider(service: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Provider {
            service: service.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `Network` error with the service name and message.
    pub fn network(service: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Network {
            service: service.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `NotFound` error for a description of the missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Helper: build a `Malformed` error with the service name and message.
    pub fn malformed(service: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Malformed {
            service: service.into(),
            msg: msg.into(),
        }
    }

    /// Returns true if retrying this error may succeed.
    ///
    /// Network faults, per-request timeouts, 5xx statuses, and rate-limit
    /// signals are transient. Programmer errors, `NotFound`, quota refusals,
    /// and cancellation are not.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::RateLimited { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true if the provider signalled a rate limit.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// The HTTP status carried by this error, when one exists.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } | Self::RateLimited { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Server-indicated retry delay in milliseconds, when supplied.
    #[must_use]
    pub const fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms, .. } => *retry_after_ms,
            _ => None,
        }
    }
}
