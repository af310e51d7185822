//! Nectar enriches honeypot observations with external threat
//! intelligence.
//!
//! Overview
//! - One façade, [`EnrichmentService`], coordinates four provider
//!   adapters behind a three-tier cache (in-memory, durable shared,
//!   filesystem), per-service token buckets, a retry wrapper, and a
//!   quota gate for the file scanner.
//! - Every payload is sanitized before it is cached or returned: no
//!   control code points survive into the downstream store.
//! - Provider faults never surface to callers; each service degrades to
//!   its empty sentinel independently, so one failing feed cannot block
//!   enrichment from the others.
//!
//! Key behaviors and trade-offs
//! - Rate limiting is token-bucket per service; a dry bucket blocks the
//!   calling task rather than dropping the request.
//! - The reputation provider's `Retry-After` hints are always honored —
//!   it bans clients that ignore them.
//! - The file scanner is never called once its quota usage crosses the
//!   configured threshold; the call degrades to a null payload and the
//!   snapshot refreshes on a later attempt.
//! - The abuse-feed call runs under a scoped wall-clock deadline and
//!   reports expiry as the distinct `"TIMEOUT"` sentinel.
#![warn(missing_docs)]

/// The enrichment façade and its builder.
pub mod core;
/// Compatibility adapter for the legacy per-service call style.
pub mod legacy;
/// Telemetry counters.
pub mod telemetry;

pub use self::core::{EnrichmentService, EnrichmentServiceBuilder};
pub use legacy::LegacyAdapter;
pub use telemetry::EnrichmentTelemetry;

pub use nectar_core::record::{
    EnrichmentRecord, FileEnrichment, SessionEnrichment, SpurFields, empty_dshield,
};
pub use nectar_core::{CancelToken, SessionFlags, session_flags};
pub use nectar_middleware::{CacheSnapshot, CleanupReport, FilesystemTier, TierStats};
pub use nectar_types::{
    Credentials, EnrichmentConfig, NectarError, QuotaSnapshot, RateLimitConfig, RetryConfig,
    Service, TtlConfig,
};
