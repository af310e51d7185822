//! nectar-types
//!
//! Shared DTOs for the nectar enrichment core: the unified error type,
//! configuration structs, upstream service tags, and the file-scanner
//! quota snapshot.
#![warn(missing_docs)]

/// Configuration types consumed by the façade and middleware.
pub mod config;
/// Unified error type shared across the workspace.
pub mod error;
/// Quota snapshot for the file-scanning provider.
pub mod quota;
/// Upstream service tags and their baseline policies.
pub mod service;

pub use config::{
    Credentials, EnrichmentConfig, RateLimitConfig, RateLimitOverrides, RetryConfig, TtlConfig,
};
pub use error::NectarError;
pub use quota::QuotaSnapshot;
pub use service::Service;
