use std::path::Path;
use std::time::Duration;

use nectar_types::{
    Credentials, EnrichmentConfig, RateLimitConfig, RateLimitOverrides, RetryConfig, Service,
    TtlConfig,
};

/// Config tuned for tests: generous buckets, fast retries, no durable
/// tier, always-fresh quota snapshots.
pub fn test_config(cache_base: &Path) -> EnrichmentConfig {
    let mut rate_limits = RateLimitOverrides::default();
    for service in Service::ALL {
        rate_limits.set(
            service,
            RateLimitConfig {
                rate_per_second: 10_000.0,
                burst: 1_000,
            },
        );
    }
    EnrichmentConfig {
        cache_base: cache_base.to_path_buf(),
        durable_url: None,
        enable_durable_cache: false,
        enable_rate_limiting: true,
        enable_telemetry: true,
        enable_vt_quota: true,
        vt_quota_threshold_percent: 90.0,
        skip_enrich: false,
        http_timeout: Duration::from_secs(5),
        urlhaus_deadline: Duration::from_secs(30),
        quota_refresh_ttl: Duration::ZERO,
        ttls: TtlConfig::default(),
        rate_limits,
        retry: RetryConfig {
            max_retries: 1,
            base: Duration::from_millis(5),
            factor: 2.0,
            jitter: false,
        },
    }
}

pub fn full_creds() -> Credentials {
    Credentials {
        dshield_email: Some("sensor@example.org".to_string()),
        urlhaus_key: Some("uh-key".to_string()),
        spur_token: Some("spur-token".to_string()),
        virustotal_key: Some("vt-key".to_string()),
    }
}
