//! Canned provider payloads shared across test suites.

use chrono::Utc;
use serde_json::{Value, json};

use nectar_types::QuotaSnapshot;

/// Reputation report with prior attack activity.
#[must_use]
pub fn dshield_high_risk() -> Value {
    json!({
        "ip": {
            "number": "203.0.113.10",
            "count": "10",
            "attacks": "5",
            "asname": "EvilCorp",
            "ascountry": "RU",
        }
    })
}

/// Reputation report whose strings carry control characters.
#[must_use]
pub fn dshield_hostile_unicode() -> Value {
    json!({
        "ip": {
            "asname": "Evil\u{0000}Corp",
            "ascountry": "US\u{0016}",
            "count": "3",
        }
    })
}

/// Abuse-feed report with tags spread over several URL entries.
#[must_use]
pub fn urlhaus_tagged() -> Value {
    json!({
        "query_status": "ok",
        "urls": [
            {"tags": ["malware", "trojan"]},
            {"tags": ["botnet"]},
        ]
    })
}

/// IP context classifying the source as datacenter infrastructure.
#[must_use]
pub fn spur_datacenter() -> Value {
    json!({
        "asn": {"number": 64496, "organization": "Example AS"},
        "organization": "Example Hosting",
        "infrastructure": "DATACENTER",
        "client": {"count": 12},
    })
}

/// Scanner report with malicious verdicts.
#[must_use]
pub fn vt_malicious() -> Value {
    json!({
        "data": {
            "id": "b5c1...",
            "type": "file",
            "attributes": {
                "last_analysis_stats": {
                    "malicious": 42,
                    "harmless": 0,
                    "suspicious": 3,
                    "undetected": 12,
                    "timeout": 0,
                },
                "md5": "9e107d9d372bb6826bd81d3542a419d6",
                "sha256": "d7a8fbb307d7809469ca9abcb0082e4f8d5651e46d3cdb762d02d0bf37c9e592",
                "size": 68,
                "names": ["mal.exe"],
                "tags": ["peexe"],
                "reputation": -53,
            },
        }
    })
}

/// Quota snapshot at the given daily usage percent (limit 1000).
#[must_use]
pub fn quota_at_percent(percent: u64) -> QuotaSnapshot {
    QuotaSnapshot {
        daily_used: percent * 10,
        daily_limit: 1000,
        hourly_used: 1,
        hourly_limit: 240,
        monthly_used: 10,
        monthly_limit: 30_000,
        api_used: 10,
        api_limit: 1_000_000,
        observed_at: Utc::now(),
    }
}
