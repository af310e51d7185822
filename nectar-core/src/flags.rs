//! Boolean flag derivation from enrichment payloads.
//!
//! Two entry points: [`session_flags`] over typed records, and
//! [`flags_from_enrichment`] over raw JSON for legacy shapes where the
//! enrichment block may group per-IP payloads under a `session` key.
//! Derivation iterates every payload node rather than assuming a shape.

use serde_json::Value;

use crate::record::{EnrichmentRecord, SpurFields};

/// Boolean verdicts derived from an enrichment record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionFlags {
    /// The reputation service has prior activity for the source IP.
    pub dshield_flagged: bool,
    /// The abuse feed returned at least one tag.
    pub urlhaus_flagged: bool,
    /// The IP-context service classified the source as risky infrastructure.
    pub spur_flagged: bool,
    /// The file scanner reported at least one malicious verdict.
    pub vt_flagged: bool,
}

impl SessionFlags {
    /// True when no service flagged anything.
    #[must_use]
    pub const fn is_clear(&self) -> bool {
        !(self.dshield_flagged || self.urlhaus_flagged || self.spur_flagged || self.vt_flagged)
    }
}

/// Derive flags from a typed record.
#[must_use]
pub fn session_flags(record: &EnrichmentRecord) -> SessionFlags {
    match record {
        EnrichmentRecord::Session { enrichment, .. } => SessionFlags {
            dshield_flagged: dshield_flag(&enrichment.dshield),
            urlhaus_flagged: urlhaus_tag_present(&enrichment.urlhaus),
            spur_flagged: spur_infrastructure_flag(enrichment.spur.infrastructure()),
            vt_flagged: false,
        },
        EnrichmentRecord::File { enrichment, .. } => SessionFlags {
            vt_flagged: enrichment.virustotal.as_ref().is_some_and(vt_flag),
            ..SessionFlags::default()
        },
    }
}

/// Derive flags from a raw enrichment value.
///
/// Accepts both the flat `{dshield, urlhaus, spur}` shape and the grouped
/// `{session: {<ip>: {dshield, ...}}}` shape; all contained payloads
/// contribute. The file-scanner flag only ever reads `virustotal`
/// fields; nested scanner payloads inside that field are still found,
/// but scanner-shaped objects elsewhere in the tree are not mistaken
/// for verdicts.
#[must_use]
pub fn flags_from_enrichment(enrichment: &Value) -> SessionFlags {
    let mut flags = SessionFlags::default();
    for payload in session_payloads(enrichment) {
        flags.dshield_flagged |= payload.get("dshield").is_some_and(dshield_flag);
        flags.urlhaus_flagged |= payload.get("urlhaus").is_some_and(urlhaus_flag);
        flags.spur_flagged |= payload.get("spur").is_some_and(spur_flag);
        flags.vt_flagged |= payload.get("virustotal").is_some_and(vt_flag);
    }
    flags.vt_flagged |= enrichment.get("virustotal").is_some_and(vt_flag);
    flags
}

fn session_payloads(enrichment: &Value) -> Vec<&Value> {
    if let Some(Value::Object(session)) = enrichment.get("session") {
        session.values().filter(|v| v.is_object()).collect()
    } else {
        vec![enrichment]
    }
}

/// Best-effort coercion of mixed numeric shapes into an integer.
#[must_use]
pub fn coerce_int(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn dshield_flag(payload: &Value) -> bool {
    let Some(ip) = payload.get("ip").filter(|v| v.is_object()) else {
        return false;
    };
    coerce_int(ip.get("count")) > 0 || coerce_int(ip.get("attacks")) > 0
}

fn urlhaus_flag(payload: &Value) -> bool {
    matches!(payload, Value::String(tags) if urlhaus_tag_present(tags))
}

fn urlhaus_tag_present(tags: &str) -> bool {
    !tags.trim().is_empty()
}

fn spur_flag(payload: &Value) -> bool {
    let Some(fields) = payload.as_array() else {
        return false;
    };
    if fields.len() <= SpurFields::INFRASTRUCTURE {
        return false;
    }
    fields[SpurFields::INFRASTRUCTURE]
        .as_str()
        .is_some_and(spur_infrastructure_flag)
}

fn spur_infrastructure_flag(infrastructure: &str) -> bool {
    let upper = infrastructure.to_uppercase();
    upper == "DATACENTER" || upper == "VPN"
}

/// True when any traversable file-scanner payload reports a malicious
/// verdict.
fn vt_flag(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            if map.get("data").is_some_and(Value::is_object) {
                coerce_int(analysis_stats(value).and_then(|s| s.get("malicious"))) > 0
            } else {
                map.values().any(vt_flag)
            }
        }
        Value::Array(items) => items.iter().any(vt_flag),
        _ => false,
    }
}

fn analysis_stats(payload: &Value) -> Option<&Value> {
    payload
        .get("data")?
        .get("attributes")?
        .get("last_analysis_stats")
}
