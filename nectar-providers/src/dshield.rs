//! Network reputation response shaping.
//!
//! The provider answers with a JSON document carrying an `ip`
//! sub-object (`asname`, `ascountry`, attack counters). Anything that
//! is not a JSON object collapses to the empty sentinel. This provider
//! issues explicit backoff hints on rate-limit responses and bans
//! clients that ignore them, so its retry policy must honor
//! `Retry-After`.

use serde_json::Value;

pub use nectar_core::record::empty_dshield;

/// Coerce a raw provider response into the fixed report shape.
#[must_use]
pub fn shape_report(raw: Value) -> Value {
    if raw.is_object() {
        raw
    } else {
        empty_dshield()
    }
}
