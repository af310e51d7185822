//! IP context flattening.
//!
//! Downstream storage and report generation index into the context
//! positionally, so the 18-field order below is a stable external
//! contract. Do not reorder.
//!
//! | index | field |
//! |------:|-------|
//! |     0 | ASN number |
//! |     1 | ASN organization |
//! |     2 | organization |
//! |     3 | infrastructure |
//! |     4 | client behaviors |
//! |     5 | client proxies |
//! |     6 | client types |
//! |     7 | client count |
//! |     8 | client concentration |
//! |     9 | client countries |
//! |    10 | client spread |
//! |    11 | risks |
//! |    12 | services |
//! |    13 | location (`city, state, country`) |
//! |    14 | tunnel anonymous |
//! |    15 | tunnel entries |
//! |    16 | tunnel operator |
//! |    17 | tunnel type |
//!
//! Every value is coerced to a printable string: absent and null become
//! empty, containers are rendered as compact JSON. Both the nested
//! (`client.behaviors`) and the flattened (`client_behaviors`) provider
//! schemas are accepted.

use serde_json::Value;

use nectar_core::record::SpurFields;

/// Coerce an arbitrary JSON value into a printable string.
#[must_use]
pub fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(container) => serde_json::to_string(container).unwrap_or_default(),
    }
}

/// Flatten a context document into the fixed 18-field sequence.
#[must_use]
pub fn flatten_context(payload: &Value) -> SpurFields {
    let mut fields = SpurFields::empty();

    match payload.get("asn") {
        Some(asn @ Value::Object(_)) => {
            fields.0[0] = stringify(asn.get("number"));
            fields.0[1] = stringify(asn.get("organization"));
        }
        other => {
            fields.0[0] = stringify(other);
            fields.0[1] = stringify(payload.get("asn_organization"));
        }
    }

    fields.0[2] = stringify(payload.get("organization"));
    fields.0[3] = stringify(payload.get("infrastructure"));

    let client = payload.get("client").filter(|c| c.is_object());
    let client_field = |nested: &str, flat: &str| {
        stringify(
            client
                .and_then(|c| c.get(nested))
                .or_else(|| payload.get(flat)),
        )
    };
    fields.0[4] = client_field("behaviors", "client_behaviors");
    fields.0[5] = client_field("proxies", "client_proxies");
    fields.0[6] = client_field("types", "client_types");
    fields.0[7] = client_field("count", "client_count");
    fields.0[8] = client_field("concentration", "client_concentration");
    fields.0[9] = client_field("countries", "client_countries");
    fields.0[10] = client_field("spread", "client_geo_spread");

    fields.0[11] = stringify(payload.get("risks"));
    fields.0[12] = stringify(payload.get("services"));

    fields.0[13] = match payload.get("location") {
        Some(location @ Value::Object(_)) => {
            let parts = ["city", "state", "country"]
                .iter()
                .map(|key| stringify(location.get(*key)))
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>();
            parts.join(", ")
        }
        other => stringify(other),
    };

    if let Some(tunnels) = payload.get("tunnels").and_then(Value::as_array)
        && let Some(tunnel) = tunnels.iter().find(|entry| entry.is_object())
    {
        fields.0[14] = stringify(tunnel.get("anonymous"));
        fields.0[15] = stringify(tunnel.get("entries"));
        fields.0[16] = stringify(tunnel.get("operator"));
        fields.0[17] = stringify(tunnel.get("type"));
    }

    fields
}

/// Parse a cached context payload back into the fixed sequence.
///
/// Cached entries hold either the raw context document or the already
/// flattened 18-element array; both forms round-trip.
#[must_use]
pub fn from_cached(payload: &Value) -> SpurFields {
    if let Some(items) = payload.as_array() {
        if items.len() == nectar_core::record::SPUR_FIELD_COUNT {
            let mut fields = SpurFields::empty();
            for (slot, item) in fields.0.iter_mut().zip(items) {
                *slot = match item {
                    Value::String(s) => s.clone(),
                    other => stringify(Some(other)),
                };
            }
            return fields;
        }
        return SpurFields::empty();
    }
    flatten_context(payload)
}
