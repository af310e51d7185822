//! URL/host abuse feed tag extraction.
//!
//! The feed answers with an array of URL entries, each carrying a
//! `tags` array. The result handed to callers is the union of all
//! non-empty tags, sorted and joined by `", "` — an empty string when
//! nothing matched, or the distinct sentinel [`TIMEOUT_SENTINEL`] when
//! the call's wall-clock deadline expired.

use std::collections::BTreeSet;

use serde_json::Value;

/// Returned instead of tags when the whole call (retries included)
/// exceeds its wall-clock deadline. Distinct from empty to aid
/// diagnosis.
pub const TIMEOUT_SENTINEL: &str = "TIMEOUT";

/// Extract the sorted, deduplicated tag list from a host report.
#[must_use]
pub fn extract_tags(payload: &Value) -> String {
    let mut tags = BTreeSet::new();
    if let Some(urls) = payload.get("urls").and_then(Value::as_array) {
        for entry in urls {
            let Some(entry_tags) = entry.get("tags").and_then(Value::as_array) else {
                continue;
            };
            for tag in entry_tags {
                if let Some(tag) = tag.as_str()
                    && !tag.is_empty()
                {
                    tags.insert(tag.to_string());
                }
            }
        }
    }
    tags.into_iter().collect::<Vec<_>>().join(", ")
}
