//! Fixed-shape enrichment records.
//!
//! The shapes here are an external contract: the rest of the pipeline
//! stores them verbatim in a JSON column and report generation indexes
//! into them positionally.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Number of fields in the flattened IP-context sequence.
pub const SPUR_FIELD_COUNT: usize = 18;

/// The canonical empty network-reputation payload.
///
/// Absence of data collapses to this shape; the `dshield` field of a
/// session record is never structurally missing.
#[must_use]
pub fn empty_dshield() -> Value {
    json!({"ip": {"asname": "", "ascountry": ""}})
}

/// Flattened IP-context attributes in a fixed order.
///
/// Always exactly 18 strings; the all-empty form is the service's empty
/// sentinel. The ordering table lives next to the SPUR adapter that
/// produces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpurFields(pub [String; SPUR_FIELD_COUNT]);

impl SpurFields {
    /// Index of the infrastructure classification field.
    pub const INFRASTRUCTURE: usize = 3;

    /// The 18-empty-string sentinel.
    #[must_use]
    pub fn empty() -> Self {
        Self(std::array::from_fn(|_| String::new()))
    }

    /// The infrastructure classification (e.g. `DATACENTER`, `VPN`).
    #[must_use]
    pub fn infrastructure(&self) -> &str {
        &self.0[Self::INFRASTRUCTURE]
    }

    /// True when every field is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(String::is_empty)
    }

    /// View the fields as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for SpurFields {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::ops::Index<usize> for SpurFields {
    type Output = String;

    fn index(&self, index: usize) -> &String {
        &self.0[index]
    }
}

/// Per-session enrichment block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEnrichment {
    /// Network-reputation payload; empty sentinel when absent.
    pub dshield: Value,
    /// Sorted unique abuse-feed tags joined by `", "`; empty when none,
    /// the literal `TIMEOUT` when the feed's wall-clock deadline expired.
    pub urlhaus: String,
    /// Flattened IP-context sequence.
    pub spur: SpurFields,
}

impl SessionEnrichment {
    /// The all-empty enrichment block.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            dshield: empty_dshield(),
            urlhaus: String::new(),
            spur: SpurFields::empty(),
        }
    }
}

/// Per-file enrichment block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEnrichment {
    /// File-scanner payload; `None` on miss, quota refusal, or upstream 404.
    pub virustotal: Option<Value>,
}

/// The record returned to callers, one variant per request kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnrichmentRecord {
    /// Session enrichment keyed by session id and source IP.
    Session {
        /// Opaque session identifier.
        session_id: String,
        /// Source IP the session originated from.
        src_ip: String,
        /// Per-service enrichment results.
        enrichment: SessionEnrichment,
    },
    /// File enrichment keyed by content hash.
    File {
        /// Hex content hash, SHA-256 preferred.
        file_hash: String,
        /// Sanitized filename reported alongside the hash.
        filename: String,
        /// File-scanner result.
        enrichment: FileEnrichment,
    },
}

impl EnrichmentRecord {
    /// Build an all-empty session record.
    #[must_use]
    pub fn empty_session(session_id: impl Into<String>, src_ip: impl Into<String>) -> Self {
        Self::Session {
            session_id: session_id.into(),
            src_ip: src_ip.into(),
            enrichment: SessionEnrichment::empty(),
        }
    }

    /// Build an empty file record.
    #[must_use]
    pub fn empty_file(file_hash: impl Into<String>, filename: impl Into<String>) -> Self {
        Self::File {
            file_hash: file_hash.into(),
            filename: filename.into(),
            enrichment: FileEnrichment { virustotal: None },
        }
    }

    /// The session enrichment block, when this is a session record.
    #[must_use]
    pub const fn session_enrichment(&self) -> Option<&SessionEnrichment> {
        match self {
            Self::Session { enrichment, .. } => Some(enrichment),
            Self::File { .. } => None,
        }
    }

    /// The file enrichment block, when this is a file record.
    #[must_use]
    pub const fn file_enrichment(&self) -> Option<&FileEnrichment> {
        match self {
            Self::File { enrichment, .. } => Some(enrichment),
            Self::Session { .. } => None,
        }
    }
}
