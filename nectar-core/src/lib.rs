//! nectar-core
//!
//! Core building blocks shared across the nectar enrichment workspace.
//!
//! - `sanitize`: control-character stripping, JSON-tree sanitization, and
//!   repair heuristics for malformed provider payloads.
//! - `record`: the fixed-shape enrichment records consumed by callers.
//! - `flags`: boolean flag derivation over records and legacy shapes.
//! - `cancel`: a small cancellation token for unblocking in-flight sleeps.
#![warn(missing_docs)]

/// Cancellation token shared between the façade and blocking middleware.
pub mod cancel;
/// Boolean flag derivation from enrichment payloads.
pub mod flags;
/// Fixed-shape enrichment records and empty sentinels.
pub mod record;
/// Payload sanitization and JSON repair.
pub mod sanitize;

pub use cancel::CancelToken;
pub use flags::{SessionFlags, session_flags};
pub use nectar_types::{NectarError, Service};
pub use record::{EnrichmentRecord, FileEnrichment, SessionEnrichment, SpurFields, empty_dshield};
