//! nectar-providers
//!
//! Adapters for the four upstream threat-intelligence services. Each
//! adapter pairs an injectable API trait (so tests can substitute
//! canned transports) with a shaping module that coerces the provider's
//! response into the fixed internal form. The reqwest-backed
//! [`HttpApi`] implements all four traits and creates one client per
//! exchange, so HTTP sessions are never shared between calls.

/// API traits and the reqwest-backed adapter.
pub mod adapter;
/// Network reputation (DShield-shaped) response shaping.
pub mod dshield;
/// IP context (SPUR-shaped) flattening.
pub mod spur;
/// URL/host abuse (URLHaus-shaped) tag extraction.
pub mod urlhaus;
/// File scanner (VirusTotal-shaped) normalization.
pub mod virustotal;

pub use adapter::{DshieldApi, Endpoints, HttpApi, SpurApi, UrlhausApi, VirustotalApi};
