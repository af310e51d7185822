//! Canned provider adapters and payload fixtures for tests.
//!
//! [`MockProvider`] implements every provider API trait plus the quota
//! seam. It serves a queue of scripted responses (falling back to the
//! last one), counts invocations, and can be told to panic when called
//! at all, which pins down "the network was never touched" assertions.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use nectar_middleware::QuotaApi;
use nectar_providers::adapter::{DshieldApi, SpurApi, UrlhausApi, VirustotalApi};
use nectar_types::{NectarError, QuotaSnapshot};

pub mod fixtures;

type Scripted = Result<Value, NectarError>;

/// Scripted provider double.
///
/// Responses are served front-to-back; the final response repeats once
/// the script is exhausted. An empty script yields `NotFound`.
pub struct MockProvider {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
    forbid_calls: AtomicBool,
    quota: Mutex<Option<QuotaSnapshot>>,
    closed: AtomicBool,
}

impl MockProvider {
    /// A provider that always serves `payload`.
    #[must_use]
    pub fn serving(payload: Value) -> Arc<Self> {
        Self::scripted(vec![Ok(payload)])
    }

    /// A provider that always fails with `err`.
    #[must_use]
    pub fn failing(err: NectarError) -> Arc<Self> {
        Self::scripted(vec![Err(err)])
    }

    /// A provider serving `script` in order, repeating the last entry.
    #[must_use]
    pub fn scripted(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicUsize::new(0),
            forbid_calls: AtomicBool::new(false),
            quota: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// A provider that panics the test if any call reaches it.
    #[must_use]
    pub fn unreachable() -> Arc<Self> {
        let provider = Self::scripted(Vec::new());
        provider.forbid_calls.store(true, Ordering::SeqCst);
        provider
    }

    /// Pin the quota snapshot returned by the [`QuotaApi`] impl.
    pub async fn set_quota(&self, snapshot: QuotaSnapshot) {
        *self.quota.lock().await = Some(snapshot);
    }

    /// Number of calls served so far, quota fetches excluded.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether `close` has been invoked.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn next(&self) -> Scripted {
        assert!(
            !self.forbid_calls.load(Ordering::SeqCst),
            "provider must not be invoked in this test"
        );
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().await;
        match script.len() {
            0 => Err(NectarError::not_found("scripted response")),
            1 => script
                .front()
                .cloned()
                .unwrap_or_else(|| Err(NectarError::not_found("scripted response"))),
            _ => script
                .pop_front()
                .unwrap_or_else(|| Err(NectarError::not_found("scripted response"))),
        }
    }
}

#[async_trait]
impl DshieldApi for MockProvider {
    async fn ip_report(&self, _ip: &str) -> Result<Value, NectarError> {
        self.next().await
    }
}

#[async_trait]
impl UrlhausApi for MockProvider {
    async fn host_report(&self, _ip: &str) -> Result<Value, NectarError> {
        self.next().await
    }
}

#[async_trait]
impl SpurApi for MockProvider {
    async fn ip_context(&self, _ip: &str) -> Result<Value, NectarError> {
        self.next().await
    }
}

#[async_trait]
impl VirustotalApi for MockProvider {
    async fn file_report(&self, _file_hash: &str) -> Result<Option<Value>, NectarError> {
        match self.next().await {
            Ok(Value::Null) => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(NectarError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl QuotaApi for MockProvider {
    async fn fetch_snapshot(&self) -> Result<QuotaSnapshot, NectarError> {
        self.quota
            .lock()
            .await
            .clone()
            .ok_or_else(|| NectarError::network("virustotal", "no quota scripted"))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
