//! Durable shared cache tier.
//!
//! An out-of-process key-value store shared across service instances.
//! The key namespace is `{service}:{key}`; values are the same
//! sanitized JSON payloads the other tiers hold, expired server-side
//! via per-service TTLs. When no connection string is configured the
//! tier composes out of the hierarchy entirely.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde_json::Value;
use tracing::debug;

use nectar_types::{NectarError, Service, TtlConfig};

use crate::cache::{CacheTier, TierCounters, TierStats};

/// Minimal contract a durable backing store must satisfy.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Fetch the raw payload text stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, NectarError>;

    /// Store `value` under `key` with a time-to-live.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
    -> Result<(), NectarError>;

    /// Remove `key`.
    async fn delete(&self, key: &str) -> Result<(), NectarError>;

    /// Release the connection.
    async fn close(&self) {}
}

/// Redis-backed durable store.
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connect to the store at `url`.
    ///
    /// # Errors
    /// Returns `NectarError::Cache` when the URL is invalid or the
    /// initial connection fails.
    pub async fn connect(url: &str) -> Result<Self, NectarError> {
        let client = redis::Client::open(url).map_err(|e| NectarError::Cache(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| NectarError::Cache(e.to_string()))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl DurableStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, NectarError> {
        let mut conn = self.manager.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut conn)
            .await
            .map_err(|e| NectarError::Cache(e.to_string()))
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), NectarError> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| NectarError::Cache(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), NectarError> {
        let mut conn = self.manager.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| NectarError::Cache(e.to_string()))
    }
}

/// Durable tier wrapping any [`DurableStore`].
pub struct DurableTier {
    store: Arc<dyn DurableStore>,
    ttls: TtlConfig,
    counters: TierCounters,
}

impl DurableTier {
    /// Wrap a backing store with per-service TTLs.
    #[must_use]
    pub fn new(store: Arc<dyn DurableStore>, ttls: TtlConfig) -> Self {
        Self {
            store,
            ttls,
            counters: TierCounters::default(),
        }
    }

    fn namespaced(service: Service, key: &str) -> String {
        format!("{service}:{key}")
    }

    /// Release the backing connection.
    pub async fn close(&self) {
        self.store.close().await;
    }
}

#[async_trait]
impl CacheTier for DurableTier {
    fn name(&self) -> &'static str {
        "durable"
    }

    async fn get(&self, service: Service, key: &str) -> Option<Value> {
        let started = Instant::now();
        match self.store.get(&Self::namespaced(service, key)).await {
            Ok(Some(text)) => match serde_json::from_str(&text) {
                Ok(value) => {
                    self.counters.hit(started);
                    Some(value)
                }
                Err(err) => {
                    debug!(target: "nectar::cache", %service, %err, "malformed durable entry ignored");
                    self.counters.miss(started);
                    None
                }
            },
            Ok(None) => {
                self.counters.miss(started);
                None
            }
            Err(err) => {
                debug!(target: "nectar::cache", %service, %err, "durable read failed");
                self.counters.error();
                None
            }
        }
    }

    async fn put(&self, service: Service, key: &str, payload: &Value) {
        let started = Instant::now();
        let text = serde_json::to_string(payload).unwrap_or_default();
        let ttl = self.ttls.ttl_for(service);
        match self
            .store
            .set_with_ttl(&Self::namespaced(service, key), &text, ttl)
            .await
        {
            Ok(()) => self.counters.store(started),
            Err(err) => {
                debug!(target: "nectar::cache", %service, %err, "durable write failed");
                self.counters.error();
            }
        }
    }

    async fn delete(&self, service: Service, key: &str) {
        if let Err(err) = self.store.delete(&Self::namespaced(service, key)).await {
            debug!(target: "nectar::cache", %service, %err, "durable delete failed");
            self.counters.error();
        }
    }

    fn stats(&self) -> TierStats {
        self.counters.snapshot()
    }
}
