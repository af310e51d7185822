//! Cooperative cancellation for blocked enrichment calls.
//!
//! Rate-limit, retry, and quota sleeps watch a [`CancelToken`]; tripping
//! it unblocks them promptly and the call returns its service's empty
//! sentinel.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable cancellation token.
///
/// All clones observe the same cancellation; the token never resets.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Create a fresh, untripped token.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Trip the token. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// True once the token has been tripped.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the token trips. Pending forever if it never does.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender gone without tripping; nothing left to wait for.
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
