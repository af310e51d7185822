//! Retry wrapper with exponential backoff.
//!
//! Only transient failures are retried: network faults, per-request
//! timeouts, 5xx statuses, and rate-limit signals. The file scanner
//! reports rate limiting as 401, so that status gets the escalated
//! 60-second-doubling schedule rather than being treated as a terminal
//! authentication failure; a 429 waits for the server hint when one was
//! supplied and `respect_retry_after` is set, otherwise at least two
//! minutes. When enabled, the jitter multiplier in `[0.5, 1.0]` applies
//! to every computed backoff; only server hints are honored exactly.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use nectar_core::CancelToken;
use nectar_types::{NectarError, RetryConfig};

/// Sleep for `duration`, unblocking early if `cancel` trips.
///
/// # Errors
/// Returns `NectarError::Cancelled` when the token trips before the
/// sleep completes.
pub async fn sleep_or_cancel(
    duration: Duration,
    cancel: Option<&CancelToken>,
) -> Result<(), NectarError> {
    let Some(token) = cancel else {
        tokio::time::sleep(duration).await;
        return Ok(());
    };
    if token.is_cancelled() {
        return Err(NectarError::Cancelled);
    }
    tokio::select! {
        () = tokio::time::sleep(duration) => Ok(()),
        () = token.cancelled() => Err(NectarError::Cancelled),
    }
}

/// Backoff schedule applied around provider calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay for the first backoff.
    pub base: Duration,
    /// Multiplier applied per attempt.
    pub factor: f64,
    /// Apply a random multiplier in `[0.5, 1.0]` to computed backoffs.
    pub jitter: bool,
    /// Honor server-indicated retry delays on 429 responses.
    pub respect_retry_after: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default(), false)
    }
}

impl RetryPolicy {
    /// Build a policy from shared retry configuration.
    #[must_use]
    pub const fn from_config(cfg: &RetryConfig, respect_retry_after: bool) -> Self {
        Self {
            max_retries: cfg.max_retries,
            base: cfg.base,
            factor: cfg.factor,
            jitter: cfg.jitter,
            respect_retry_after,
        }
    }

    /// Run `op` until it succeeds, fails terminally, or the retry budget
    /// is spent. The operation executes at most `max_retries + 1` times;
    /// the last error is returned verbatim once the budget is gone.
    ///
    /// # Errors
    /// The terminal or final transient error from `op`, or
    /// `NectarError::Cancelled` when the token trips mid-backoff.
    pub async fn run<T, F, Fut>(
        &self,
        service: &str,
        cancel: Option<&CancelToken>,
        mut op: F,
    ) -> Result<T, NectarError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, NectarError>>,
    {
        let mut attempt = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => {
                    if attempt >= self.max_retries {
                        return Err(err);
                    }
                    let delay = self.delay_for(&err, attempt);
                    warn!(
                        target: "nectar::retry",
                        service,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        %err,
                        "transient failure, backing off"
                    );
                    sleep_or_cancel(delay, cancel).await?;
                    attempt += 1;
                }
            }
        }
    }

    fn delay_for(&self, err: &NectarError, attempt: u32) -> Duration {
        let exp = self.base.as_secs_f64() * self.factor.powi(attempt.min(i32::MAX as u32) as i32);
        let backoff = match err.status() {
            // The file scanner signals rate limiting as 401; escalate
            // from a 60 s floor, doubling per attempt.
            Some(401) => (60.0 * 2f64.powi(attempt.min(30) as i32)).max(exp),
            Some(429) => {
                if self.respect_retry_after
                    && let Some(ms) = err.retry_after_ms()
                {
                    // Server hints are honored exactly; jittering below
                    // the stated delay gets clients banned.
                    return Duration::from_millis(ms);
                }
                exp.max(120.0)
            }
            _ => exp,
        };
        let backoff = if self.jitter {
            backoff * (0.5 + rand::random::<f64>() * 0.5)
        } else {
            backoff
        };
        Duration::from_secs_f64(backoff)
    }
}
