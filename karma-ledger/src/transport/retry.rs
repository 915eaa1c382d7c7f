//! Retry with exponential backoff.

use async_trait::async_trait;
use karma_core::{Envelope, Receipt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use super::traits::{LedgerTransport, TransportError};

/// Backoff policy shared by every retryable call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry (ms)
    pub base_delay_ms: u64,
    /// Upper bound on any single delay (ms)
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt.min(i32::MAX as u32) as i32);
        let millis = (self.base_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(millis.max(0.0) as u64)
    }
}

/// Wraps a transport and retries transient failures.
pub struct RetryingTransport<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T: LedgerTransport> RetryingTransport<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: LedgerTransport> LedgerTransport for RetryingTransport<T> {
    fn id(&self) -> &str {
        self.inner.id()
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    async fn submit(&self, envelope: Envelope) -> Result<Receipt, TransportError> {
        let mut attempt = 0;
        loop {
            match self.inner.submit(envelope.clone()).await {
                Err(e) if e.is_transient() && attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        transport = self.inner.id(),
                        operation = envelope.request.name(),
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient transport failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
