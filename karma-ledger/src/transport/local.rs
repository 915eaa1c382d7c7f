//! In-process transport over a [`LedgerService`].

use async_trait::async_trait;
use karma_core::{Envelope, Receipt};
use std::sync::Arc;
use std::time::Duration;

use super::traits::{LedgerTransport, TransportError};
use crate::service::{LedgerService, ServiceError};

/// Submits directly to a service in the same process.
pub struct LocalTransport {
    id: String,
    service: Arc<LedgerService>,
    timeout: Option<Duration>,
}

impl LocalTransport {
    pub fn new(service: Arc<LedgerService>) -> Self {
        Self {
            id: "local".to_string(),
            service,
            timeout: None,
        }
    }

    /// Abandon writes that cannot take the writer slot within `timeout`.
    ///
    /// A write that has started is never cut short, so a `Timeout` from
    /// this transport means nothing was applied. Retrying is safe even for
    /// non-idempotent requests such as proposal creation.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn service(&self) -> &Arc<LedgerService> {
        &self.service
    }
}

#[async_trait]
impl LedgerTransport for LocalTransport {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn submit(&self, envelope: Envelope) -> Result<Receipt, TransportError> {
        let result = match self.timeout {
            Some(timeout) => self.service.submit_envelope_within(envelope, timeout).await,
            None => self.service.submit_envelope(envelope).await,
        };

        result.map_err(|e| match e {
            ServiceError::Rejected(e) => TransportError::Rejected(e),
            ServiceError::InvalidConfig(reason) => TransportError::Unavailable(reason),
            ServiceError::Busy { waited_ms } => TransportError::Timeout(waited_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use karma_core::{Address, AgentMetadata, EngineConfig, Request};

    #[tokio::test]
    async fn test_rejection_maps_to_permanent_error() {
        let service = Arc::new(LedgerService::new(EngineConfig::default()).unwrap());
        let transport = LocalTransport::new(service);

        let envelope = Envelope::new(
            "mallory",
            Utc::now(),
            Request::Register {
                address: Address::new("alice"),
                metadata: AgentMetadata::new("alice", "", "MCP"),
            },
        );
        let err = transport.submit(envelope).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_uncontended_write_commits_under_tight_timeout() {
        let service = Arc::new(LedgerService::new(EngineConfig::default()).unwrap());
        let transport =
            LocalTransport::new(Arc::clone(&service)).with_timeout(Duration::from_millis(1));

        let envelope = Envelope::new(
            "alice",
            Utc::now(),
            Request::Register {
                address: Address::new("alice"),
                metadata: AgentMetadata::new("alice", "", "MCP"),
            },
        );
        let receipt = transport.submit(envelope).await.unwrap();
        assert!(receipt.committed());
        assert_eq!(service.sequence().await, 1);
        assert_eq!(service.audit().stats().await.committed, 1);
    }
}
