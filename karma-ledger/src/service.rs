//! LedgerService - async entry point for ledger writes and reads.
//!
//! Writers are serialized behind a mutex. Each write is applied to a
//! private clone of the committed state and published by swapping the
//! shared `Arc`, so readers holding a snapshot never see a partial write.
//!
//! The clone copies the whole ledger, so a write costs time proportional
//! to total state. Fine for an in-process model; a persistent backend
//! would need structural sharing instead.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info};

use crate::audit::{AuditLog, MAX_AUDIT_ENTRIES};
use crate::subscription::{CommittedEvent, EventStream};
use karma_core::{
    Address, EngineConfig, Envelope, KarmaError, KarmaLedger, LeaderboardEntry, Receipt, Request,
};

/// Error types for the service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The state machine rejected the write
    #[error("Write rejected: {0}")]
    Rejected(#[from] KarmaError),

    /// Engine configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The writer slot was not acquired in time; nothing was applied
    #[error("Writer busy for {waited_ms}ms")]
    Busy { waited_ms: u64 },
}

impl ServiceError {
    /// The underlying validation error, if any.
    pub fn karma_error(&self) -> Option<&KarmaError> {
        match self {
            Self::Rejected(e) => Some(e),
            Self::InvalidConfig(_) | Self::Busy { .. } => None,
        }
    }
}

/// Configuration for the LedgerService.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Buffered events per subscriber before it starts skipping
    pub event_capacity: usize,
    /// Whether to log all writes
    pub audit_enabled: bool,
    /// Maximum audit entries retained
    pub audit_retention: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
            audit_enabled: true,
            audit_retention: MAX_AUDIT_ENTRIES,
        }
    }
}

/// Async shell around a [`KarmaLedger`].
pub struct LedgerService {
    /// Configuration
    config: ServiceConfig,
    /// Held for the duration of each write
    writer: Mutex<()>,
    /// Latest committed state
    state: RwLock<Arc<KarmaLedger>>,
    /// Committed event fan-out
    events: broadcast::Sender<CommittedEvent>,
    /// Audit log
    audit: Arc<AuditLog>,
}

impl LedgerService {
    /// Create a service over an empty ledger.
    pub fn new(engine: EngineConfig) -> Result<Self, ServiceError> {
        Self::with_config(engine, ServiceConfig::default())
    }

    /// Create with service configuration.
    pub fn with_config(engine: EngineConfig, config: ServiceConfig) -> Result<Self, ServiceError> {
        Ok(Self::from_ledger(KarmaLedger::new(engine)?, config))
    }

    /// Create from engine configuration YAML.
    pub fn from_yaml(yaml: &str, config: ServiceConfig) -> Result<Self, ServiceError> {
        let engine =
            EngineConfig::from_yaml(yaml).map_err(|e| ServiceError::InvalidConfig(e.to_string()))?;
        Self::with_config(engine, config)
    }

    /// Wrap existing ledger state.
    pub fn from_ledger(ledger: KarmaLedger, config: ServiceConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        info!(
            sequence = ledger.sequence(),
            event_capacity = config.event_capacity,
            audit_enabled = config.audit_enabled,
            "LedgerService started"
        );
        Self {
            audit: Arc::new(AuditLog::with_max_entries(config.audit_retention)),
            config,
            writer: Mutex::new(()),
            state: RwLock::new(Arc::new(ledger)),
            events,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Submit a write stamped with the current time.
    ///
    /// The stamp never precedes the last committed timestamp, so the
    /// ordering log stays monotonic under clock skew.
    pub async fn submit(
        &self,
        caller: impl Into<Address>,
        request: Request,
    ) -> Result<Receipt, ServiceError> {
        let _writer = self.writer.lock().await;
        let last_committed = self.snapshot().await.last_committed();
        let now = last_committed.map_or_else(Utc::now, |last| Utc::now().max(last));
        self.commit(Envelope::new(caller, now, request)).await
    }

    /// Submit a pre-stamped envelope.
    pub async fn submit_envelope(&self, envelope: Envelope) -> Result<Receipt, ServiceError> {
        let _writer = self.writer.lock().await;
        self.commit(envelope).await
    }

    /// Submit a pre-stamped envelope, giving up if the writer slot is not
    /// free within `timeout`.
    ///
    /// The deadline only covers the wait. Once the slot is held the write
    /// runs to completion, so `Busy` always means the envelope was not
    /// applied and is safe to resend.
    pub async fn submit_envelope_within(
        &self,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<Receipt, ServiceError> {
        let _writer = tokio::time::timeout(timeout, self.writer.lock())
            .await
            .map_err(|_| ServiceError::Busy {
                waited_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })?;
        self.commit(envelope).await
    }

    /// Apply under the writer lock. Dropping this future before the swap
    /// leaves the committed state untouched.
    async fn commit(&self, envelope: Envelope) -> Result<Receipt, ServiceError> {
        let entry_id = if self.config.audit_enabled {
            Some(self.audit.log_request(&envelope).await)
        } else {
            None
        };

        let mut next = KarmaLedger::clone(&*self.snapshot().await);
        let receipt = match next.apply(envelope) {
            Ok(receipt) => receipt,
            Err(e) => {
                if let Some(entry_id) = entry_id {
                    self.audit.log_rejection(&entry_id, &e).await;
                }
                return Err(e.into());
            }
        };

        if receipt.committed() {
            *self.state.write().await = Arc::new(next);
            self.publish(&receipt);
        } else {
            debug!(sequence = receipt.sequence, "Nothing to publish");
        }

        if let Some(entry_id) = entry_id {
            self.audit.log_receipt(&entry_id, &receipt).await;
        }
        Ok(receipt)
    }

    fn publish(&self, receipt: &Receipt) {
        for event in &receipt.events {
            // No subscribers is not an error
            let _ = self.events.send(CommittedEvent {
                sequence: receipt.sequence,
                timestamp: receipt.timestamp,
                event: event.clone(),
            });
        }
    }

    /// Latest committed state. Cheap; holds no lock after returning.
    pub async fn snapshot(&self) -> Arc<KarmaLedger> {
        Arc::clone(&*self.state.read().await)
    }

    pub async fn sequence(&self) -> u64 {
        self.snapshot().await.sequence()
    }

    /// Karma of an agent at the current time.
    pub async fn karma(&self, address: &Address) -> Result<f64, ServiceError> {
        Ok(self.snapshot().await.karma_at(address, Utc::now())?)
    }

    /// Leaderboard at the current time.
    pub async fn leaderboard(&self, limit: Option<usize>) -> Vec<LeaderboardEntry> {
        self.snapshot().await.leaderboard(Utc::now(), limit)
    }

    /// Subscribe to events committed from now on.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.events.subscribe())
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }
}
