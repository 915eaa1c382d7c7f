//! Mock transport for testing.

use async_trait::async_trait;
use karma_core::{EngineConfig, Envelope, KarmaLedger, Receipt};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use super::traits::{LedgerTransport, TransportError};

/// Mock transport backed by an in-memory ledger.
///
/// Scripted failures are returned first, one per call, before any
/// envelope reaches the ledger.
pub struct MockTransport {
    id: String,
    available: AtomicBool,
    ledger: Mutex<KarmaLedger>,
    failures: Mutex<VecDeque<TransportError>>,
    call_count: AtomicU32,
}

impl MockTransport {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            available: AtomicBool::new(true),
            ledger: Mutex::new(KarmaLedger::default()),
            failures: Mutex::new(VecDeque::new()),
            call_count: AtomicU32::new(0),
        }
    }

    /// Use a ledger built from `config`.
    pub fn with_config(self, config: EngineConfig) -> Result<Self, TransportError> {
        let ledger = KarmaLedger::new(config)?;
        if let Ok(mut guard) = self.ledger.lock() {
            *guard = ledger;
        }
        Ok(self)
    }

    /// Queue failures to return before succeeding.
    pub fn with_failures(self, failures: impl IntoIterator<Item = TransportError>) -> Self {
        if let Ok(mut queue) = self.failures.lock() {
            queue.extend(failures);
        }
        self
    }

    /// Set availability.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Get the number of times submit was called.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Committed sequence of the backing ledger.
    pub fn sequence(&self) -> u64 {
        self.ledger.lock().map(|l| l.sequence()).unwrap_or_default()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new("mock-ledger")
    }
}

#[async_trait]
impl LedgerTransport for MockTransport {
    fn id(&self) -> &str {
        &self.id
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn submit(&self, envelope: Envelope) -> Result<Receipt, TransportError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        if !self.available.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("Mock ledger disabled".to_string()));
        }
        let scripted = self.failures.lock().ok().and_then(|mut q| q.pop_front());
        if let Some(failure) = scripted {
            return Err(failure);
        }

        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| TransportError::Unavailable("Mock ledger poisoned".to_string()))?;
        Ok(ledger.apply(envelope)?)
    }
}
