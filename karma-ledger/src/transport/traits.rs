//! Core traits for ledger transports.

use async_trait::async_trait;
use karma_core::{Envelope, KarmaError, Receipt};

/// Error types for transport operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransportError {
    /// No response within the deadline
    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    /// Connection dropped mid-request
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Ledger endpoint not reachable
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger validated and rejected the write
    #[error("Rejected: {0}")]
    Rejected(#[from] KarmaError),
}

impl TransportError {
    /// Whether retrying the same envelope may succeed.
    ///
    /// Validation failures are deterministic and fail identically on retry.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    /// Stable error code for the failure.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "TIMEOUT",
            Self::ConnectionLost(_) => "CONNECTION_LOST",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::Rejected(e) => e.code(),
        }
    }
}

/// Submits write envelopes to a ledger.
///
/// Envelopes carry their own timestamp, so resubmitting one after a lost
/// response yields the same content-derived identifiers.
#[async_trait]
pub trait LedgerTransport: Send + Sync {
    /// Transport identifier for logs.
    fn id(&self) -> &str;

    /// Check if the ledger is currently reachable.
    async fn is_available(&self) -> bool;

    /// Submit one write and wait for its receipt.
    async fn submit(&self, envelope: Envelope) -> Result<Receipt, TransportError>;
}
