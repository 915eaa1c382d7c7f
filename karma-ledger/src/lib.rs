//! Karma Ledger - async service shell for the karma state machine
//!
//! Provides the runtime around [`karma_core::KarmaLedger`]:
//! - Single-writer commits with copy-on-write snapshots
//! - Concurrent snapshot reads that never observe a partial write
//! - Domain event subscription
//! - Audit trail of every submitted write
//! - Trait-based transport boundary with retry/backoff
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │  LedgerTransport (Local / Retrying / Mock) │
//! └─────────────────────┬──────────────────────┘
//!                       │ Envelope
//!                       ▼
//! ┌────────────────────────────────────────────┐
//! │               LedgerService                │
//! │  writer mutex ─▶ clone ─▶ apply ─▶ swap    │
//! └──────┬──────────────┬──────────────┬───────┘
//!        ▼              ▼              ▼
//! ┌─────────────┐ ┌────────────┐ ┌────────────┐
//! │  snapshot() │ │ subscribe()│ │  AuditLog  │
//! │ Arc<Ledger> │ │ EventStream│ │            │
//! └─────────────┘ └────────────┘ └────────────┘
//! ```

pub mod audit;
pub mod network;
pub mod service;
pub mod subscription;
pub mod transport;

// Re-export main types for convenience
pub use audit::{AuditEntry, AuditLog, AuditStats, AuditStatus};
pub use network::{ContractAddresses, NetworkConfig};
pub use service::{LedgerService, ServiceConfig, ServiceError};
pub use subscription::{CommittedEvent, EventStream};
pub use transport::{
    LedgerTransport, LocalTransport, MockTransport, RetryPolicy, RetryingTransport, TransportError,
};
