//! Transport boundary to the authoritative ledger.
//!
//! Provides a trait-based interface for submitting envelopes:
//! - In-process service (`LocalTransport`)
//! - Retry with exponential backoff over any transport
//! - Mock transport with scripted failures for testing

pub mod local;
pub mod mock;
pub mod retry;
pub mod traits;

pub use local::LocalTransport;
pub use mock::MockTransport;
pub use retry::{RetryPolicy, RetryingTransport};
pub use traits::{LedgerTransport, TransportError};
