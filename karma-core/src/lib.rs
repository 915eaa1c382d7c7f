//! Karma Core - Deterministic Reputation State Machine
//!
//! A single authoritative state machine for agent reputation:
//!
//! - **Identity registry**: Agent identities, metadata and standing
//! - **Interaction ledger**: Content-addressed, idempotent interaction log
//! - **Rating aggregator**: Interaction-gated 1-10 ratings with running stats
//! - **Karma engine**: Time-decayed, reputation-weighted karma and leaderboard
//! - **Governance**: Karma-weighted proposals, quorum/veto tally, typed execution
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        KarmaLedger                          │
//! │             apply(Envelope) -> Result<Receipt>              │
//! │                                                             │
//! │  ┌──────────┐   ┌──────────────┐   ┌────────────┐           │
//! │  │ Identity │──▶│ Interaction  │──▶│   Rating   │           │
//! │  │ Registry │   │    Ledger    │   │ Aggregator │           │
//! │  └────┬─────┘   └──────┬───────┘   └─────┬──────┘           │
//! │       │                │ recompute       │ recompute        │
//! │       │                ▼                 ▼                  │
//! │       │          ┌──────────────────────────┐               │
//! │       │          │       Karma Engine       │               │
//! │       │          └────────────┬─────────────┘               │
//! │       │                       │ voting power                │
//! │       │                ┌──────▼──────┐                      │
//! │       └───────────────▶│ Governance  │                      │
//! │                        └─────────────┘                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! There is no I/O and no clock in this crate: every write carries its
//! caller and timestamp in an [`Envelope`], and every read takes `now`.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod governance;
pub mod hashing;
pub mod interactions;
pub mod karma;
pub mod ratings;
pub mod registry;
pub mod types;

// Re-export main types
pub use config::{EngineConfig, GovernanceUpdate, KarmaParameter, VotingPowerCurve};
pub use engine::{Envelope, KarmaLedger, Outcome, Receipt, Request};
pub use error::{KarmaError, Result};
pub use events::DomainEvent;
pub use governance::{
    Proposal, ProposalAction, ProposalDraft, ProposalKind, ProposalStatus, Tally, TallyOutcome,
    Vote, VoteOption,
};
pub use karma::{KarmaBreakdown, KarmaReason, KarmaSnapshot, KarmaUpdate, LeaderboardEntry};
pub use ratings::{RatingStats, RatingSubmission};
pub use types::*;
