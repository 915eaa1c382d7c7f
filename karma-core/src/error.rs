//! Error types for the karma state machine.
//!
//! Every variant is a deterministic validation failure: it is surfaced
//! synchronously, leaves state untouched, and would fail identically on retry.

use crate::types::{Address, Timestamp};

/// Failure of a ledger operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KarmaError {
    /// Address has no registered identity
    #[error("Agent not registered: {address}")]
    NotRegistered { address: Address },

    /// Caller may not act on behalf of the target
    #[error("Unauthorized: {caller} cannot {action}")]
    Unauthorized { caller: Address, action: String },

    /// Agent is suspended by governance
    #[error("Agent suspended: {address}")]
    AgentSuspended { address: Address },

    /// Metadata failed validation
    #[error("Invalid agent metadata: {reason}")]
    InvalidMetadata { reason: String },

    /// Participant set failed validation
    #[error("Invalid participants: {reason}")]
    InvalidParticipants { reason: String },

    /// Interaction type or metadata failed validation
    #[error("Invalid interaction: {reason}")]
    InvalidInteraction { reason: String },

    /// Rater and rated agent are the same
    #[error("Cannot rate yourself: {address}")]
    SelfRatingForbidden { address: Address },

    /// Rating score outside [1, 10]
    #[error("Invalid rating score: {score}. Must be between 1 and 10")]
    ScoreOutOfRange { score: i64 },

    /// Referenced interaction does not exist
    #[error("Interaction not found: {interaction_id}")]
    InteractionNotFound { interaction_id: String },

    /// Agent did not take part in the referenced interaction
    #[error("{address} is not a participant of interaction {interaction_id}")]
    NotAParticipant {
        address: Address,
        interaction_id: String,
    },

    /// Rating submitted too long after the interaction
    #[error("Rating window expired for interaction: {interaction_id}")]
    RatingWindowExpired { interaction_id: String },

    /// Feedback text failed validation
    #[error("Invalid feedback: {reason}")]
    InvalidFeedback { reason: String },

    /// Rater exceeded the ratings allowed per window
    #[error("Rate limit exceeded: {rater} submitted {limit} ratings within {window_secs}s")]
    RateLimitExceeded {
        rater: Address,
        limit: u32,
        window_secs: u64,
    },

    /// A rating already exists for this (rater, rated, interaction)
    #[error("Rating already submitted by {rater} for {rated} on interaction {interaction_id}")]
    DuplicateRating {
        rater: Address,
        rated: Address,
        interaction_id: String,
    },

    /// Caller's karma is below the required minimum
    #[error("Insufficient karma: required {required:.2}, available {available:.2}")]
    InsufficientKarma { required: f64, available: f64 },

    /// Proposal id is unknown
    #[error("Proposal not found: {proposal_id}")]
    ProposalNotFound { proposal_id: u64 },

    /// Proposal content or payload failed validation
    #[error("Invalid proposal: {reason}")]
    InvalidProposal { reason: String },

    /// Voting has not opened yet
    #[error("Voting has not started for proposal {proposal_id} (starts {voting_start})")]
    VotingNotStarted {
        proposal_id: u64,
        voting_start: Timestamp,
    },

    /// Voting has ended or the proposal is closed
    #[error("Voting closed for proposal {proposal_id}")]
    VotingClosed { proposal_id: u64 },

    /// Finalization attempted before the voting period ended
    #[error("Voting still open for proposal {proposal_id} (ends {voting_end})")]
    VotingStillOpen {
        proposal_id: u64,
        voting_end: Timestamp,
    },

    /// Proposal already has a final tally
    #[error("Proposal already finalized: {proposal_id}")]
    AlreadyFinalized { proposal_id: u64 },

    /// Proposal was already executed
    #[error("Proposal already executed: {proposal_id}")]
    AlreadyExecuted { proposal_id: u64 },

    /// Proposal was rejected for lack of quorum
    #[error("Quorum not met for proposal {proposal_id}: cast {cast:.2}, required {required:.2}")]
    QuorumNotMet {
        proposal_id: u64,
        cast: f64,
        required: f64,
    },

    /// Proposal did not pass
    #[error("Proposal not passed: {proposal_id}")]
    ProposalNotPassed { proposal_id: u64 },

    /// Execution attempted before the execution delay elapsed
    #[error("Execution delay active for proposal {proposal_id} until {executable_at}")]
    ExecutionDelayActive {
        proposal_id: u64,
        executable_at: Timestamp,
    },

    /// Request timestamp is older than the last committed write
    #[error("Timestamp {timestamp} precedes last committed write at {last_committed}")]
    TimestampRegression {
        timestamp: Timestamp,
        last_committed: Timestamp,
    },

    /// A derived deadline falls outside the representable time range
    #[error("Timestamp {timestamp} plus {offset_secs}s is out of range")]
    TimestampOutOfRange { timestamp: Timestamp, offset_secs: u64 },

    /// Configuration failed validation
    #[error("Invalid configuration: {key} = {value}")]
    InvalidConfig { key: String, value: String },
}

impl KarmaError {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotRegistered { .. } => "NOT_REGISTERED",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::AgentSuspended { .. } => "AGENT_SUSPENDED",
            Self::InvalidMetadata { .. } => "INVALID_METADATA",
            Self::InvalidParticipants { .. } => "INVALID_PARTICIPANTS",
            Self::InvalidInteraction { .. } => "INVALID_INTERACTION",
            Self::SelfRatingForbidden { .. } => "SELF_RATING_FORBIDDEN",
            Self::ScoreOutOfRange { .. } => "SCORE_OUT_OF_RANGE",
            Self::InteractionNotFound { .. } => "INTERACTION_NOT_FOUND",
            Self::NotAParticipant { .. } => "NOT_A_PARTICIPANT",
            Self::RatingWindowExpired { .. } => "RATING_WINDOW_EXPIRED",
            Self::InvalidFeedback { .. } => "INVALID_FEEDBACK",
            Self::DuplicateRating { .. } => "DUPLICATE_RATING",
            Self::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            Self::InsufficientKarma { .. } => "INSUFFICIENT_KARMA",
            Self::ProposalNotFound { .. } => "PROPOSAL_NOT_FOUND",
            Self::InvalidProposal { .. } => "INVALID_PROPOSAL",
            Self::VotingNotStarted { .. } => "VOTING_NOT_STARTED",
            Self::VotingClosed { .. } => "VOTING_CLOSED",
            Self::VotingStillOpen { .. } => "VOTING_STILL_OPEN",
            Self::AlreadyFinalized { .. } => "ALREADY_FINALIZED",
            Self::AlreadyExecuted { .. } => "ALREADY_EXECUTED",
            Self::QuorumNotMet { .. } => "QUORUM_NOT_MET",
            Self::ProposalNotPassed { .. } => "PROPOSAL_NOT_PASSED",
            Self::ExecutionDelayActive { .. } => "EXECUTION_DELAY_ACTIVE",
            Self::TimestampRegression { .. } => "TIMESTAMP_REGRESSION",
            Self::TimestampOutOfRange { .. } => "TIMESTAMP_OUT_OF_RANGE",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
        }
    }

    pub(crate) fn invalid_config(key: &str, value: impl ToString) -> Self {
        Self::InvalidConfig {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, KarmaError>;
