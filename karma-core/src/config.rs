//! Configuration for the karma state machine.
//!
//! Every section has working defaults; a deployment usually overrides only a
//! handful of values from YAML. The karma and governance sections can also
//! be changed at runtime by executed governance proposals, which re-run
//! [`EngineConfig::validate`] before the change is committed.

use crate::error::{KarmaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(feature = "typescript")]
use ts_rs::TS;

const DAY_SECS: u64 = 24 * 60 * 60;
/// Upper bound for governance delays
const MAX_DELAY_SECS: u64 = 365 * DAY_SECS;

/// Configuration for the whole ledger.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Identity registry limits
    pub registry: RegistryConfig,
    /// Interaction ledger limits
    pub interactions: InteractionConfig,
    /// Rating acceptance rules
    pub ratings: RatingConfig,
    /// Karma formula parameters
    pub karma: KarmaConfig,
    /// Proposal and voting rules
    pub governance: GovernanceConfig,
}

impl EngineConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Check every section for out-of-range values.
    pub fn validate(&self) -> Result<()> {
        self.registry.validate()?;
        self.interactions.validate()?;
        self.ratings.validate()?;
        self.karma.validate()?;
        self.governance.validate()
    }
}

/// Identity registry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum agent name length
    pub max_name_len: usize,
    /// Maximum description length
    pub max_description_len: usize,
    /// Maximum framework name length
    pub max_framework_len: usize,
    /// Maximum version string length
    pub max_version_len: usize,
    /// Accepted frameworks; empty accepts any
    pub allowed_frameworks: Vec<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_name_len: 64,
            max_description_len: 512,
            max_framework_len: 32,
            max_version_len: 16,
            allowed_frameworks: Vec::new(),
        }
    }
}

impl RegistryConfig {
    fn validate(&self) -> Result<()> {
        if self.max_name_len == 0 {
            return Err(KarmaError::invalid_config(
                "registry.max_name_len",
                self.max_name_len,
            ));
        }
        if self.max_framework_len == 0 {
            return Err(KarmaError::invalid_config(
                "registry.max_framework_len",
                self.max_framework_len,
            ));
        }
        Ok(())
    }
}

/// Interaction ledger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Maximum participants per interaction
    pub max_participants: usize,
    /// Idempotence bucket width (seconds)
    pub time_bucket_secs: u64,
    /// Accepted interaction types; empty accepts any
    pub allowed_types: Vec<String>,
    /// Maximum length of each free-form metadata string
    pub max_metadata_field_len: usize,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            max_participants: 10,
            time_bucket_secs: 300, // 5 minutes
            allowed_types: [
                "conversation",
                "task",
                "collaboration",
                "transaction",
                "negotiation",
                "information_exchange",
                "service_request",
                "feedback",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_metadata_field_len: 1024,
        }
    }
}

impl InteractionConfig {
    fn validate(&self) -> Result<()> {
        if self.max_participants < 2 {
            return Err(KarmaError::invalid_config(
                "interactions.max_participants",
                self.max_participants,
            ));
        }
        if self.time_bucket_secs == 0 {
            return Err(KarmaError::invalid_config(
                "interactions.time_bucket_secs",
                self.time_bucket_secs,
            ));
        }
        Ok(())
    }
}

/// Rating acceptance configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// How long after an interaction it may be rated (seconds); `None` disables
    pub rating_window_secs: Option<u64>,
    /// Maximum feedback length
    pub max_feedback_len: usize,
    /// Number of recent ratings used for the trend
    pub recent_window: usize,
    /// Ratings one rater may submit per rate-limit window; `None` disables
    pub max_ratings_per_window: Option<u32>,
    /// Length of the rate-limit window (seconds)
    pub rate_limit_window_secs: u64,
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            rating_window_secs: Some(DAY_SECS),
            max_feedback_len: 1000,
            recent_window: 10,
            max_ratings_per_window: Some(10),
            rate_limit_window_secs: 3600, // 1 hour
        }
    }
}

impl RatingConfig {
    fn validate(&self) -> Result<()> {
        if self.recent_window == 0 {
            return Err(KarmaError::invalid_config(
                "ratings.recent_window",
                self.recent_window,
            ));
        }
        if self.max_ratings_per_window == Some(0) {
            return Err(KarmaError::invalid_config(
                "ratings.max_ratings_per_window",
                0,
            ));
        }
        if self.rate_limit_window_secs == 0 || self.rate_limit_window_secs > MAX_DELAY_SECS {
            return Err(KarmaError::invalid_config(
                "ratings.rate_limit_window_secs",
                self.rate_limit_window_secs,
            ));
        }
        Ok(())
    }
}

/// Karma formula configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KarmaConfig {
    /// Karma of a freshly registered agent
    pub base_score: f64,
    /// Neutral rating score
    pub midpoint: f64,
    /// Decay time constant (seconds)
    pub decay_constant_secs: u64,
    /// Bonus per logged interaction
    pub interaction_bonus: f64,
    /// Interactions counted toward the bonus
    pub interaction_bonus_cap: u64,
    /// Scale rating terms by the rater's karma
    pub reputation_weighting: bool,
    /// Rater karma that yields weight 1.0
    pub weight_reference: f64,
    /// Lower clamp on rating weight
    pub min_rating_weight: f64,
    /// Upper clamp on rating weight
    pub max_rating_weight: f64,
    /// Karma ceiling
    pub max_score: f64,
    /// Additive modifier per rating context key
    pub contextual_modifiers: BTreeMap<String, f64>,
}

impl Default for KarmaConfig {
    fn default() -> Self {
        Self {
            base_score: 50.0,
            midpoint: 5.5,
            decay_constant_secs: 30 * DAY_SECS,
            interaction_bonus: 1.0,
            interaction_bonus_cap: 50,
            reputation_weighting: true,
            weight_reference: 50.0,
            min_rating_weight: 0.5,
            max_rating_weight: 2.0,
            max_score: 10_000.0,
            contextual_modifiers: BTreeMap::new(),
        }
    }
}

impl KarmaConfig {
    fn validate(&self) -> Result<()> {
        if !self.max_score.is_finite() || self.max_score <= 0.0 {
            return Err(KarmaError::invalid_config("karma.max_score", self.max_score));
        }
        if !self.base_score.is_finite() || self.base_score < 0.0 || self.base_score > self.max_score
        {
            return Err(KarmaError::invalid_config(
                "karma.base_score",
                self.base_score,
            ));
        }
        if !(1.0..=10.0).contains(&self.midpoint) {
            return Err(KarmaError::invalid_config("karma.midpoint", self.midpoint));
        }
        if self.decay_constant_secs == 0 {
            return Err(KarmaError::invalid_config(
                "karma.decay_constant_secs",
                self.decay_constant_secs,
            ));
        }
        if !self.interaction_bonus.is_finite() || self.interaction_bonus < 0.0 {
            return Err(KarmaError::invalid_config(
                "karma.interaction_bonus",
                self.interaction_bonus,
            ));
        }
        if !self.weight_reference.is_finite() || self.weight_reference <= 0.0 {
            return Err(KarmaError::invalid_config(
                "karma.weight_reference",
                self.weight_reference,
            ));
        }
        if !self.min_rating_weight.is_finite() || self.min_rating_weight < 0.0 {
            return Err(KarmaError::invalid_config(
                "karma.min_rating_weight",
                self.min_rating_weight,
            ));
        }
        if !self.max_rating_weight.is_finite() || self.max_rating_weight < self.min_rating_weight {
            return Err(KarmaError::invalid_config(
                "karma.max_rating_weight",
                self.max_rating_weight,
            ));
        }
        if let Some((key, value)) = self
            .contextual_modifiers
            .iter()
            .find(|(_, value)| !value.is_finite())
        {
            return Err(KarmaError::invalid_config(
                &format!("karma.contextual_modifiers.{key}"),
                value,
            ));
        }
        Ok(())
    }
}

/// Mapping from karma to voting power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum VotingPowerCurve {
    /// Power equals karma
    #[default]
    Linear,
    /// Power is the square root of karma
    SquareRoot,
}

impl VotingPowerCurve {
    /// Voting power for the given karma.
    pub fn power(&self, karma: f64) -> f64 {
        let karma = karma.max(0.0);
        match self {
            Self::Linear => karma,
            Self::SquareRoot => karma.sqrt(),
        }
    }
}

/// Governance configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    /// Karma required to create a proposal
    pub min_karma_for_proposal: f64,
    /// Karma required to vote
    pub min_karma_for_voting: f64,
    /// Fraction of the quorum base that must vote (0.0 - 1.0)
    pub quorum_fraction: f64,
    /// Fraction of cast weight as no_with_veto that rejects (0.0 - 1.0)
    pub veto_threshold: f64,
    /// Delay between creation and voting start (seconds)
    pub voting_delay_secs: u64,
    /// Length of the voting period (seconds)
    pub voting_period_secs: u64,
    /// Shortest allowed voting period (seconds)
    pub min_voting_period_secs: u64,
    /// Longest allowed voting period (seconds)
    pub max_voting_period_secs: u64,
    /// Delay between voting end and execution (seconds)
    pub execution_delay_secs: u64,
    /// Karma to voting power mapping
    pub voting_power: VotingPowerCurve,
    /// Maximum proposal title length
    pub max_title_len: usize,
    /// Maximum proposal description length
    pub max_description_len: usize,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            min_karma_for_proposal: 50.0,
            min_karma_for_voting: 0.0,
            quorum_fraction: 0.2,
            veto_threshold: 0.334,
            voting_delay_secs: 0,
            voting_period_secs: 3 * DAY_SECS,
            min_voting_period_secs: 3600, // 1 hour
            max_voting_period_secs: 7 * DAY_SECS,
            execution_delay_secs: 0,
            voting_power: VotingPowerCurve::Linear,
            max_title_len: 128,
            max_description_len: 4096,
        }
    }
}

impl GovernanceConfig {
    fn validate(&self) -> Result<()> {
        if !self.min_karma_for_proposal.is_finite() || self.min_karma_for_proposal < 0.0 {
            return Err(KarmaError::invalid_config(
                "governance.min_karma_for_proposal",
                self.min_karma_for_proposal,
            ));
        }
        if !self.min_karma_for_voting.is_finite() || self.min_karma_for_voting < 0.0 {
            return Err(KarmaError::invalid_config(
                "governance.min_karma_for_voting",
                self.min_karma_for_voting,
            ));
        }
        if !(0.0..=1.0).contains(&self.quorum_fraction) {
            return Err(KarmaError::invalid_config(
                "governance.quorum_fraction",
                self.quorum_fraction,
            ));
        }
        if !(0.0..=1.0).contains(&self.veto_threshold) || self.veto_threshold == 0.0 {
            return Err(KarmaError::invalid_config(
                "governance.veto_threshold",
                self.veto_threshold,
            ));
        }
        if self.min_voting_period_secs > self.max_voting_period_secs {
            return Err(KarmaError::invalid_config(
                "governance.min_voting_period_secs",
                self.min_voting_period_secs,
            ));
        }
        if !(self.min_voting_period_secs..=self.max_voting_period_secs)
            .contains(&self.voting_period_secs)
        {
            return Err(KarmaError::invalid_config(
                "governance.voting_period_secs",
                self.voting_period_secs,
            ));
        }
        if self.max_voting_period_secs > MAX_DELAY_SECS {
            return Err(KarmaError::invalid_config(
                "governance.max_voting_period_secs",
                self.max_voting_period_secs,
            ));
        }
        if self.voting_delay_secs > MAX_DELAY_SECS {
            return Err(KarmaError::invalid_config(
                "governance.voting_delay_secs",
                self.voting_delay_secs,
            ));
        }
        if self.execution_delay_secs > MAX_DELAY_SECS {
            return Err(KarmaError::invalid_config(
                "governance.execution_delay_secs",
                self.execution_delay_secs,
            ));
        }
        Ok(())
    }
}

/// A single typed change to the karma or rating configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case", tag = "parameter", content = "value")]
pub enum KarmaParameter {
    BaseScore(f64),
    DecayConstantSecs(u64),
    InteractionBonus(f64),
    InteractionBonusCap(u64),
    ReputationWeighting(bool),
    WeightReference(f64),
    MinRatingWeight(f64),
    MaxRatingWeight(f64),
    MaxScore(f64),
    /// Set the additive modifier for a rating context
    ContextualModifier { context: String, modifier: f64 },
    /// Remove the modifier for a rating context
    RemoveContextualModifier { context: String },
    RatingWindowSecs(Option<u64>),
    RecentWindow(usize),
    MaxRatingsPerWindow(Option<u32>),
    RateLimitWindowSecs(u64),
}

impl KarmaParameter {
    /// Apply to the configuration. Callers re-validate afterwards.
    pub fn apply(&self, config: &mut EngineConfig) {
        let karma = &mut config.karma;
        match self {
            Self::BaseScore(v) => karma.base_score = *v,
            Self::DecayConstantSecs(v) => karma.decay_constant_secs = *v,
            Self::InteractionBonus(v) => karma.interaction_bonus = *v,
            Self::InteractionBonusCap(v) => karma.interaction_bonus_cap = *v,
            Self::ReputationWeighting(v) => karma.reputation_weighting = *v,
            Self::WeightReference(v) => karma.weight_reference = *v,
            Self::MinRatingWeight(v) => karma.min_rating_weight = *v,
            Self::MaxRatingWeight(v) => karma.max_rating_weight = *v,
            Self::MaxScore(v) => karma.max_score = *v,
            Self::ContextualModifier { context, modifier } => {
                karma.contextual_modifiers.insert(context.clone(), *modifier);
            }
            Self::RemoveContextualModifier { context } => {
                karma.contextual_modifiers.remove(context);
            }
            Self::RatingWindowSecs(v) => config.ratings.rating_window_secs = *v,
            Self::RecentWindow(v) => config.ratings.recent_window = *v,
            Self::MaxRatingsPerWindow(v) => config.ratings.max_ratings_per_window = *v,
            Self::RateLimitWindowSecs(v) => config.ratings.rate_limit_window_secs = *v,
        }
    }
}

/// Typed changes to governance parameters. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(default)]
pub struct GovernanceUpdate {
    pub min_karma_for_proposal: Option<f64>,
    pub min_karma_for_voting: Option<f64>,
    pub quorum_fraction: Option<f64>,
    pub veto_threshold: Option<f64>,
    pub voting_delay_secs: Option<u64>,
    pub voting_period_secs: Option<u64>,
    pub execution_delay_secs: Option<u64>,
    pub voting_power: Option<VotingPowerCurve>,
}

impl GovernanceUpdate {
    /// True when the update changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply to the configuration. Callers re-validate afterwards.
    pub fn apply(&self, config: &mut GovernanceConfig) {
        if let Some(v) = self.min_karma_for_proposal {
            config.min_karma_for_proposal = v;
        }
        if let Some(v) = self.min_karma_for_voting {
            config.min_karma_for_voting = v;
        }
        if let Some(v) = self.quorum_fraction {
            config.quorum_fraction = v;
        }
        if let Some(v) = self.veto_threshold {
            config.veto_threshold = v;
        }
        if let Some(v) = self.voting_delay_secs {
            config.voting_delay_secs = v;
        }
        if let Some(v) = self.voting_period_secs {
            config.voting_period_secs = v;
        }
        if let Some(v) = self.execution_delay_secs {
            config.execution_delay_secs = v;
        }
        if let Some(v) = self.voting_power {
            config.voting_power = v;
        }
    }
}
