//! Core domain types shared by every component of the ledger.
//!
//! With the `typescript` feature enabled, the wire-facing types can be
//! exported to TypeScript using ts-rs for the thin client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Ledger timestamp. Every write is stamped by the authoritative log.
pub type Timestamp = DateTime<Utc>;

/// An authenticated agent identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wrap a raw address string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Borrow the raw address.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Descriptive metadata attached to an agent identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AgentMetadata {
    /// Display name
    pub name: String,
    /// What the agent does
    pub description: String,
    /// Agent framework (ElizaOS, MCP, AIDN, Custom, ...)
    pub framework: String,
    /// Agent version
    #[serde(default)]
    pub version: Option<String>,
    /// Advertised capabilities
    #[serde(default)]
    pub capabilities: Option<Vec<String>>,
    /// Hash of extended off-ledger metadata (e.g. IPFS)
    #[serde(default)]
    pub content_hash: Option<String>,
}

impl AgentMetadata {
    /// Create metadata with the required fields.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        framework: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            framework: framework.into(),
            version: None,
            capabilities: None,
            content_hash: None,
        }
    }

    /// Builder: set version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Builder: set capabilities.
    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Apply a partial update, leaving unspecified fields untouched.
    pub fn apply(&mut self, patch: &MetadataPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(framework) = &patch.framework {
            self.framework = framework.clone();
        }
        if let Some(version) = &patch.version {
            self.version = Some(version.clone());
        }
        if let Some(capabilities) = &patch.capabilities {
            self.capabilities = Some(capabilities.clone());
        }
        if let Some(content_hash) = &patch.content_hash {
            self.content_hash = Some(content_hash.clone());
        }
    }
}

/// Partial metadata update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct MetadataPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub framework: Option<String>,
    pub version: Option<String>,
    pub capabilities: Option<Vec<String>>,
    pub content_hash: Option<String>,
}

impl MetadataPatch {
    /// True when the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.framework.is_none()
            && self.version.is_none()
            && self.capabilities.is_none()
            && self.content_hash.is_none()
    }
}

/// Standing of a registered agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum AgentStatus {
    /// Full participation
    Active,
    /// Suspended by an executed governance proposal
    Suspended {
        proposal_id: u64,
        reason: String,
        since: Timestamp,
    },
}

impl AgentStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// A registered agent identity, owned by the identity registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub address: Address,
    pub metadata: AgentMetadata,
    pub registered_at: Timestamp,
    /// Position in registration order, breaks same-timestamp ties
    pub registration_seq: u64,
    pub status: AgentStatus,
    pub updated_at: Timestamp,
}

/// Read projection of an agent with its current karma.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    #[serde(flatten)]
    pub agent: Agent,
    pub karma_score: f64,
}

/// Free-form details recorded with an interaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct InteractionMetadata {
    /// Duration in seconds
    #[serde(default)]
    pub duration: Option<u64>,
    /// Outcome summary
    #[serde(default)]
    pub outcome: Option<String>,
    /// Context or additional information
    #[serde(default)]
    pub context: Option<String>,
}

/// A recorded interaction between two or more agents. Immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    /// Content-derived identifier (hex SHA-256)
    pub id: String,
    /// Participants, sorted
    pub participants: Vec<Address>,
    pub interaction_type: String,
    pub timestamp: Timestamp,
    /// Idempotence bucket the id was derived from
    pub time_bucket: i64,
    /// Hash of the canonical metadata
    pub content_hash: String,
    pub metadata: InteractionMetadata,
}

impl Interaction {
    /// Whether the address took part in this interaction.
    pub fn involves(&self, address: &Address) -> bool {
        self.participants.binary_search(address).is_ok()
    }
}

/// A 1-10 rating tied to a shared interaction. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    /// Content-derived identifier over (rater, rated, interaction)
    pub id: String,
    pub rater: Address,
    pub rated: Address,
    pub score: u8,
    pub interaction_id: String,
    pub timestamp: Timestamp,
    pub feedback: Option<String>,
    /// Context key looked up in the contextual modifier table
    pub context: Option<String>,
    /// Reputation weight of the rater, frozen at submission
    pub rater_weight: f64,
}
