//! Identity registry.
//!
//! Owns the set of registered agents. Every other component refers to an
//! agent by address and asks the registry for existence and standing.

use crate::config::RegistryConfig;
use crate::error::{KarmaError, Result};
use crate::hashing::hash_json;
use crate::types::{Address, Agent, AgentMetadata, AgentStatus, MetadataPatch, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Result of a registration upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOutcome {
    pub address: Address,
    /// False when an existing registration was updated
    pub created: bool,
    pub metadata_hash: String,
}

/// Registered agent identities keyed by address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityRegistry {
    agents: BTreeMap<Address, Agent>,
    next_seq: u64,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or re-register an agent. Only the address itself may register.
    pub fn register(
        &mut self,
        config: &RegistryConfig,
        caller: &Address,
        address: &Address,
        metadata: AgentMetadata,
        now: Timestamp,
    ) -> Result<RegistrationOutcome> {
        if caller != address {
            return Err(KarmaError::Unauthorized {
                caller: caller.clone(),
                action: format!("register {address}"),
            });
        }
        validate_metadata(config, &metadata)?;
        let metadata_hash = hash_json(&metadata);

        if let Some(agent) = self.agents.get_mut(address) {
            agent.metadata = metadata;
            agent.updated_at = now;
            return Ok(RegistrationOutcome {
                address: address.clone(),
                created: false,
                metadata_hash,
            });
        }

        let agent = Agent {
            address: address.clone(),
            metadata,
            registered_at: now,
            registration_seq: self.next_seq,
            status: AgentStatus::Active,
            updated_at: now,
        };
        self.next_seq += 1;
        self.agents.insert(address.clone(), agent);
        debug!(address = %address, seq = self.next_seq - 1, "Agent registered");

        Ok(RegistrationOutcome {
            address: address.clone(),
            created: true,
            metadata_hash,
        })
    }

    /// Apply a partial metadata update and return the new metadata hash.
    pub fn update_metadata(
        &mut self,
        config: &RegistryConfig,
        caller: &Address,
        address: &Address,
        patch: &MetadataPatch,
        now: Timestamp,
    ) -> Result<String> {
        let agent = self
            .agents
            .get_mut(address)
            .ok_or_else(|| KarmaError::NotRegistered {
                address: address.clone(),
            })?;
        if caller != address {
            return Err(KarmaError::Unauthorized {
                caller: caller.clone(),
                action: format!("update metadata of {address}"),
            });
        }

        let mut next = agent.metadata.clone();
        next.apply(patch);
        validate_metadata(config, &next)?;

        let metadata_hash = hash_json(&next);
        agent.metadata = next;
        agent.updated_at = now;
        Ok(metadata_hash)
    }

    pub fn get(&self, address: &Address) -> Result<&Agent> {
        self.agents
            .get(address)
            .ok_or_else(|| KarmaError::NotRegistered {
                address: address.clone(),
            })
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.agents.contains_key(address)
    }

    /// Registered and not suspended.
    pub fn require_active(&self, address: &Address) -> Result<&Agent> {
        let agent = self.get(address)?;
        if !agent.status.is_active() {
            return Err(KarmaError::AgentSuspended {
                address: address.clone(),
            });
        }
        Ok(agent)
    }

    /// Suspend an agent on behalf of an executed proposal.
    pub fn suspend(
        &mut self,
        address: &Address,
        proposal_id: u64,
        reason: &str,
        now: Timestamp,
    ) -> Result<()> {
        let agent = self
            .agents
            .get_mut(address)
            .ok_or_else(|| KarmaError::NotRegistered {
                address: address.clone(),
            })?;
        agent.status = AgentStatus::Suspended {
            proposal_id,
            reason: reason.to_string(),
            since: now,
        };
        agent.updated_at = now;
        Ok(())
    }

    /// All agents in address order.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Check metadata against the registry limits.
pub fn validate_metadata(config: &RegistryConfig, metadata: &AgentMetadata) -> Result<()> {
    check_len("name", &metadata.name, 1, config.max_name_len)?;
    check_len("description", &metadata.description, 0, config.max_description_len)?;
    check_len("framework", &metadata.framework, 1, config.max_framework_len)?;

    if !config.allowed_frameworks.is_empty()
        && !config
            .allowed_frameworks
            .iter()
            .any(|f| f.eq_ignore_ascii_case(&metadata.framework))
    {
        return Err(KarmaError::InvalidMetadata {
            reason: format!(
                "framework '{}' not in [{}]",
                metadata.framework,
                config.allowed_frameworks.join(", ")
            ),
        });
    }

    if let Some(version) = &metadata.version {
        check_len("version", version, 1, config.max_version_len)?;
    }
    if let Some(capabilities) = &metadata.capabilities {
        if capabilities.iter().any(|c| c.trim().is_empty()) {
            return Err(KarmaError::InvalidMetadata {
                reason: "capabilities must not contain empty entries".to_string(),
            });
        }
    }
    if let Some(content_hash) = &metadata.content_hash {
        if content_hash.trim().is_empty() {
            return Err(KarmaError::InvalidMetadata {
                reason: "contentHash must not be empty".to_string(),
            });
        }
    }
    Ok(())
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<()> {
    let len = value.trim().chars().count();
    if len < min || len > max {
        return Err(KarmaError::InvalidMetadata {
            reason: format!("{field} must be {min}-{max} characters, got {len}"),
        });
    }
    Ok(())
}
