//! Interaction ledger.
//!
//! Interactions are the only valid basis for a rating. Their identifiers
//! are derived from content and time bucket, which makes logging
//! idempotent under transport retries.

use crate::config::InteractionConfig;
use crate::error::{KarmaError, Result};
use crate::hashing::{hash_json, interaction_id, time_bucket};
use crate::registry::IdentityRegistry;
use crate::types::{Address, Interaction, InteractionMetadata, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Result of logging an interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct LogOutcome {
    pub id: String,
    /// False when identical content was already logged in this bucket
    pub created: bool,
}

/// Recorded interactions with a per-agent index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InteractionLedger {
    interactions: BTreeMap<String, Interaction>,
    /// Interaction ids per agent in commit order
    by_agent: BTreeMap<Address, Vec<String>>,
}

impl InteractionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an interaction, or return the existing id for identical
    /// content in the same time bucket.
    #[allow(clippy::too_many_arguments)]
    pub fn log(
        &mut self,
        config: &InteractionConfig,
        registry: &IdentityRegistry,
        caller: &Address,
        participants: Vec<Address>,
        interaction_type: &str,
        metadata: InteractionMetadata,
        now: Timestamp,
    ) -> Result<LogOutcome> {
        let participants = validate_participants(config, registry, caller, participants)?;
        validate_content(config, interaction_type, &metadata)?;

        let bucket = time_bucket(now, config.time_bucket_secs);
        let id = interaction_id(&participants, interaction_type, &metadata, bucket);
        if self.interactions.contains_key(&id) {
            return Ok(LogOutcome { id, created: false });
        }

        for participant in &participants {
            self.by_agent
                .entry(participant.clone())
                .or_default()
                .push(id.clone());
        }
        let interaction = Interaction {
            id: id.clone(),
            participants,
            interaction_type: interaction_type.to_string(),
            timestamp: now,
            time_bucket: bucket,
            content_hash: hash_json(&metadata),
            metadata,
        };
        self.interactions.insert(id.clone(), interaction);

        Ok(LogOutcome { id, created: true })
    }

    pub fn get(&self, id: &str) -> Result<&Interaction> {
        self.interactions
            .get(id)
            .ok_or_else(|| KarmaError::InteractionNotFound {
                interaction_id: id.to_string(),
            })
    }

    /// Interactions involving `agent`, oldest first.
    pub fn history_for(&self, agent: &Address) -> Vec<&Interaction> {
        self.by_agent
            .get(agent)
            .into_iter()
            .flatten()
            .filter_map(|id| self.interactions.get(id))
            .collect()
    }

    /// Interactions involving both agents, oldest first.
    pub fn between(&self, a: &Address, b: &Address) -> Vec<&Interaction> {
        self.history_for(a)
            .into_iter()
            .filter(|interaction| interaction.involves(b))
            .collect()
    }

    pub fn count_for(&self, agent: &Address) -> u64 {
        self.by_agent.get(agent).map_or(0, |ids| ids.len() as u64)
    }

    /// Recompute the content-derived id and hash from stored fields.
    pub fn verify(&self, id: &str) -> Result<bool> {
        let interaction = self.get(id)?;
        let expected_id = interaction_id(
            &interaction.participants,
            &interaction.interaction_type,
            &interaction.metadata,
            interaction.time_bucket,
        );
        Ok(expected_id == interaction.id
            && hash_json(&interaction.metadata) == interaction.content_hash)
    }

    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }
}

/// Check the participant set and return it sorted.
fn validate_participants(
    config: &InteractionConfig,
    registry: &IdentityRegistry,
    caller: &Address,
    participants: Vec<Address>,
) -> Result<Vec<Address>> {
    if participants.len() < 2 {
        return Err(KarmaError::InvalidParticipants {
            reason: format!("at least 2 participants required, got {}", participants.len()),
        });
    }
    if participants.len() > config.max_participants {
        return Err(KarmaError::InvalidParticipants {
            reason: format!(
                "at most {} participants allowed, got {}",
                config.max_participants,
                participants.len()
            ),
        });
    }

    let unique: BTreeSet<Address> = participants.iter().cloned().collect();
    if unique.len() != participants.len() {
        return Err(KarmaError::InvalidParticipants {
            reason: "duplicate participant".to_string(),
        });
    }
    if let Some(unknown) = unique.iter().find(|p| !registry.is_registered(p)) {
        return Err(KarmaError::InvalidParticipants {
            reason: format!("participant not registered: {unknown}"),
        });
    }
    if !unique.contains(caller) {
        return Err(KarmaError::Unauthorized {
            caller: caller.clone(),
            action: "log an interaction it did not take part in".to_string(),
        });
    }
    for participant in &unique {
        registry.require_active(participant)?;
    }

    Ok(unique.into_iter().collect())
}

fn validate_content(
    config: &InteractionConfig,
    interaction_type: &str,
    metadata: &InteractionMetadata,
) -> Result<()> {
    if interaction_type.trim().is_empty() {
        return Err(KarmaError::InvalidInteraction {
            reason: "interaction type is empty".to_string(),
        });
    }
    if !config.allowed_types.is_empty()
        && !config.allowed_types.iter().any(|t| t == interaction_type)
    {
        return Err(KarmaError::InvalidInteraction {
            reason: format!("unknown interaction type: {interaction_type}"),
        });
    }

    let fields = [
        ("outcome", metadata.outcome.as_deref()),
        ("context", metadata.context.as_deref()),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            if value.chars().count() > config.max_metadata_field_len {
                return Err(KarmaError::InvalidInteraction {
                    reason: format!(
                        "{name} exceeds {} characters",
                        config.max_metadata_field_len
                    ),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;
    use crate::types::AgentMetadata;
    use chrono::{Duration, TimeZone, Utc};

    fn setup(names: &[&str]) -> IdentityRegistry {
        let mut registry = IdentityRegistry::new();
        for name in names {
            let address = Address::new(*name);
            registry
                .register(
                    &RegistryConfig::default(),
                    &address,
                    &address,
                    AgentMetadata::new(*name, "", "MCP"),
                    Utc::now(),
                )
                .unwrap();
        }
        registry
    }

    fn addrs(names: &[&str]) -> Vec<Address> {
        names.iter().map(|n| Address::new(*n)).collect()
    }

    #[test]
    fn test_identical_content_in_bucket_is_idempotent() {
        let registry = setup(&["a", "b"]);
        let config = InteractionConfig::default();
        let mut ledger = InteractionLedger::new();
        let t0 = Utc.timestamp_opt(1_700_000_100, 0).unwrap();

        let first = ledger
            .log(&config, &registry, &Address::new("a"), addrs(&["a", "b"]), "task", InteractionMetadata::default(), t0)
            .unwrap();
        // Participant order does not matter
        let retry = ledger
            .log(&config, &registry, &Address::new("b"), addrs(&["b", "a"]), "task", InteractionMetadata::default(), t0 + Duration::seconds(10))
            .unwrap();

        assert!(first.created);
        assert!(!retry.created);
        assert_eq!(first.id, retry.id);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.count_for(&Address::new("a")), 1);
    }

    #[test]
    fn test_next_bucket_creates_new_interaction() {
        let registry = setup(&["a", "b"]);
        let config = InteractionConfig::default();
        let mut ledger = InteractionLedger::new();
        let t0 = Utc.timestamp_opt(1_700_000_100, 0).unwrap();

        let first = ledger
            .log(&config, &registry, &Address::new("a"), addrs(&["a", "b"]), "task", InteractionMetadata::default(), t0)
            .unwrap();
        let later = ledger
            .log(&config, &registry, &Address::new("a"), addrs(&["a", "b"]), "task", InteractionMetadata::default(), t0 + Duration::seconds(300))
            .unwrap();
        assert_ne!(first.id, later.id);
        assert_eq!(ledger.between(&Address::new("b"), &Address::new("a")).len(), 2);
    }

    #[test]
    fn test_participant_validation() {
        let registry = setup(&["a", "b", "c"]);
        let config = InteractionConfig::default();
        let mut ledger = InteractionLedger::new();
        let a = Address::new("a");
        let now = Utc::now();
        let meta = InteractionMetadata::default;

        let err = ledger.log(&config, &registry, &a, addrs(&["a"]), "task", meta(), now).unwrap_err();
        assert_eq!(err.code(), "INVALID_PARTICIPANTS");

        let err = ledger.log(&config, &registry, &a, addrs(&["a", "a"]), "task", meta(), now).unwrap_err();
        assert_eq!(err.code(), "INVALID_PARTICIPANTS");

        let err = ledger.log(&config, &registry, &a, addrs(&["a", "zed"]), "task", meta(), now).unwrap_err();
        assert_eq!(err.code(), "INVALID_PARTICIPANTS");

        let err = ledger.log(&config, &registry, &a, addrs(&["b", "c"]), "task", meta(), now).unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");

        let err = ledger.log(&config, &registry, &a, addrs(&["a", "b"]), "gossip", meta(), now).unwrap_err();
        assert_eq!(err.code(), "INVALID_INTERACTION");

        assert!(ledger.is_empty());
    }

    #[test]
    fn test_verify_detects_tampering() {
        let registry = setup(&["a", "b"]);
        let config = InteractionConfig::default();
        let mut ledger = InteractionLedger::new();
        let metadata = InteractionMetadata {
            duration: Some(120),
            outcome: Some("shipped".into()),
            context: None,
        };
        let outcome = ledger
            .log(&config, &registry, &Address::new("a"), addrs(&["a", "b"]), "collaboration", metadata, Utc::now())
            .unwrap();
        assert!(ledger.verify(&outcome.id).unwrap());

        if let Some(stored) = ledger.interactions.get_mut(&outcome.id) {
            stored.metadata.outcome = Some("failed".into());
        }
        assert!(!ledger.verify(&outcome.id).unwrap());
        assert_eq!(ledger.verify("missing").unwrap_err().code(), "INTERACTION_NOT_FOUND");
    }
}
