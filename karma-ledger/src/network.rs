//! Network configuration for the transport boundary.
//!
//! Addressing is opaque to the engine: nothing here is interpreted by
//! ledger logic, it is only handed to transports.

use serde::{Deserialize, Serialize};

use crate::transport::RetryPolicy;

/// Deployed contract addresses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContractAddresses {
    pub agent_registry: String,
    pub karma_core: String,
    pub interaction_logger: String,
    pub governance_dao: String,
}

impl ContractAddresses {
    /// Whether every address has been set.
    pub fn is_complete(&self) -> bool {
        [
            &self.agent_registry,
            &self.karma_core,
            &self.interaction_logger,
            &self.governance_dao,
        ]
        .iter()
        .all(|a| !a.trim().is_empty())
    }
}

/// Where and how to reach the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkConfig {
    pub rpc_endpoint: String,
    pub chain_id: String,
    pub contract_addresses: ContractAddresses,
    pub retry: RetryPolicy,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_endpoint: "http://localhost:26657".to_string(),
            chain_id: "karma-local".to_string(),
            contract_addresses: ContractAddresses::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl NetworkConfig {
    /// Create config from environment variables.
    ///
    /// Unset or unparseable variables keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("KARMA_RPC_ENDPOINT") {
            config.rpc_endpoint = val;
        }
        if let Some(val) = lookup("KARMA_CHAIN_ID") {
            config.chain_id = val;
        }

        let addresses = &mut config.contract_addresses;
        if let Some(val) = lookup("KARMA_AGENT_REGISTRY") {
            addresses.agent_registry = val;
        }
        if let Some(val) = lookup("KARMA_CORE") {
            addresses.karma_core = val;
        }
        if let Some(val) = lookup("KARMA_INTERACTION_LOGGER") {
            addresses.interaction_logger = val;
        }
        if let Some(val) = lookup("KARMA_GOVERNANCE_DAO") {
            addresses.governance_dao = val;
        }

        let retry = &mut config.retry;
        if let Some(n) = lookup("KARMA_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            retry.max_retries = n;
        }
        if let Some(ms) = lookup("KARMA_BASE_DELAY_MS").and_then(|v| v.parse().ok()) {
            retry.base_delay_ms = ms;
        }
        if let Some(ms) = lookup("KARMA_MAX_DELAY_MS").and_then(|v| v.parse().ok()) {
            retry.max_delay_ms = ms;
        }
        if let Some(m) = lookup("KARMA_BACKOFF_MULTIPLIER")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|m| m.is_finite() && *m >= 1.0)
        {
            retry.backoff_multiplier = m;
        }

        config
    }

    /// Load configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
