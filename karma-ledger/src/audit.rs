//! Audit trail for ledger writes.
//!
//! Records every submitted envelope and how it was resolved, including
//! rejected writes, which leave no trace in ledger state.

use chrono::{DateTime, Utc};
use karma_core::{Address, Envelope, KarmaError, Receipt, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Maximum entries in the audit log before pruning.
pub const MAX_AUDIT_ENTRIES: usize = 10_000;

/// How a write was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Submitted, not yet resolved
    Pending,
    /// Accepted and committed
    Committed,
    /// Accepted without a state change (idempotent retry)
    Unchanged,
    /// Rejected by validation
    Rejected,
}

/// An entry in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Unique entry ID
    pub entry_id: String,
    pub caller: Address,
    /// Operation name
    pub operation: String,
    /// Request parameters as submitted
    pub request: serde_json::Value,
    /// Envelope timestamp
    pub timestamp: Timestamp,
    pub status: AuditStatus,
    /// Commit sequence (committed writes only)
    pub sequence: Option<u64>,
    /// Number of events emitted
    pub events: usize,
    /// Error code for rejected writes
    pub error_code: Option<String>,
    pub error: Option<String>,
    /// Wall-clock time the service received the write
    pub received_at: DateTime<Utc>,
    /// Wall-clock time the write was resolved
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AuditEntry {
    /// Create a pending entry from an envelope.
    pub fn from_envelope(envelope: &Envelope) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            caller: envelope.caller.clone(),
            operation: envelope.request.name().to_string(),
            request: serde_json::to_value(&envelope.request).unwrap_or_default(),
            timestamp: envelope.timestamp,
            status: AuditStatus::Pending,
            sequence: None,
            events: 0,
            error_code: None,
            error: None,
            received_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Processing duration in ms, once resolved.
    pub fn duration_ms(&self) -> Option<u64> {
        self.resolved_at
            .map(|at| (at - self.received_at).num_milliseconds().max(0) as u64)
    }
}

/// Bounded, newest-first log of ledger writes.
pub struct AuditLog {
    /// Log entries (newest first)
    entries: Arc<RwLock<VecDeque<AuditEntry>>>,
    /// Maximum entries to retain
    max_entries: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_max_entries(MAX_AUDIT_ENTRIES)
    }

    /// Create with custom max entries.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(VecDeque::new())),
            max_entries,
        }
    }

    /// Log a write before it is applied. Returns the entry id.
    pub async fn log_request(&self, envelope: &Envelope) -> String {
        let entry = AuditEntry::from_envelope(envelope);
        let entry_id = entry.entry_id.clone();

        let mut entries = self.entries.write().await;
        entries.push_front(entry);
        while entries.len() > self.max_entries {
            entries.pop_back();
        }

        entry_id
    }

    /// Resolve an entry with the receipt of an accepted write.
    pub async fn log_receipt(&self, entry_id: &str, receipt: &Receipt) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.iter_mut().find(|e| e.entry_id == entry_id) {
            if receipt.committed() {
                entry.status = AuditStatus::Committed;
                entry.sequence = Some(receipt.sequence);
            } else {
                entry.status = AuditStatus::Unchanged;
            }
            entry.events = receipt.events.len();
            entry.resolved_at = Some(Utc::now());
        }
    }

    /// Resolve an entry with a rejection.
    pub async fn log_rejection(&self, entry_id: &str, error: &KarmaError) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.iter_mut().find(|e| e.entry_id == entry_id) {
            entry.status = AuditStatus::Rejected;
            entry.error_code = Some(error.code().to_string());
            entry.error = Some(error.to_string());
            entry.resolved_at = Some(Utc::now());
        }
    }

    /// Get recent entries.
    pub async fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries.iter().take(limit).cloned().collect()
    }

    pub async fn get(&self, entry_id: &str) -> Option<AuditEntry> {
        let entries = self.entries.read().await;
        entries.iter().find(|e| e.entry_id == entry_id).cloned()
    }

    /// Get entries submitted by a caller.
    pub async fn get_by_caller(&self, caller: &Address, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .filter(|e| &e.caller == caller)
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn stats(&self) -> AuditStats {
        let entries = self.entries.read().await;
        let count = |status: AuditStatus| entries.iter().filter(|e| e.status == status).count();

        let mut rejections_by_code = BTreeMap::new();
        for code in entries.iter().filter_map(|e| e.error_code.as_deref()) {
            *rejections_by_code.entry(code.to_string()).or_insert(0) += 1;
        }

        AuditStats {
            total: entries.len(),
            committed: count(AuditStatus::Committed),
            unchanged: count(AuditStatus::Unchanged),
            rejected: count(AuditStatus::Rejected),
            rejections_by_code,
        }
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn count(&self) -> usize {
        self.entries.read().await.len()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics from the audit log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStats {
    pub total: usize,
    pub committed: usize,
    pub unchanged: usize,
    pub rejected: usize,
    /// Rejected writes per error code
    pub rejections_by_code: BTreeMap<String, usize>,
}
