//! Content-derived identifiers.
//!
//! Identifiers are hex SHA-256 digests over a canonical encoding, so a
//! retried submission of identical content lands on the same id.

use crate::types::{Address, InteractionMetadata, Timestamp};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Compute SHA256 hash of content.
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Hash the canonical JSON form of a value.
pub fn hash_json<T: Serialize>(value: &T) -> String {
    let json = serde_json::to_string(value).unwrap_or_default();
    compute_hash(json.as_bytes())
}

/// Idempotence bucket a timestamp falls into.
pub fn time_bucket(timestamp: Timestamp, bucket_secs: u64) -> i64 {
    let width = i64::try_from(bucket_secs.max(1)).unwrap_or(i64::MAX);
    timestamp.timestamp().div_euclid(width)
}

/// Identifier of an interaction. `participants` must already be sorted.
pub fn interaction_id(
    participants: &[Address],
    interaction_type: &str,
    metadata: &InteractionMetadata,
    bucket: i64,
) -> String {
    let mut hasher = Sha256::new();
    for participant in participants {
        hasher.update(participant.as_str().as_bytes());
        hasher.update([0u8]);
    }
    hasher.update([1u8]);
    hasher.update(interaction_type.as_bytes());
    hasher.update([0u8]);
    hasher.update(serde_json::to_string(metadata).unwrap_or_default().as_bytes());
    hasher.update(bucket.to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Identifier of a rating; one per (rater, rated, interaction).
pub fn rating_id(rater: &Address, rated: &Address, interaction_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rater.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(rated.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(interaction_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Audit hash recorded with each karma snapshot.
pub fn calculation_hash(address: &Address, timestamp: Timestamp, score: f64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(address.as_str().as_bytes());
    hasher.update(timestamp.timestamp().to_be_bytes());
    hasher.update(score.to_bits().to_be_bytes());
    hex::encode(hasher.finalize())
}

/// Whether a string looks like a hex SHA-256 digest.
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;

    fn ts(secs: i64) -> Timestamp {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_time_bucket() {
        assert_eq!(time_bucket(ts(0), 300), 0);
        assert_eq!(time_bucket(ts(299), 300), 0);
        assert_eq!(time_bucket(ts(300), 300), 1);
        assert_eq!(time_bucket(ts(-1), 300), -1);
    }

    #[test]
    fn test_interaction_id_depends_on_bucket() {
        let participants = vec![Address::new("a"), Address::new("b")];
        let metadata = InteractionMetadata::default();
        let first = interaction_id(&participants, "task", &metadata, 7);
        let again = interaction_id(&participants, "task", &metadata, 7);
        let later = interaction_id(&participants, "task", &metadata, 8);
        assert_eq!(first, again);
        assert_ne!(first, later);
        assert!(is_sha256_hex(&first));
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        let a = rating_id(&Address::new("ab"), &Address::new("c"), "i");
        let b = rating_id(&Address::new("a"), &Address::new("bc"), "i");
        assert_ne!(a, b);
    }
}
