//! Hash computation and chain verification.

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::record::{AuditRecord, GENESIS_HASH};

/// Verification failure, pointing at the first bad record.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("broken link at seq {seq}: expected prev_hash '{expected}', got '{actual}'")]
    BrokenLink {
        seq: u64,
        expected: String,
        actual: String,
    },

    #[error("invalid hash at seq {seq}: expected '{expected}', got '{actual}'")]
    InvalidHash {
        seq: u64,
        expected: String,
        actual: String,
    },

    #[error("invalid sequence: expected {expected}, got {actual}")]
    InvalidSequence { expected: u64, actual: u64 },
}

impl ChainError {
    /// Sequence number of the record where verification failed.
    pub fn seq(&self) -> u64 {
        match self {
            Self::BrokenLink { seq, .. } | Self::InvalidHash { seq, .. } => *seq,
            Self::InvalidSequence { actual, .. } => *actual,
        }
    }
}

/// Canonical serialization of a record's content, excluding `hash` and
/// `prev_hash`.
///
/// serde_json's map is BTreeMap-backed, so key order is stable regardless of
/// how the payload was assembled.
fn canonical(record: &AuditRecord) -> String {
    serde_json::json!({
        "actor": record.actor,
        "entity_id": record.entity_id,
        "entity_type": record.entity_type,
        "event_type": record.event_type,
        "org_id": record.org_id,
        "payload": record.payload,
        "recorded_at": record.recorded_at,
        "seq": record.seq,
    })
    .to_string()
}

/// SHA-256 over the previous hash concatenated with the canonical content.
pub fn chain_hash(prev_hash: &str, record: &AuditRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(canonical(record).as_bytes());
    hex::encode(hasher.finalize())
}

/// Recompute every hash from the genesis record and confirm the stored chain.
///
/// A failure is fatal to the chain and is surfaced, never auto-repaired.
pub fn verify_chain(records: &[AuditRecord]) -> Result<(), ChainError> {
    let mut prev_hash = GENESIS_HASH.to_string();
    let mut expected_seq = 1u64;

    for record in records {
        if record.seq != expected_seq {
            return Err(ChainError::InvalidSequence {
                expected: expected_seq,
                actual: record.seq,
            });
        }
        if record.prev_hash != prev_hash {
            return Err(ChainError::BrokenLink {
                seq: record.seq,
                expected: prev_hash,
                actual: record.prev_hash.clone(),
            });
        }
        let computed = chain_hash(&record.prev_hash, record);
        if record.hash != computed {
            return Err(ChainError::InvalidHash {
                seq: record.seq,
                expected: computed,
                actual: record.hash.clone(),
            });
        }
        prev_hash = record.hash.clone();
        expected_seq += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::NewAuditRecord;
    use chrono::Utc;
    use serde_json::json;
    use tally_core::{ActorId, OrgId};

    fn record(tail: Option<&AuditRecord>, org: OrgId, event: &str) -> AuditRecord {
        AuditRecord::chained(
            org,
            tail,
            NewAuditRecord::new(
                "journal_entry",
                "e-1",
                event,
                json!({"reference": "INV-001"}),
                ActorId::new(),
            ),
            Utc::now(),
        )
    }

    #[test]
    fn hash_is_deterministic() {
        let org = OrgId::new();
        let r = record(None, org, "posted");
        assert_eq!(chain_hash(&r.prev_hash, &r), r.hash);
    }

    #[test]
    fn valid_chain_verifies() {
        let org = OrgId::new();
        let a = record(None, org, "posted");
        let b = record(Some(&a), org, "reversed");
        let c = record(Some(&b), org, "posted");
        assert_eq!(a.prev_hash, GENESIS_HASH);
        assert!(verify_chain(&[a, b, c]).is_ok());
    }

    #[test]
    fn payload_tampering_is_detected_at_the_mutated_record() {
        let org = OrgId::new();
        let a = record(None, org, "posted");
        let mut b = record(Some(&a), org, "reversed");
        b.payload = json!({"reference": "INV-999"});

        let err = verify_chain(&[a, b]).unwrap_err();
        assert!(matches!(err, ChainError::InvalidHash { seq: 2, .. }));
        assert_eq!(err.seq(), 2);
    }

    #[test]
    fn relinking_is_detected() {
        let org = OrgId::new();
        let a = record(None, org, "posted");
        let b = record(Some(&a), org, "reversed");
        // Drop the middle record: c claims to follow a.
        let c = record(Some(&a), org, "posted");
        let mut c = c;
        c.seq = 3;
        c.hash = chain_hash(&c.prev_hash, &c);

        let err = verify_chain(&[a, b, c]).unwrap_err();
        assert!(matches!(err, ChainError::BrokenLink { seq: 3, .. }));
    }

    #[test]
    fn sequence_gaps_are_detected() {
        let org = OrgId::new();
        let a = record(None, org, "posted");
        let mut b = record(Some(&a), org, "posted");
        b.seq = 5;
        b.hash = chain_hash(&b.prev_hash, &b);

        let err = verify_chain(&[a, b]).unwrap_err();
        assert!(matches!(err, ChainError::InvalidSequence { expected: 2, actual: 5 }));
    }
}
