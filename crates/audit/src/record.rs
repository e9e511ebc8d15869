//! Audit record shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use tally_core::{ActorId, OrgId};

use crate::chain::chain_hash;

/// Sentinel previous-hash of the first record in an organization's chain.
pub const GENESIS_HASH: &str = "GENESIS";

/// Content of a record before it is chained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuditRecord {
    pub entity_type: String,
    pub entity_id: String,
    pub event_type: String,
    pub payload: JsonValue,
    pub actor: ActorId,
}

impl NewAuditRecord {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl core::fmt::Display,
        event_type: impl Into<String>,
        payload: JsonValue,
        actor: ActorId,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.to_string(),
            event_type: event_type.into(),
            payload,
            actor,
        }
    }
}

/// One appended, chained audit record.
///
/// Records are never updated or deleted; the storage boundary does not expose
/// either operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub org_id: OrgId,
    /// Position in the organization's chain, starting at 1.
    pub seq: u64,
    pub entity_type: String,
    pub entity_id: String,
    pub event_type: String,
    pub payload: JsonValue,
    pub actor: ActorId,
    pub recorded_at: DateTime<Utc>,
    pub prev_hash: String,
    pub hash: String,
}

impl AuditRecord {
    /// Chain a new record after `tail` (or start the chain when `None`).
    pub fn chained(
        org_id: OrgId,
        tail: Option<&AuditRecord>,
        content: NewAuditRecord,
        now: DateTime<Utc>,
    ) -> Self {
        let (seq, prev_hash) = match tail {
            Some(tail) => (tail.seq + 1, tail.hash.clone()),
            None => (1, GENESIS_HASH.to_string()),
        };
        let mut record = Self {
            org_id,
            seq,
            entity_type: content.entity_type,
            entity_id: content.entity_id,
            event_type: content.event_type,
            payload: content.payload,
            actor: content.actor,
            recorded_at: now,
            prev_hash,
            hash: String::new(),
        };
        record.hash = chain_hash(&record.prev_hash, &record);
        record
    }
}
