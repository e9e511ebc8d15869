//! Tamper-evident audit trail: append-only records in a SHA-256 hash chain.
//!
//! Each organization has its own chain; every record's hash covers the
//! previous hash plus a canonical serialization of the record content, so a
//! retroactive edit anywhere breaks verification from that point on.

pub mod chain;
pub mod record;

pub use chain::{ChainError, chain_hash, verify_chain};
pub use record::{AuditRecord, GENESIS_HASH, NewAuditRecord};
