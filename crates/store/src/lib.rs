//! Storage boundary for the ledger engine.
//!
//! The traits here define what persistence must provide: org-scoped
//! transactional units of work, an append-only audit log (no update or
//! delete anywhere in the interface), and a unique-insert idempotency table.
//! `InMemoryLedgerStore` is the reference implementation used by tests and
//! embedding callers.

pub mod memory;
pub mod tx;

pub use memory::InMemoryLedgerStore;
pub use tx::{IdempotencyKey, KeyReservation, LedgerStore, LedgerTx};
