//! Transactional store traits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use tally_audit::AuditRecord;
use tally_banking::BankStatement;
use tally_core::{Currency, EntryId, LedgerResult, OrgId, StatementId};
use tally_journal::{Account, JournalEntry};

/// One reserved idempotency key.
///
/// `entry_id` is bound by the guarded operation on success so a replay can
/// return the original outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyKey {
    pub key: String,
    pub endpoint: String,
    pub entry_id: Option<EntryId>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of attempting to reserve a key.
///
/// Duplicate detection relies solely on the key's uniqueness within the
/// table; a duplicate carries the previously reserved record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyReservation {
    Reserved,
    Duplicate(IdempotencyKey),
}

/// Org-scoped transactional view of the ledger state.
///
/// All reads and writes of journal entries, statements, audit records and
/// idempotency keys go through this interface; the audit log deliberately
/// exposes no update or delete, which makes the append-only guarantee a
/// property of the storage boundary rather than caller discipline.
pub trait LedgerTx {
    /// The organization's reporting currency.
    fn base_currency(&self) -> &Currency;

    /// Chart-of-accounts lookup (read-only to the engine).
    fn account(&self, code: &str) -> Option<&Account>;

    fn insert_entry(&mut self, entry: JournalEntry);
    fn entry(&self, id: EntryId) -> Option<&JournalEntry>;
    fn entry_mut(&mut self, id: EntryId) -> Option<&mut JournalEntry>;

    /// Delete a draft entry together with its lines.
    ///
    /// Posted entries are never deleted; attempting to is an error.
    fn remove_draft(&mut self, id: EntryId) -> LedgerResult<()>;

    /// All journal entries of the organization, in id (time) order.
    fn entries(&self) -> Box<dyn Iterator<Item = &JournalEntry> + '_>;

    fn insert_statement(&mut self, statement: BankStatement);
    fn statement(&self, id: StatementId) -> Option<&BankStatement>;
    fn statement_mut(&mut self, id: StatementId) -> Option<&mut BankStatement>;

    /// Current tail of the organization's audit chain.
    fn audit_tail(&self) -> Option<&AuditRecord>;

    /// The whole chain, in sequence order.
    fn audit_records(&self) -> &[AuditRecord];

    /// Append a chained record.
    ///
    /// Rejects any record that does not extend the current tail, so two
    /// writers racing on the same `prev_hash` cannot fork the chain.
    fn append_audit(&mut self, record: AuditRecord) -> LedgerResult<()>;

    /// Verification failures observed on this organization's chain.
    fn chain_break_count(&self) -> u64;

    /// Record one observed chain verification failure.
    ///
    /// The count persists with the org state for operational visibility; a
    /// break signals a bug or tampering and is never auto-repaired.
    fn record_chain_break(&mut self);

    /// Insert-or-conflict on the idempotency table.
    fn reserve_key(&mut self, key: &str, endpoint: &str, now: DateTime<Utc>) -> KeyReservation;

    /// Drop a reservation (caller-side retry policy).
    fn release_key(&mut self, key: &str);

    /// Bind a reserved key to the entry the guarded operation produced.
    fn bind_key(&mut self, key: &str, entry_id: EntryId);

    /// Housekeeping: delete keys created before `cutoff`, returning the count.
    fn purge_keys_older_than(&mut self, cutoff: DateTime<Utc>) -> usize;
}

/// Org-partitioned store executing closures as transactional units.
///
/// `with_org` runs the closure against an exclusive, mutable view of one
/// organization's state: the mutations commit if the closure returns `Ok`
/// and are discarded entirely on `Err`. Operations on different
/// organizations proceed independently; operations on the same organization
/// serialize, which is what gives posting, audit appends and reconciliation
/// their mutual exclusion.
pub trait LedgerStore: Send + Sync {
    fn with_org<T, F>(&self, org_id: OrgId, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut dyn LedgerTx) -> LedgerResult<T>;

    /// Read-only unit of work (no snapshot, no commit).
    fn read_org<T, F>(&self, org_id: OrgId, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&dyn LedgerTx) -> LedgerResult<T>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn with_org<T, F>(&self, org_id: OrgId, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut dyn LedgerTx) -> LedgerResult<T>,
    {
        (**self).with_org(org_id, f)
    }

    fn read_org<T, F>(&self, org_id: OrgId, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&dyn LedgerTx) -> LedgerResult<T>,
    {
        (**self).read_org(org_id, f)
    }
}
