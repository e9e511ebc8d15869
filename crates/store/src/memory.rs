//! In-memory ledger store.
//!
//! Intended for tests and embedded use. Transactions are snapshot-based:
//! the org state is cloned, the closure mutates the clone, and the clone
//! replaces the original only on success.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};

use tally_audit::{AuditRecord, GENESIS_HASH};
use tally_banking::BankStatement;
use tally_core::{Currency, EntryId, LedgerError, LedgerResult, OrgId, StatementId};
use tally_journal::{Account, JournalEntry};

use crate::tx::{IdempotencyKey, KeyReservation, LedgerStore, LedgerTx};

#[derive(Debug, Clone)]
struct OrgState {
    base_currency: Currency,
    accounts: BTreeMap<String, Account>,
    entries: BTreeMap<EntryId, JournalEntry>,
    statements: BTreeMap<StatementId, BankStatement>,
    audit: Vec<AuditRecord>,
    chain_breaks: u64,
    idempotency: BTreeMap<String, IdempotencyKey>,
}

impl OrgState {
    fn new(base_currency: Currency, accounts: Vec<Account>) -> Self {
        Self {
            base_currency,
            accounts: accounts.into_iter().map(|a| (a.code.clone(), a)).collect(),
            entries: BTreeMap::new(),
            statements: BTreeMap::new(),
            audit: Vec::new(),
            chain_breaks: 0,
            idempotency: BTreeMap::new(),
        }
    }
}

impl LedgerTx for OrgState {
    fn base_currency(&self) -> &Currency {
        &self.base_currency
    }

    fn account(&self, code: &str) -> Option<&Account> {
        self.accounts.get(code)
    }

    fn insert_entry(&mut self, entry: JournalEntry) {
        self.entries.insert(entry.id(), entry);
    }

    fn entry(&self, id: EntryId) -> Option<&JournalEntry> {
        self.entries.get(&id)
    }

    fn entry_mut(&mut self, id: EntryId) -> Option<&mut JournalEntry> {
        self.entries.get_mut(&id)
    }

    fn remove_draft(&mut self, id: EntryId) -> LedgerResult<()> {
        let entry = self
            .entries
            .get(&id)
            .ok_or_else(|| LedgerError::not_found(format!("journal entry {id}")))?;
        if !entry.is_editable() {
            return Err(LedgerError::AlreadyPosted(id));
        }
        self.entries.remove(&id);
        Ok(())
    }

    fn entries(&self) -> Box<dyn Iterator<Item = &JournalEntry> + '_> {
        Box::new(self.entries.values())
    }

    fn insert_statement(&mut self, statement: BankStatement) {
        self.statements.insert(statement.id(), statement);
    }

    fn statement(&self, id: StatementId) -> Option<&BankStatement> {
        self.statements.get(&id)
    }

    fn statement_mut(&mut self, id: StatementId) -> Option<&mut BankStatement> {
        self.statements.get_mut(&id)
    }

    fn audit_tail(&self) -> Option<&AuditRecord> {
        self.audit.last()
    }

    fn audit_records(&self) -> &[AuditRecord] {
        &self.audit
    }

    fn append_audit(&mut self, record: AuditRecord) -> LedgerResult<()> {
        let (expected_seq, expected_prev) = match self.audit.last() {
            Some(tail) => (tail.seq + 1, tail.hash.as_str()),
            None => (1, GENESIS_HASH),
        };
        if record.seq != expected_seq || record.prev_hash != expected_prev {
            return Err(LedgerError::storage(format!(
                "audit append does not extend the chain tail (seq {}, expected {expected_seq})",
                record.seq
            )));
        }
        self.audit.push(record);
        Ok(())
    }

    fn chain_break_count(&self) -> u64 {
        self.chain_breaks
    }

    fn record_chain_break(&mut self) {
        self.chain_breaks += 1;
    }

    fn reserve_key(&mut self, key: &str, endpoint: &str, now: DateTime<Utc>) -> KeyReservation {
        if let Some(existing) = self.idempotency.get(key) {
            return KeyReservation::Duplicate(existing.clone());
        }
        self.idempotency.insert(
            key.to_string(),
            IdempotencyKey {
                key: key.to_string(),
                endpoint: endpoint.to_string(),
                entry_id: None,
                created_at: now,
            },
        );
        KeyReservation::Reserved
    }

    fn release_key(&mut self, key: &str) {
        self.idempotency.remove(key);
    }

    fn bind_key(&mut self, key: &str, entry_id: EntryId) {
        if let Some(record) = self.idempotency.get_mut(key) {
            record.entry_id = Some(entry_id);
        }
    }

    fn purge_keys_older_than(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.idempotency.len();
        self.idempotency.retain(|_, k| k.created_at >= cutoff);
        before - self.idempotency.len()
    }
}

/// In-memory, org-partitioned transactional store.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    orgs: RwLock<HashMap<OrgId, Arc<Mutex<OrgState>>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an organization with its base currency and chart of accounts.
    ///
    /// Registration happens during setup, outside the engine's contracts.
    pub fn register_org(
        &self,
        org_id: OrgId,
        base_currency: Currency,
        accounts: Vec<Account>,
    ) -> LedgerResult<()> {
        let mut orgs = self
            .orgs
            .write()
            .map_err(|_| LedgerError::storage("lock poisoned"))?;
        if orgs.contains_key(&org_id) {
            return Err(LedgerError::validation(format!(
                "organization {org_id} already registered"
            )));
        }
        orgs.insert(
            org_id,
            Arc::new(Mutex::new(OrgState::new(base_currency, accounts))),
        );
        Ok(())
    }

    fn org(&self, org_id: OrgId) -> LedgerResult<Arc<Mutex<OrgState>>> {
        self.orgs
            .read()
            .map_err(|_| LedgerError::storage("lock poisoned"))?
            .get(&org_id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found(format!("organization {org_id}")))
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn with_org<T, F>(&self, org_id: OrgId, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&mut dyn LedgerTx) -> LedgerResult<T>,
    {
        let org = self.org(org_id)?;
        let mut state = org.lock().map_err(|_| LedgerError::storage("lock poisoned"))?;

        // Snapshot transaction: commit the clone on Ok, drop it on Err.
        let mut working = state.clone();
        match f(&mut working) {
            Ok(value) => {
                *state = working;
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }

    fn read_org<T, F>(&self, org_id: OrgId, f: F) -> LedgerResult<T>
    where
        F: FnOnce(&dyn LedgerTx) -> LedgerResult<T>,
    {
        let org = self.org(org_id)?;
        let state = org.lock().map_err(|_| LedgerError::storage("lock poisoned"))?;
        f(&*state)
    }
}
