//! `tally-engine` — the ledger's operation surface.
//!
//! Composes the domain crates over a [`tally_store::LedgerStore`]: draft
//! creation and posting, reversal by mirror entry, bank statement import and
//! reconciliation, audit chain verification, and idempotency-key
//! housekeeping. Every state-changing operation runs as one transactional
//! unit of work and leaves a chained audit record behind.

pub mod audit_trail;
pub mod context;
pub mod guard;
pub mod poster;
pub mod reconcile;
pub mod reversal;

use std::sync::Arc;

use chrono::Duration;

use tally_banking::{BankStatement, MatchConfig, StatementImport};
use tally_core::{EntryId, LedgerResult, OrgId, StatementId};
use tally_journal::{EntryDraft, JournalEntry};
use tally_store::LedgerStore;

pub use audit_trail::{AuditTrail, ChainStatus};
pub use context::ActorContext;
pub use guard::IdempotencyGuard;
pub use poster::JournalPoster;
pub use reconcile::{AmbiguousMatch, BankReconciler, ReconciliationReport};
pub use reversal::{ReversalEngine, ReversedPair};

/// The assembled ledger: one store, every operation.
pub struct LedgerEngine<S> {
    store: Arc<S>,
    poster: JournalPoster<S>,
    reversal: ReversalEngine<S>,
    reconciler: BankReconciler<S>,
    audit: AuditTrail<S>,
}

impl<S: LedgerStore> LedgerEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_match_config(store, MatchConfig::default())
    }

    pub fn with_match_config(store: Arc<S>, config: MatchConfig) -> Self {
        Self {
            poster: JournalPoster::new(Arc::clone(&store)),
            reversal: ReversalEngine::new(Arc::clone(&store)),
            reconciler: BankReconciler::with_config(Arc::clone(&store), config),
            audit: AuditTrail::new(Arc::clone(&store)),
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn create_draft(
        &self,
        actor: &ActorContext,
        draft: EntryDraft,
    ) -> LedgerResult<JournalEntry> {
        self.poster.create_draft(actor, draft)
    }

    pub fn delete_draft(
        &self,
        org_id: OrgId,
        entry_id: EntryId,
        actor: &ActorContext,
    ) -> LedgerResult<()> {
        self.poster.delete_draft(org_id, entry_id, actor)
    }

    pub fn post(
        &self,
        org_id: OrgId,
        entry_id: EntryId,
        actor: &ActorContext,
        idempotency_key: &str,
    ) -> LedgerResult<JournalEntry> {
        self.poster.post(org_id, entry_id, actor, idempotency_key)
    }

    pub fn reverse(
        &self,
        org_id: OrgId,
        entry_id: EntryId,
        actor: &ActorContext,
        reason: &str,
    ) -> LedgerResult<ReversedPair> {
        self.reversal.reverse(org_id, entry_id, actor, reason)
    }

    pub fn import_statement(
        &self,
        org_id: OrgId,
        actor: &ActorContext,
        import: StatementImport,
    ) -> LedgerResult<BankStatement> {
        self.reconciler.import_statement(org_id, actor, import)
    }

    pub fn reconcile(
        &self,
        org_id: OrgId,
        statement_id: StatementId,
        actor: &ActorContext,
    ) -> LedgerResult<ReconciliationReport> {
        self.reconciler.reconcile(org_id, statement_id, actor)
    }

    pub fn verify_audit_chain(&self, org_id: OrgId) -> LedgerResult<ChainStatus> {
        self.audit.verify(org_id)
    }

    pub fn purge_idempotency_keys(&self, org_id: OrgId, max_age: Duration) -> LedgerResult<usize> {
        IdempotencyGuard::purge_older_than(self.store.as_ref(), org_id, max_age)
    }
}
