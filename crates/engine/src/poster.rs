//! Draft creation and posting.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use tally_audit::NewAuditRecord;
use tally_core::{ActorId, CurrencyConverter, EntryId, LedgerError, LedgerResult, OrgId};
use tally_journal::{EntryDraft, JournalEntry};
use tally_store::{KeyReservation, LedgerStore, LedgerTx};

use crate::audit_trail::append_in_tx;
use crate::context::ActorContext;
use crate::guard::IdempotencyGuard;

const POST_ENDPOINT: &str = "journal.post";

/// Creates, deletes and posts journal entries.
pub struct JournalPoster<S> {
    store: Arc<S>,
}

impl<S: LedgerStore> JournalPoster<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Validate and persist a draft entry. No audit record: drafts carry no
    /// financial effect yet.
    pub fn create_draft(
        &self,
        actor: &ActorContext,
        draft: EntryDraft,
    ) -> LedgerResult<JournalEntry> {
        let actor_id = actor.require_authorized()?;
        let org_id = draft.org_id;
        self.store.with_org(org_id, |tx| {
            let entry = JournalEntry::new_draft(draft, actor_id, Utc::now())?;
            tx.insert_entry(entry.clone());
            tracing::debug!(org = %org_id, entry = %entry.id(), "draft entry created");
            Ok(entry)
        })
    }

    /// Delete a draft entry and its lines. Posted entries are never deleted.
    pub fn delete_draft(
        &self,
        org_id: OrgId,
        entry_id: EntryId,
        actor: &ActorContext,
    ) -> LedgerResult<()> {
        actor.require_authorized()?;
        self.store.with_org(org_id, |tx| {
            tx.remove_draft(entry_id)?;
            tracing::debug!(org = %org_id, entry = %entry_id, "draft entry deleted");
            Ok(())
        })
    }

    /// Post a draft entry under an idempotency key.
    ///
    /// A replayed key returns the entry produced by the first call, without
    /// re-running the posting. A failed posting releases the key so the
    /// caller can retry with a corrected entry.
    pub fn post(
        &self,
        org_id: OrgId,
        entry_id: EntryId,
        actor: &ActorContext,
        idempotency_key: &str,
    ) -> LedgerResult<JournalEntry> {
        let actor_id = actor.require_authorized()?;
        let key = idempotency_key.trim();
        if key.is_empty() {
            return Err(LedgerError::validation("idempotency key is required"));
        }

        self.store.with_org(org_id, |tx| {
            let now = Utc::now();
            match IdempotencyGuard::reserve(tx, key, POST_ENDPOINT, now) {
                KeyReservation::Duplicate(prior) => {
                    let bound = prior.entry_id.ok_or_else(|| {
                        LedgerError::validation(format!(
                            "idempotency key {key:?} is reserved by an operation still in flight"
                        ))
                    })?;
                    let entry = tx
                        .entry(bound)
                        .cloned()
                        .ok_or_else(|| LedgerError::not_found(format!("journal entry {bound}")))?;
                    tracing::info!(org = %org_id, entry = %bound, "idempotent replay of posting");
                    Ok(entry)
                }
                KeyReservation::Reserved => match post_in_tx(tx, org_id, entry_id, actor_id, now) {
                    Ok(entry) => {
                        IdempotencyGuard::bind(tx, key, entry.id());
                        Ok(entry)
                    }
                    Err(e) => {
                        IdempotencyGuard::release(tx, key);
                        Err(e)
                    }
                },
            }
        })
    }
}

/// Post `entry_id` inside an open transaction and append the audit record.
///
/// Shared with the reversal path, which posts the mirror entry in the same
/// unit of work that marks the original reversed.
pub(crate) fn post_in_tx(
    tx: &mut dyn LedgerTx,
    org_id: OrgId,
    entry_id: EntryId,
    actor: ActorId,
    now: DateTime<Utc>,
) -> LedgerResult<JournalEntry> {
    let account_codes: Vec<String> = {
        let entry = tx
            .entry(entry_id)
            .ok_or_else(|| LedgerError::not_found(format!("journal entry {entry_id}")))?;
        entry
            .lines()
            .iter()
            .map(|l| l.account_code().to_string())
            .collect()
    };
    for code in &account_codes {
        let account = tx
            .account(code)
            .ok_or_else(|| LedgerError::invalid_account(code))?;
        if !account.postable() {
            return Err(LedgerError::group_account(code));
        }
    }

    let converter = CurrencyConverter::new(tx.base_currency().clone());
    let entry = {
        let entry = tx
            .entry_mut(entry_id)
            .ok_or_else(|| LedgerError::not_found(format!("journal entry {entry_id}")))?;
        entry.post(actor, now, &converter)?;
        entry.clone()
    };

    let (debit, credit) = entry.totals()?;
    append_in_tx(
        tx,
        org_id,
        NewAuditRecord::new(
            "journal_entry",
            entry.id(),
            "posted",
            json!({
                "journal_code": entry.journal_code(),
                "reference": entry.reference(),
                "currency": entry.currency().code(),
                "fx_rate": entry.fx_rate().value(),
                "total_debit": debit.amount(),
                "total_credit": credit.amount(),
                "line_count": entry.lines().len(),
            }),
            actor,
        ),
        now,
    )?;

    tracing::info!(
        org = %org_id,
        entry = %entry.id(),
        journal = entry.journal_code(),
        total_debit = %debit.amount(),
        "journal entry posted"
    );
    Ok(entry)
}
