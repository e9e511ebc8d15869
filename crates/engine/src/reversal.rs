//! Reversal of posted entries by mirror entry.
//!
//! A reversal never edits the original: it posts a second entry with every
//! line's debit and credit swapped, at the same currency and fx rate, then
//! links the two. Both sides of the link and the audit record land in one
//! unit of work.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use tally_audit::NewAuditRecord;
use tally_core::{EntryId, LedgerError, LedgerResult, OrgId};
use tally_journal::{EntryStatus, JournalEntry};
use tally_store::LedgerStore;

use crate::audit_trail::append_in_tx;
use crate::context::ActorContext;
use crate::poster::post_in_tx;

/// The original entry and the mirror that reversed it, both post-transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversedPair {
    pub original: JournalEntry,
    pub reversal: JournalEntry,
}

pub struct ReversalEngine<S> {
    store: Arc<S>,
}

impl<S: LedgerStore> ReversalEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Reverse a posted entry.
    ///
    /// Only `posted` entries qualify: drafts have nothing to undo and an
    /// entry already reversed stays reversed. A reversal entry itself may be
    /// reversed in turn; that never resurrects the entry it mirrored.
    pub fn reverse(
        &self,
        org_id: OrgId,
        entry_id: EntryId,
        actor: &ActorContext,
        reason: &str,
    ) -> LedgerResult<ReversedPair> {
        let actor_id = actor.require_authorized()?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::validation("reversal reason is required"));
        }

        self.store.with_org(org_id, |tx| {
            let now = Utc::now();
            let mirror_draft = {
                let original = tx
                    .entry(entry_id)
                    .ok_or_else(|| LedgerError::not_found(format!("journal entry {entry_id}")))?;
                match original.status() {
                    EntryStatus::Draft => return Err(LedgerError::NotPosted(entry_id)),
                    EntryStatus::Reversed => return Err(LedgerError::AlreadyReversed(entry_id)),
                    EntryStatus::Posted => {}
                }
                original.reversal_draft(now.date_naive(), reason)
            };

            let mut mirror = JournalEntry::new_draft(mirror_draft, actor_id, now)?;
            mirror.link_reversal_of(entry_id);
            let mirror_id = mirror.id();
            tx.insert_entry(mirror);

            let reversal = post_in_tx(tx, org_id, mirror_id, actor_id, now)?;

            let original = {
                let original = tx
                    .entry_mut(entry_id)
                    .ok_or_else(|| LedgerError::not_found(format!("journal entry {entry_id}")))?;
                original.mark_reversed(mirror_id)?;
                original.clone()
            };

            append_in_tx(
                tx,
                org_id,
                NewAuditRecord::new(
                    "journal_entry",
                    entry_id,
                    "reversed",
                    json!({
                        "reversal_entry_id": mirror_id,
                        "reason": reason,
                    }),
                    actor_id,
                ),
                now,
            )?;

            tracing::info!(
                org = %org_id,
                entry = %entry_id,
                reversal = %mirror_id,
                "journal entry reversed"
            );
            Ok(ReversedPair { original, reversal })
        })
    }
}
