//! Bank statement import and automatic reconciliation.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use tally_audit::NewAuditRecord;
use tally_banking::{
    BankStatement, MatchCandidate, MatchConfig, MatchOutcome, StatementImport, select_candidate,
};
use tally_core::{EntryId, LedgerError, LedgerResult, OrgId, StatementId, StatementLineId};
use tally_journal::EntryStatus;
use tally_store::LedgerStore;

use crate::audit_trail::append_in_tx;
use crate::context::ActorContext;

/// A line the matcher refused to decide: every tie-break left more than one
/// candidate standing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmbiguousMatch {
    pub line_id: StatementLineId,
    pub candidates: Vec<EntryId>,
}

/// Outcome of one reconciliation pass over a statement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Lines matched to an entry, including matches from earlier passes.
    pub matched: Vec<(StatementLineId, EntryId)>,
    /// Lines with no surviving candidate.
    pub unmatched: Vec<StatementLineId>,
    /// Lines left for manual review.
    pub ambiguous: Vec<AmbiguousMatch>,
    /// Matches recorded by this pass alone.
    pub newly_matched: usize,
}

pub struct BankReconciler<S> {
    store: Arc<S>,
    config: MatchConfig,
}

impl<S: LedgerStore> BankReconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, MatchConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: MatchConfig) -> Self {
        Self { store, config }
    }

    /// Validate and persist an imported statement.
    pub fn import_statement(
        &self,
        org_id: OrgId,
        actor: &ActorContext,
        import: StatementImport,
    ) -> LedgerResult<BankStatement> {
        let actor_id = actor.require_authorized()?;
        self.store.with_org(org_id, |tx| {
            let now = Utc::now();
            let statement = BankStatement::import(org_id, import, actor_id, now)?;
            append_in_tx(
                tx,
                org_id,
                NewAuditRecord::new(
                    "bank_statement",
                    statement.id(),
                    "imported",
                    json!({
                        "account_code": statement.account_code(),
                        "period_start": statement.period_start(),
                        "period_end": statement.period_end(),
                        "line_count": statement.lines().len(),
                    }),
                    actor_id,
                ),
                now,
            )?;
            tx.insert_statement(statement.clone());
            tracing::info!(
                org = %org_id,
                statement = %statement.id(),
                lines = statement.lines().len(),
                "bank statement imported"
            );
            Ok(statement)
        })
    }

    /// Run one automatic matching pass over a statement.
    ///
    /// Candidates are posted entries on the statement's account whose
    /// absolute base-currency net equals the line's absolute amount and whose
    /// posting date falls inside the configured window. An entry consumed by
    /// any line of this statement, in this pass or an earlier one, is not a
    /// candidate again. Lines are visited in transaction-date order, so a
    /// repeat run over the same state reports the same outcome.
    pub fn reconcile(
        &self,
        org_id: OrgId,
        statement_id: StatementId,
        actor: &ActorContext,
    ) -> LedgerResult<ReconciliationReport> {
        let actor_id = actor.require_authorized()?;
        let config = self.config;

        self.store.with_org(org_id, |tx| {
            let now = Utc::now();
            let statement = tx
                .statement(statement_id)
                .ok_or_else(|| LedgerError::not_found(format!("bank statement {statement_id}")))?;
            let account_code = statement.account_code().to_string();

            let mut consumed: BTreeSet<EntryId> =
                statement.matched_entry_ids().into_iter().collect();

            // Decide every line against the current entry set first; matches
            // are recorded afterwards so the candidate scan never observes a
            // half-updated statement.
            let mut decisions: Vec<(StatementLineId, MatchOutcome)> = Vec::new();
            for line in statement.lines() {
                if line.matched() {
                    continue;
                }
                let target = line.amount().abs();
                let candidates: Vec<MatchCandidate> = tx
                    .entries()
                    .filter(|e| e.status() == EntryStatus::Posted)
                    .filter(|e| !consumed.contains(&e.id()))
                    .filter(|e| e.touches_account(&account_code))
                    .filter(|e| e.net_base_for(&account_code).abs() == target)
                    .filter(|e| config.within_window(line.tx_date(), e.posting_date()))
                    .map(|e| MatchCandidate {
                        entry_id: e.id(),
                        posting_date: e.posting_date(),
                        reference: e.reference().map(str::to_string),
                    })
                    .collect();

                let outcome = select_candidate(line.reference(), &candidates);
                if let MatchOutcome::Matched(entry_id) = &outcome {
                    consumed.insert(*entry_id);
                }
                decisions.push((line.id(), outcome));
            }

            let mut report = ReconciliationReport::default();
            {
                let statement = tx.statement_mut(statement_id).ok_or_else(|| {
                    LedgerError::not_found(format!("bank statement {statement_id}"))
                })?;
                for (line_id, outcome) in decisions {
                    match outcome {
                        MatchOutcome::Matched(entry_id) => {
                            statement.record_match(line_id, entry_id, actor_id, now)?;
                            report.matched.push((line_id, entry_id));
                            report.newly_matched += 1;
                        }
                        MatchOutcome::NoCandidate => report.unmatched.push(line_id),
                        MatchOutcome::Ambiguous(candidates) => {
                            report.ambiguous.push(AmbiguousMatch {
                                line_id,
                                candidates,
                            });
                        }
                    }
                }
                // Matches recorded by earlier passes stay visible in the report.
                for line in statement.lines() {
                    if let Some(entry_id) = line.matched_journal_entry_id() {
                        if !report.matched.iter().any(|(id, _)| *id == line.id()) {
                            report.matched.push((line.id(), entry_id));
                        }
                    }
                }
            }

            if report.newly_matched > 0 {
                append_in_tx(
                    tx,
                    org_id,
                    NewAuditRecord::new(
                        "bank_statement",
                        statement_id,
                        "auto_matched",
                        json!({
                            "account_code": account_code,
                            "newly_matched": report.newly_matched,
                            "unmatched": report.unmatched.len(),
                            "ambiguous": report.ambiguous.len(),
                        }),
                        actor_id,
                    ),
                    now,
                )?;
            }

            tracing::info!(
                org = %org_id,
                statement = %statement_id,
                newly_matched = report.newly_matched,
                unmatched = report.unmatched.len(),
                ambiguous = report.ambiguous.len(),
                "reconciliation pass complete"
            );
            Ok(report)
        })
    }
}
