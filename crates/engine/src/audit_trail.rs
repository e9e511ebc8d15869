//! Audit trail service: chained appends and operator-facing verification.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_audit::{AuditRecord, NewAuditRecord, verify_chain};
use tally_core::{LedgerResult, OrgId};
use tally_store::{LedgerStore, LedgerTx};

use crate::context::ActorContext;

/// Result of a chain verification pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStatus {
    pub ok: bool,
    /// `entity_id` of the first record that fails verification.
    pub break_point: Option<String>,
}

impl ChainStatus {
    fn intact() -> Self {
        Self {
            ok: true,
            break_point: None,
        }
    }
}

/// Append a record to the organization's chain inside an open transaction.
///
/// The tail is read and advanced under the transaction's exclusive org view,
/// so two concurrent appends can never compute against the same `prev_hash`.
pub(crate) fn append_in_tx(
    tx: &mut dyn LedgerTx,
    org_id: OrgId,
    content: NewAuditRecord,
    now: DateTime<Utc>,
) -> LedgerResult<AuditRecord> {
    let record = AuditRecord::chained(org_id, tx.audit_tail(), content, now);
    tx.append_audit(record.clone())?;
    Ok(record)
}

/// Tamper-evident audit log over the store.
pub struct AuditTrail<S> {
    store: Arc<S>,
}

impl<S: LedgerStore> AuditTrail<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Append one record on behalf of a collaborator module.
    pub fn append(
        &self,
        org_id: OrgId,
        actor: &ActorContext,
        content: NewAuditRecord,
    ) -> LedgerResult<AuditRecord> {
        actor.require_authorized()?;
        self.store
            .with_org(org_id, |tx| append_in_tx(tx, org_id, content, Utc::now()))
    }

    /// Recompute the whole chain and report the first break, if any.
    ///
    /// A broken chain is a fatal, operator-facing condition; it is reported
    /// and logged, never repaired. Each failed pass also bumps the org's
    /// persistent chain-break counter.
    pub fn verify(&self, org_id: OrgId) -> LedgerResult<ChainStatus> {
        self.store.with_org(org_id, |tx| {
            let outcome = {
                let records = tx.audit_records();
                match verify_chain(records) {
                    Ok(()) => None,
                    Err(e) => {
                        let break_point = records
                            .iter()
                            .find(|r| r.seq == e.seq())
                            .map(|r| r.entity_id.clone());
                        Some((e, break_point))
                    }
                }
            };
            match outcome {
                None => Ok(ChainStatus::intact()),
                Some((e, break_point)) => {
                    tracing::error!(org = %org_id, error = %e, "audit chain verification failed");
                    tx.record_chain_break();
                    Ok(ChainStatus {
                        ok: false,
                        break_point,
                    })
                }
            }
        })
    }
}
