//! Idempotency guard over the store's key table.
//!
//! Reservation is a unique insert; a conflict means the request is a replay
//! and the guarded side effect must not run again. Whether a failed guarded
//! operation releases the key (allowing a corrected retry) or leaves it
//! consumed is the guarded endpoint's policy, not the guard's.

use chrono::{DateTime, Duration, Utc};

use tally_core::{EntryId, LedgerResult, OrgId};
use tally_store::{KeyReservation, LedgerStore, LedgerTx};

pub struct IdempotencyGuard;

impl IdempotencyGuard {
    /// Reserve `key` for `endpoint` before the guarded operation runs.
    pub fn reserve(
        tx: &mut dyn LedgerTx,
        key: &str,
        endpoint: &str,
        now: DateTime<Utc>,
    ) -> KeyReservation {
        tx.reserve_key(key, endpoint, now)
    }

    /// Drop a reservation so a retry may reuse the key.
    ///
    /// The in-memory store would also discard it on transaction rollback;
    /// releasing explicitly keeps the policy visible and correct for stores
    /// where the reservation outlives the failed unit of work.
    pub fn release(tx: &mut dyn LedgerTx, key: &str) {
        tx.release_key(key);
    }

    /// Bind a reservation to the entry it produced, for replay responses.
    pub fn bind(tx: &mut dyn LedgerTx, key: &str, entry_id: EntryId) {
        tx.bind_key(key, entry_id);
    }

    /// Housekeeping: delete keys older than `max_age`, returning the count.
    pub fn purge_older_than<S: LedgerStore>(
        store: &S,
        org_id: OrgId,
        max_age: Duration,
    ) -> LedgerResult<usize> {
        let cutoff = Utc::now() - max_age;
        store.with_org(org_id, |tx| Ok(tx.purge_keys_older_than(cutoff)))
    }
}
