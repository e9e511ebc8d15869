//! End-to-end flows through the assembled engine: posting with currency
//! conversion, idempotent replay, reversal, reconciliation and audit chain
//! verification, all against the in-memory store.

use std::sync::Arc;
use std::thread;

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use tally_banking::{StatementImport, StatementLineImport};
use tally_core::{ActorId, Currency, EntryId, FxRate, LedgerError, OrgId};
use tally_engine::{ActorContext, LedgerEngine};
use tally_journal::{Account, AccountType, EntryDraft, EntryStatus, LineDraft};
use tally_store::{InMemoryLedgerStore, LedgerStore};

fn etb() -> Currency {
    Currency::new("ETB", 2).unwrap()
}

fn usd() -> Currency {
    Currency::new("USD", 2).unwrap()
}

fn chart() -> Vec<Account> {
    vec![
        Account::new("1000", "Assets", AccountType::Asset, true),
        Account::new("1100", "Bank", AccountType::Asset, false),
        Account::new("1200", "Receivables", AccountType::Asset, false),
        Account::new("4000", "Sales", AccountType::Income, false),
    ]
}

fn setup() -> (LedgerEngine<InMemoryLedgerStore>, OrgId, ActorContext) {
    let store = Arc::new(InMemoryLedgerStore::new());
    let org = OrgId::new();
    store.register_org(org, etb(), chart()).unwrap();
    let engine = LedgerEngine::new(store);
    (engine, org, ActorContext::authorized(ActorId::new()))
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, m, d).unwrap()
}

fn usd_draft(org: OrgId, reference: &str, amount: Decimal, posting: NaiveDate) -> EntryDraft {
    EntryDraft {
        org_id: org,
        journal_code: "GENERAL".to_string(),
        reference: Some(reference.to_string()),
        description: Some("Export invoice".to_string()),
        currency: usd(),
        fx_rate: FxRate::new(dec!(50)).unwrap(),
        document_date: posting,
        posting_date: posting,
        lines: vec![
            LineDraft::debit("1100", amount),
            LineDraft::credit("4000", amount),
        ],
    }
}

#[test]
fn post_converts_to_base_currency_per_line() {
    let (engine, org, actor) = setup();

    let draft = engine
        .create_draft(&actor, usd_draft(org, "INV-001", dec!(100), date(3, 2)))
        .unwrap();
    assert_eq!(draft.status(), EntryStatus::Draft);

    let posted = engine.post(org, draft.id(), &actor, "key-001").unwrap();
    assert_eq!(posted.status(), EntryStatus::Posted);
    assert_eq!(posted.lines()[0].debit_base(), dec!(5000.00));
    assert_eq!(posted.lines()[1].credit_base(), dec!(5000.00));

    let status = engine.verify_audit_chain(org).unwrap();
    assert!(status.ok);
}

#[test]
fn replayed_idempotency_key_returns_the_original_entry() {
    let (engine, org, actor) = setup();

    let draft = engine
        .create_draft(&actor, usd_draft(org, "INV-002", dec!(100), date(3, 2)))
        .unwrap();
    let first = engine.post(org, draft.id(), &actor, "key-002").unwrap();
    let replay = engine.post(org, draft.id(), &actor, "key-002").unwrap();

    assert_eq!(first.id(), replay.id());
    assert_eq!(first.posted_at(), replay.posted_at());

    // The replay appended no second audit record for the posting.
    let records = engine
        .store()
        .read_org(org, |tx| Ok(tx.audit_records().to_vec()))
        .unwrap();
    assert_eq!(
        records.iter().filter(|r| r.event_type == "posted").count(),
        1
    );
}

#[test]
fn failed_post_releases_the_key_for_retry() {
    let (engine, org, actor) = setup();

    let unbalanced = EntryDraft {
        lines: vec![
            LineDraft::debit("1100", dec!(100)),
            LineDraft::credit("4000", dec!(60)),
        ],
        ..usd_draft(org, "INV-003", dec!(100), date(3, 2))
    };
    let bad = engine.create_draft(&actor, unbalanced).unwrap();
    let err = engine.post(org, bad.id(), &actor, "key-003").unwrap_err();
    assert!(matches!(err, LedgerError::Unbalanced { .. }));

    // Same key now guards a corrected entry.
    let good = engine
        .create_draft(&actor, usd_draft(org, "INV-003", dec!(100), date(3, 2)))
        .unwrap();
    let posted = engine.post(org, good.id(), &actor, "key-003").unwrap();
    assert_eq!(posted.status(), EntryStatus::Posted);
}

#[test]
fn posting_to_missing_or_group_account_is_rejected() {
    let (engine, org, actor) = setup();

    let ghost = EntryDraft {
        lines: vec![
            LineDraft::debit("9999", dec!(10)),
            LineDraft::credit("4000", dec!(10)),
        ],
        ..usd_draft(org, "INV-004", dec!(10), date(3, 2))
    };
    let entry = engine.create_draft(&actor, ghost).unwrap();
    let err = engine.post(org, entry.id(), &actor, "key-004a").unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAccount(_)));

    // "1000" is a group account in the chart.
    let grouped = EntryDraft {
        lines: vec![
            LineDraft::debit("1000", dec!(10)),
            LineDraft::credit("4000", dec!(10)),
        ],
        ..usd_draft(org, "INV-004", dec!(10), date(3, 2))
    };
    let entry = engine.create_draft(&actor, grouped).unwrap();
    let err = engine.post(org, entry.id(), &actor, "key-004b").unwrap_err();
    assert!(matches!(err, LedgerError::GroupAccountPosting(_)));
}

#[test]
fn unauthorized_actor_is_rejected_before_any_state_change() {
    let (engine, org, _) = setup();
    let intruder = ActorContext::new(ActorId::new(), false);

    let err = engine
        .create_draft(&intruder, usd_draft(org, "INV-005", dec!(10), date(3, 2)))
        .unwrap_err();
    assert_eq!(err, LedgerError::Unauthorized);

    let records = engine
        .store()
        .read_org(org, |tx| Ok(tx.audit_records().len()))
        .unwrap();
    assert_eq!(records, 0);
}

#[test]
fn reversal_posts_a_mirror_and_nets_to_zero() {
    let (engine, org, actor) = setup();

    let draft = engine
        .create_draft(&actor, usd_draft(org, "INV-006", dec!(100), date(3, 2)))
        .unwrap();
    engine.post(org, draft.id(), &actor, "key-006").unwrap();

    let pair = engine
        .reverse(org, draft.id(), &actor, "duplicate invoice")
        .unwrap();
    assert_eq!(pair.original.status(), EntryStatus::Reversed);
    assert_eq!(pair.original.reversed_by(), Some(pair.reversal.id()));
    assert_eq!(pair.reversal.reversed_of(), Some(pair.original.id()));
    assert_eq!(pair.reversal.status(), EntryStatus::Posted);

    for account in ["1100", "4000"] {
        let net = pair.original.net_base_for(account) + pair.reversal.net_base_for(account);
        assert_eq!(net, Decimal::ZERO);
    }

    // Reversing again is a conflict; the chain stays intact throughout.
    let err = engine
        .reverse(org, draft.id(), &actor, "again")
        .unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyReversed(_)));
    assert!(engine.verify_audit_chain(org).unwrap().ok);
}

#[test]
fn reversing_a_reversal_does_not_resurrect_the_original() {
    let (engine, org, actor) = setup();

    let draft = engine
        .create_draft(&actor, usd_draft(org, "INV-007", dec!(100), date(3, 2)))
        .unwrap();
    engine.post(org, draft.id(), &actor, "key-007").unwrap();
    let pair = engine.reverse(org, draft.id(), &actor, "wrong amount").unwrap();

    let second = engine
        .reverse(org, pair.reversal.id(), &actor, "reversed in error")
        .unwrap();
    assert_eq!(second.original.id(), pair.reversal.id());
    assert_eq!(second.original.status(), EntryStatus::Reversed);

    let original_status = engine
        .store()
        .read_org(org, |tx| {
            Ok(tx
                .entry(draft.id())
                .map(|e| e.status())
                .ok_or_else(|| LedgerError::not_found("entry"))?)
        })
        .unwrap();
    assert_eq!(original_status, EntryStatus::Reversed);
}

#[test]
fn draft_entries_cannot_be_reversed_and_posted_ones_not_deleted() {
    let (engine, org, actor) = setup();

    let draft = engine
        .create_draft(&actor, usd_draft(org, "INV-008", dec!(100), date(3, 2)))
        .unwrap();
    let err = engine.reverse(org, draft.id(), &actor, "nope").unwrap_err();
    assert!(matches!(err, LedgerError::NotPosted(_)));

    engine.post(org, draft.id(), &actor, "key-008").unwrap();
    let err = engine.delete_draft(org, draft.id(), &actor).unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyPosted(_)));
}

#[test]
fn concurrent_posting_of_one_entry_posts_exactly_once() {
    let (engine, org, actor) = setup();
    let engine = Arc::new(engine);

    let draft = engine
        .create_draft(&actor, usd_draft(org, "INV-009", dec!(100), date(3, 2)))
        .unwrap();
    let entry_id = draft.id();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let actor = actor;
            thread::spawn(move || engine.post(org, entry_id, &actor, &format!("race-{i}")))
        })
        .collect();

    let outcomes: Vec<Result<EntryId, LedgerError>> = handles
        .into_iter()
        .map(|h| h.join().unwrap().map(|e| e.id()))
        .collect();

    let wins = outcomes.iter().filter(|o| o.is_ok()).count();
    assert_eq!(wins, 1);
    for outcome in outcomes {
        if let Err(e) = outcome {
            assert!(matches!(e, LedgerError::AlreadyPosted(_)));
        }
    }
    assert!(engine.verify_audit_chain(org).unwrap().ok);
}

fn bank_statement(lines: Vec<StatementLineImport>) -> StatementImport {
    StatementImport {
        account_code: "1100".to_string(),
        currency: etb(),
        period_start: date(3, 1),
        period_end: date(3, 31),
        opening_balance: dec!(0),
        closing_balance: dec!(5000),
        source: Some("UPLOAD".to_string()),
        external_reference: None,
        lines,
    }
}

fn statement_line(d: u32, amount: Decimal, reference: Option<&str>) -> StatementLineImport {
    StatementLineImport {
        tx_date: date(3, d),
        description: None,
        amount,
        balance: None,
        reference: reference.map(str::to_string),
    }
}

#[test]
fn reconciliation_matches_by_base_amount_window_and_reference() {
    let (engine, org, actor) = setup();

    // 100 USD at 50 → 5000.00 ETB on the bank account.
    let inv = engine
        .create_draft(&actor, usd_draft(org, "INV-010", dec!(100), date(3, 2)))
        .unwrap();
    engine.post(org, inv.id(), &actor, "key-010").unwrap();

    // Same amount, different reference, outside the window.
    let far = engine
        .create_draft(&actor, usd_draft(org, "INV-011", dec!(100), date(3, 20)))
        .unwrap();
    engine.post(org, far.id(), &actor, "key-011").unwrap();

    let stmt = engine
        .import_statement(
            org,
            &actor,
            bank_statement(vec![
                statement_line(3, dec!(5000.00), Some("INV 010")),
                statement_line(4, dec!(123.45), None),
            ]),
        )
        .unwrap();

    let report = engine.reconcile(org, stmt.id(), &actor).unwrap();
    assert_eq!(report.newly_matched, 1);
    assert_eq!(report.unmatched.len(), 1);
    assert!(report.ambiguous.is_empty());
    assert_eq!(report.matched[0].1, inv.id());

    // A second pass changes nothing and reports the same state.
    let again = engine.reconcile(org, stmt.id(), &actor).unwrap();
    assert_eq!(again.newly_matched, 0);
    assert_eq!(again.matched, report.matched);
    assert_eq!(again.unmatched, report.unmatched);
}

#[test]
fn a_full_tie_is_reported_ambiguous_not_guessed() {
    let (engine, org, actor) = setup();

    // Two identical postings on the same date with no references.
    for key in ["key-012a", "key-012b"] {
        let mut draft = usd_draft(org, "", dec!(100), date(3, 2));
        draft.reference = None;
        let entry = engine.create_draft(&actor, draft).unwrap();
        engine.post(org, entry.id(), &actor, key).unwrap();
    }

    let stmt = engine
        .import_statement(
            org,
            &actor,
            bank_statement(vec![statement_line(3, dec!(5000.00), None)]),
        )
        .unwrap();

    let report = engine.reconcile(org, stmt.id(), &actor).unwrap();
    assert_eq!(report.newly_matched, 0);
    assert_eq!(report.ambiguous.len(), 1);
    assert_eq!(report.ambiguous[0].candidates.len(), 2);

    // Nothing was recorded on the statement.
    let matched = engine
        .store()
        .read_org(org, |tx| {
            Ok(tx
                .statement(stmt.id())
                .map(|s| s.matched_entry_ids().len())
                .unwrap_or_default())
        })
        .unwrap();
    assert_eq!(matched, 0);
}

#[test]
fn an_entry_is_consumed_by_at_most_one_line_per_statement() {
    let (engine, org, actor) = setup();

    let inv = engine
        .create_draft(&actor, usd_draft(org, "INV-013", dec!(100), date(3, 2)))
        .unwrap();
    engine.post(org, inv.id(), &actor, "key-013").unwrap();

    // Two statement lines both fit the single posted entry; the first (by
    // tx date) consumes it, the second stays unmatched.
    let stmt = engine
        .import_statement(
            org,
            &actor,
            bank_statement(vec![
                statement_line(2, dec!(5000.00), Some("INV-013")),
                statement_line(3, dec!(5000.00), Some("INV-013")),
            ]),
        )
        .unwrap();

    let report = engine.reconcile(org, stmt.id(), &actor).unwrap();
    assert_eq!(report.newly_matched, 1);
    assert_eq!(report.unmatched.len(), 1);
}

#[test]
fn reversed_entries_are_not_reconciliation_candidates() {
    let (engine, org, actor) = setup();

    let inv = engine
        .create_draft(&actor, usd_draft(org, "INV-017", dec!(100), date(3, 2)))
        .unwrap();
    engine.post(org, inv.id(), &actor, "key-017").unwrap();
    engine
        .reverse(org, inv.id(), &actor, "cancelled order")
        .unwrap();

    // The line fits the cancelled entry on amount, window and reference,
    // but a reversed entry no longer has a financial effect to match.
    let stmt = engine
        .import_statement(
            org,
            &actor,
            bank_statement(vec![statement_line(3, dec!(5000.00), Some("INV-017"))]),
        )
        .unwrap();

    let report = engine.reconcile(org, stmt.id(), &actor).unwrap();
    assert_eq!(report.newly_matched, 0);
    assert_eq!(report.unmatched.len(), 1);
    assert!(report.ambiguous.is_empty());
    assert!(report.matched.is_empty());
}

#[test]
fn chain_breaks_bump_the_org_counter() {
    let (engine, org, actor) = setup();

    let draft = engine
        .create_draft(&actor, usd_draft(org, "INV-018", dec!(100), date(3, 2)))
        .unwrap();
    engine.post(org, draft.id(), &actor, "key-018").unwrap();
    assert!(engine.verify_audit_chain(org).unwrap().ok);

    // The tail check validates linkage, not content hashes, so a record
    // altered after hashing slips past the append and corrupts the chain.
    engine
        .store()
        .with_org(org, |tx| {
            let mut record = tally_audit::AuditRecord::chained(
                org,
                tx.audit_tail(),
                tally_audit::NewAuditRecord::new(
                    "journal_entry",
                    "x",
                    "posted",
                    serde_json::json!({"reference": "INV-018"}),
                    ActorId::new(),
                ),
                chrono::Utc::now(),
            );
            record.payload = serde_json::json!({"reference": "INV-999"});
            tx.append_audit(record)
        })
        .unwrap();

    let status = engine.verify_audit_chain(org).unwrap();
    assert!(!status.ok);
    engine.verify_audit_chain(org).unwrap();

    let breaks = engine
        .store()
        .read_org(org, |tx| Ok(tx.chain_break_count()))
        .unwrap();
    assert_eq!(breaks, 2);
}

#[test]
fn tampering_breaks_chain_verification_at_the_edit_point() {
    let (engine, org, actor) = setup();

    let draft = engine
        .create_draft(&actor, usd_draft(org, "INV-014", dec!(100), date(3, 2)))
        .unwrap();
    engine.post(org, draft.id(), &actor, "key-014").unwrap();
    engine.reverse(org, draft.id(), &actor, "tamper test").unwrap();
    assert!(engine.verify_audit_chain(org).unwrap().ok);

    // The storage trait exposes no way to edit a record, so corrupt a copy
    // and verify against it directly.
    let mut records = engine
        .store()
        .read_org(org, |tx| Ok(tx.audit_records().to_vec()))
        .unwrap();
    assert!(records.len() >= 2);
    records[0].payload = serde_json::json!({"total_debit": "999999"});
    assert!(tally_audit::verify_chain(&records).is_err());
}

#[test]
fn purging_old_keys_keeps_recent_reservations() {
    let (engine, org, actor) = setup();

    let draft = engine
        .create_draft(&actor, usd_draft(org, "INV-015", dec!(100), date(3, 2)))
        .unwrap();
    engine.post(org, draft.id(), &actor, "key-015").unwrap();

    // Nothing is older than a day yet.
    assert_eq!(
        engine.purge_idempotency_keys(org, Duration::days(1)).unwrap(),
        0
    );
    // Everything is older than "zero seconds ago".
    assert_eq!(
        engine
            .purge_idempotency_keys(org, Duration::seconds(0))
            .unwrap(),
        1
    );

    // The key is gone, so a replay of it re-posts; the entry is already
    // posted, which surfaces as a conflict rather than a silent double post.
    let err = engine.post(org, draft.id(), &actor, "key-015").unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyPosted(_)));
}

#[test]
fn operations_on_an_unknown_org_fail_cleanly() {
    let (engine, _, actor) = setup();
    let ghost = OrgId::new();
    let err = engine
        .create_draft(&actor, usd_draft(ghost, "INV-016", dec!(10), date(3, 2)))
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}
