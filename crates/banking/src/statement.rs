//! Imported bank statements and their lines.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tally_core::{
    ActorId, Currency, EntryId, LedgerError, LedgerResult, OrgId, StatementId, StatementLineId,
};

/// Caller-supplied content for one statement transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementLineImport {
    pub tx_date: NaiveDate,
    pub description: Option<String>,
    pub amount: Decimal,
    pub balance: Option<Decimal>,
    pub reference: Option<String>,
}

/// Caller-supplied content for a statement import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementImport {
    pub account_code: String,
    pub currency: Currency,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub opening_balance: Decimal,
    pub closing_balance: Decimal,
    pub source: Option<String>,
    pub external_reference: Option<String>,
    pub lines: Vec<StatementLineImport>,
}

/// One externally reported bank transaction.
///
/// Either unmatched, or matched to exactly one journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankStatementLine {
    id: StatementLineId,
    tx_date: NaiveDate,
    description: Option<String>,
    amount: Decimal,
    balance: Option<Decimal>,
    reference: Option<String>,
    matched: bool,
    matched_journal_entry_id: Option<EntryId>,
    matched_at: Option<DateTime<Utc>>,
    matched_by: Option<ActorId>,
}

impl BankStatementLine {
    pub fn id(&self) -> StatementLineId {
        self.id
    }

    pub fn tx_date(&self) -> NaiveDate {
        self.tx_date
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn balance(&self) -> Option<Decimal> {
        self.balance
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn matched(&self) -> bool {
        self.matched
    }

    pub fn matched_journal_entry_id(&self) -> Option<EntryId> {
        self.matched_journal_entry_id
    }

    pub fn matched_at(&self) -> Option<DateTime<Utc>> {
        self.matched_at
    }

    pub fn matched_by(&self) -> Option<ActorId> {
        self.matched_by
    }
}

/// Statement header plus exclusively-owned lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankStatement {
    id: StatementId,
    org_id: OrgId,
    account_code: String,
    currency: Currency,
    period_start: NaiveDate,
    period_end: NaiveDate,
    opening_balance: Decimal,
    closing_balance: Decimal,
    source: Option<String>,
    external_reference: Option<String>,
    created_by: ActorId,
    created_at: DateTime<Utc>,
    lines: Vec<BankStatementLine>,
}

impl BankStatement {
    /// Validate and build a statement from imported content.
    ///
    /// Lines are kept in transaction-date order regardless of input order.
    pub fn import(
        org_id: OrgId,
        import: StatementImport,
        created_by: ActorId,
        now: DateTime<Utc>,
    ) -> LedgerResult<Self> {
        let account_code = import.account_code.trim().to_string();
        if account_code.is_empty() {
            return Err(LedgerError::validation("bank account code is required"));
        }
        if import.period_end < import.period_start {
            return Err(LedgerError::validation("statement period end before start"));
        }

        let mut lines = Vec::with_capacity(import.lines.len());
        for raw in import.lines {
            if raw.amount.is_zero() {
                return Err(LedgerError::validation(
                    "statement line amount must be non-zero",
                ));
            }
            lines.push(BankStatementLine {
                id: StatementLineId::new(),
                tx_date: raw.tx_date,
                description: raw.description,
                amount: raw.amount,
                balance: raw.balance,
                reference: raw.reference,
                matched: false,
                matched_journal_entry_id: None,
                matched_at: None,
                matched_by: None,
            });
        }
        lines.sort_by_key(|l| (l.tx_date, l.id));

        Ok(Self {
            id: StatementId::new(),
            org_id,
            account_code,
            currency: import.currency,
            period_start: import.period_start,
            period_end: import.period_end,
            opening_balance: import.opening_balance,
            closing_balance: import.closing_balance,
            source: import.source,
            external_reference: import.external_reference,
            created_by,
            created_at: now,
            lines,
        })
    }

    pub fn id(&self) -> StatementId {
        self.id
    }

    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    pub fn account_code(&self) -> &str {
        &self.account_code
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn period_start(&self) -> NaiveDate {
        self.period_start
    }

    pub fn period_end(&self) -> NaiveDate {
        self.period_end
    }

    pub fn opening_balance(&self) -> Decimal {
        self.opening_balance
    }

    pub fn closing_balance(&self) -> Decimal {
        self.closing_balance
    }

    pub fn lines(&self) -> &[BankStatementLine] {
        &self.lines
    }

    /// Journal entries already consumed by a line of this statement.
    pub fn matched_entry_ids(&self) -> Vec<EntryId> {
        self.lines
            .iter()
            .filter_map(|l| l.matched_journal_entry_id)
            .collect()
    }

    /// Record a match outcome on one line.
    ///
    /// Enforces both uniqueness rules: a line is matched at most once, and a
    /// journal entry is the target of at most one line of this statement.
    pub fn record_match(
        &mut self,
        line_id: StatementLineId,
        entry_id: EntryId,
        actor: ActorId,
        now: DateTime<Utc>,
    ) -> LedgerResult<()> {
        if self.matched_entry_ids().contains(&entry_id) {
            return Err(LedgerError::validation(format!(
                "journal entry {entry_id} already matched on statement {}",
                self.id
            )));
        }
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or_else(|| LedgerError::not_found(format!("statement line {line_id}")))?;
        if line.matched {
            return Err(LedgerError::validation(format!(
                "statement line {line_id} already matched"
            )));
        }
        line.matched = true;
        line.matched_journal_entry_id = Some(entry_id);
        line.matched_at = Some(now);
        line.matched_by = Some(actor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn etb() -> Currency {
        Currency::new("ETB", 2).unwrap()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
    }

    fn import_with_lines(lines: Vec<StatementLineImport>) -> StatementImport {
        StatementImport {
            account_code: "BANK-ETB-CBE-001".to_string(),
            currency: etb(),
            period_start: date(1),
            period_end: date(30),
            opening_balance: dec!(0),
            closing_balance: dec!(500),
            source: Some("UPLOAD".to_string()),
            external_reference: None,
            lines,
        }
    }

    fn line(d: u32, amount: Decimal) -> StatementLineImport {
        StatementLineImport {
            tx_date: date(d),
            description: None,
            amount,
            balance: None,
            reference: None,
        }
    }

    #[test]
    fn import_sorts_lines_by_tx_date() {
        let stmt = BankStatement::import(
            OrgId::new(),
            import_with_lines(vec![line(20, dec!(100)), line(3, dec!(400))]),
            ActorId::new(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(stmt.lines()[0].tx_date(), date(3));
        assert_eq!(stmt.lines()[1].tx_date(), date(20));
    }

    #[test]
    fn import_rejects_bad_input() {
        let mut bad_period = import_with_lines(vec![]);
        bad_period.period_end = date(1);
        bad_period.period_start = date(30);
        assert!(BankStatement::import(OrgId::new(), bad_period, ActorId::new(), Utc::now()).is_err());

        let zero_amount = import_with_lines(vec![line(2, dec!(0))]);
        assert!(BankStatement::import(OrgId::new(), zero_amount, ActorId::new(), Utc::now()).is_err());

        let mut blank_account = import_with_lines(vec![]);
        blank_account.account_code = "  ".to_string();
        assert!(
            BankStatement::import(OrgId::new(), blank_account, ActorId::new(), Utc::now()).is_err()
        );
    }

    #[test]
    fn a_journal_entry_is_consumed_at_most_once_per_statement() {
        let mut stmt = BankStatement::import(
            OrgId::new(),
            import_with_lines(vec![line(2, dec!(100)), line(3, dec!(100))]),
            ActorId::new(),
            Utc::now(),
        )
        .unwrap();

        let entry = EntryId::new();
        let first = stmt.lines()[0].id();
        let second = stmt.lines()[1].id();

        stmt.record_match(first, entry, ActorId::new(), Utc::now()).unwrap();
        assert!(stmt.record_match(second, entry, ActorId::new(), Utc::now()).is_err());

        // And a line is matched at most once.
        assert!(stmt.record_match(first, EntryId::new(), ActorId::new(), Utc::now()).is_err());
    }
}
