//! Journal entries and lines: one atomic financial event each.
//!
//! An entry owns its lines for their whole lifecycle. Draft entries may be
//! edited or deleted; once posted, the monetary content is immutable and the
//! only further transition is to `reversed` through a separate mirror entry.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tally_core::{
    ActorId, Currency, CurrencyConverter, EntryId, FxRate, LedgerError, LedgerResult, LineId,
    Money, OrgId,
};

/// Journal entry lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Draft,
    Posted,
    Reversed,
}

/// Caller-supplied line content for a draft entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDraft {
    pub account_code: String,
    pub description: Option<String>,
    pub debit: Decimal,
    pub credit: Decimal,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
}

impl LineDraft {
    pub fn debit(account_code: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account_code: account_code.into(),
            description: None,
            debit: amount,
            credit: Decimal::ZERO,
            source_type: None,
            source_id: None,
        }
    }

    pub fn credit(account_code: impl Into<String>, amount: Decimal) -> Self {
        Self {
            account_code: account_code.into(),
            description: None,
            debit: Decimal::ZERO,
            credit: amount,
            source_type: None,
            source_id: None,
        }
    }
}

/// Caller-supplied content for a draft entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub org_id: OrgId,
    pub journal_code: String,
    pub reference: Option<String>,
    pub description: Option<String>,
    pub currency: Currency,
    pub fx_rate: FxRate,
    pub document_date: NaiveDate,
    pub posting_date: NaiveDate,
    pub lines: Vec<LineDraft>,
}

/// One side of a journal entry.
///
/// Base-currency amounts stay zero until the parent entry is posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    id: LineId,
    account_code: String,
    description: Option<String>,
    debit: Decimal,
    credit: Decimal,
    debit_base: Decimal,
    credit_base: Decimal,
    source_type: Option<String>,
    source_id: Option<String>,
}

impl JournalLine {
    pub fn id(&self) -> LineId {
        self.id
    }

    pub fn account_code(&self) -> &str {
        &self.account_code
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn debit(&self) -> Decimal {
        self.debit
    }

    pub fn credit(&self) -> Decimal {
        self.credit
    }

    pub fn debit_base(&self) -> Decimal {
        self.debit_base
    }

    pub fn credit_base(&self) -> Decimal {
        self.credit_base
    }

    pub fn source_type(&self) -> Option<&str> {
        self.source_type.as_deref()
    }

    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    /// Signed transaction-currency amount (debit - credit).
    pub fn net(&self) -> Decimal {
        self.debit - self.credit
    }

    /// Signed base-currency amount (debit_base - credit_base).
    pub fn net_base(&self) -> Decimal {
        self.debit_base - self.credit_base
    }
}

/// Journal entry aggregate: header plus exclusively-owned lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    id: EntryId,
    org_id: OrgId,
    journal_code: String,
    reference: Option<String>,
    description: Option<String>,
    currency: Currency,
    fx_rate: FxRate,
    document_date: NaiveDate,
    posting_date: NaiveDate,
    status: EntryStatus,
    created_by: ActorId,
    created_at: DateTime<Utc>,
    posted_by: Option<ActorId>,
    posted_at: Option<DateTime<Utc>>,
    reversed_of: Option<EntryId>,
    reversed_by: Option<EntryId>,
    lines: Vec<JournalLine>,
}

impl JournalEntry {
    /// Validate and build a draft entry from caller-supplied content.
    ///
    /// Rejects empty line sets, blank account codes, negative amounts and
    /// lines with neither side set. Balance is checked at posting time.
    pub fn new_draft(draft: EntryDraft, created_by: ActorId, now: DateTime<Utc>) -> LedgerResult<Self> {
        if draft.lines.is_empty() {
            return Err(LedgerError::validation("journal entry must have lines"));
        }

        let mut lines = Vec::with_capacity(draft.lines.len());
        for raw in draft.lines {
            let account_code = raw.account_code.trim().to_string();
            if account_code.is_empty() {
                return Err(LedgerError::validation(
                    "account_code is required for each line",
                ));
            }
            if raw.debit.is_sign_negative() || raw.credit.is_sign_negative() {
                return Err(LedgerError::validation("debit/credit must not be negative"));
            }
            if raw.debit.is_zero() && raw.credit.is_zero() {
                return Err(LedgerError::validation("each line must have debit or credit"));
            }
            lines.push(JournalLine {
                id: LineId::new(),
                account_code,
                description: raw.description,
                debit: raw.debit,
                credit: raw.credit,
                debit_base: Decimal::ZERO,
                credit_base: Decimal::ZERO,
                source_type: raw.source_type,
                source_id: raw.source_id,
            });
        }

        let journal_code = draft.journal_code.trim().to_ascii_uppercase();
        Ok(Self {
            id: EntryId::new(),
            org_id: draft.org_id,
            journal_code: if journal_code.is_empty() {
                "GENERAL".to_string()
            } else {
                journal_code
            },
            reference: draft.reference,
            description: draft.description,
            currency: draft.currency,
            fx_rate: draft.fx_rate,
            document_date: draft.document_date,
            posting_date: draft.posting_date,
            status: EntryStatus::Draft,
            created_by,
            created_at: now,
            posted_by: None,
            posted_at: None,
            reversed_of: None,
            reversed_by: None,
            lines,
        })
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn org_id(&self) -> OrgId {
        self.org_id
    }

    pub fn journal_code(&self) -> &str {
        &self.journal_code
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn fx_rate(&self) -> FxRate {
        self.fx_rate
    }

    pub fn document_date(&self) -> NaiveDate {
        self.document_date
    }

    pub fn posting_date(&self) -> NaiveDate {
        self.posting_date
    }

    pub fn status(&self) -> EntryStatus {
        self.status
    }

    pub fn created_by(&self) -> ActorId {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn posted_by(&self) -> Option<ActorId> {
        self.posted_by
    }

    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        self.posted_at
    }

    pub fn reversed_of(&self) -> Option<EntryId> {
        self.reversed_of
    }

    pub fn reversed_by(&self) -> Option<EntryId> {
        self.reversed_by
    }

    pub fn lines(&self) -> &[JournalLine] {
        &self.lines
    }

    pub fn is_editable(&self) -> bool {
        self.status == EntryStatus::Draft
    }

    /// Transaction-currency totals as `Money` (debit, credit).
    pub fn totals(&self) -> LedgerResult<(Money, Money)> {
        let mut debit = Money::zero(self.currency.clone());
        let mut credit = Money::zero(self.currency.clone());
        for line in &self.lines {
            debit = debit.checked_add(&Money::new(line.debit, self.currency.clone()))?;
            credit = credit.checked_add(&Money::new(line.credit, self.currency.clone()))?;
        }
        Ok((debit, credit))
    }

    /// Exact equality of debit and credit totals in the transaction currency.
    pub fn require_balanced(&self) -> LedgerResult<()> {
        let (debit, credit) = self.totals()?;
        if debit.amount() != credit.amount() {
            return Err(LedgerError::Unbalanced {
                debit: debit.amount(),
                credit: credit.amount(),
            });
        }
        Ok(())
    }

    /// Transition draft → posted.
    ///
    /// Checks the fx precondition (rate 1 for base-currency entries), the
    /// balance invariant, and projects each line into the base currency with
    /// per-line half-to-even rounding. Any failure leaves the entry untouched.
    pub fn post(
        &mut self,
        actor: ActorId,
        now: DateTime<Utc>,
        converter: &CurrencyConverter,
    ) -> LedgerResult<()> {
        match self.status {
            EntryStatus::Draft => {}
            EntryStatus::Posted | EntryStatus::Reversed => {
                return Err(LedgerError::AlreadyPosted(self.id));
            }
        }
        if self.currency == *converter.base() && !self.fx_rate.is_unity() {
            return Err(LedgerError::InvalidRate(self.fx_rate.value()));
        }
        self.require_balanced()?;

        let mut projected = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            let debit_base = converter
                .to_base(&Money::new(line.debit, self.currency.clone()), self.fx_rate)?
                .amount();
            let credit_base = converter
                .to_base(&Money::new(line.credit, self.currency.clone()), self.fx_rate)?
                .amount();
            projected.push((debit_base, credit_base));
        }
        for (line, (debit_base, credit_base)) in self.lines.iter_mut().zip(projected) {
            line.debit_base = debit_base;
            line.credit_base = credit_base;
        }

        self.status = EntryStatus::Posted;
        self.posted_by = Some(actor);
        self.posted_at = Some(now);
        Ok(())
    }

    /// Link this posted entry to its reversal and move it to `reversed`.
    pub fn mark_reversed(&mut self, reversal: EntryId) -> LedgerResult<()> {
        if self.reversed_by.is_some() {
            return Err(LedgerError::AlreadyReversed(self.id));
        }
        if self.status != EntryStatus::Posted {
            return Err(LedgerError::NotPosted(self.id));
        }
        self.reversed_by = Some(reversal);
        self.status = EntryStatus::Reversed;
        Ok(())
    }

    /// Record the back-reference on a freshly created mirror entry.
    pub fn link_reversal_of(&mut self, original: EntryId) {
        self.reversed_of = Some(original);
    }

    /// Build the mirror draft for this entry: same currency and fx rate,
    /// every line with debit and credit swapped.
    pub fn reversal_draft(&self, posting_date: NaiveDate, reason: &str) -> EntryDraft {
        let lines = self
            .lines
            .iter()
            .map(|line| LineDraft {
                account_code: line.account_code.clone(),
                description: Some(match line.description() {
                    Some(d) => format!("Reversal of {d}"),
                    None => format!("Reversal of {}", line.account_code),
                }),
                debit: line.credit,
                credit: line.debit,
                source_type: line.source_type.clone(),
                source_id: line.source_id.clone(),
            })
            .collect();

        EntryDraft {
            org_id: self.org_id,
            journal_code: self.journal_code.clone(),
            reference: self.reference.clone(),
            description: Some(format!("Reversal of {}: {reason}", self.id)),
            currency: self.currency.clone(),
            fx_rate: self.fx_rate,
            document_date: posting_date,
            posting_date,
            lines,
        }
    }

    /// Signed base-currency net posted to `account_code` by this entry.
    pub fn net_base_for(&self, account_code: &str) -> Decimal {
        self.lines
            .iter()
            .filter(|l| l.account_code == account_code)
            .map(JournalLine::net_base)
            .sum()
    }

    /// Whether any line touches `account_code`.
    pub fn touches_account(&self, account_code: &str) -> bool {
        self.lines.iter().any(|l| l.account_code == account_code)
    }
}
