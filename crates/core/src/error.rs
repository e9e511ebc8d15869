//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::id::EntryId;

/// Result type used across the ledger.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-level error.
///
/// Validation and state-conflict variants are recoverable by the caller;
/// `Storage` wraps failures at the persistence boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Debits and credits do not net to zero in the transaction currency.
    #[error("unbalanced entry: debit {debit}, credit {credit}")]
    Unbalanced { debit: Decimal, credit: Decimal },

    /// A line references an account unknown to the organization.
    #[error("invalid account: {0}")]
    InvalidAccount(String),

    /// A line targets a group (aggregation) account.
    #[error("group account cannot be posted to: {0}")]
    GroupAccountPosting(String),

    /// The fx rate is not usable for posting (zero, negative, or not 1 for
    /// a base-currency entry).
    #[error("invalid fx rate: {0}")]
    InvalidRate(Decimal),

    /// Two amounts in different currencies were combined without conversion.
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    /// The entry is not in draft state.
    #[error("entry {0} is already posted")]
    AlreadyPosted(EntryId),

    /// The entry already has a reversal linked.
    #[error("entry {0} is already reversed")]
    AlreadyReversed(EntryId),

    /// The operation requires a posted entry.
    #[error("entry {0} is not posted")]
    NotPosted(EntryId),

    /// A requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller-supplied role authorization was false.
    #[error("unauthorized")]
    Unauthorized,

    /// Failure at the storage boundary (lock poisoning, unknown org).
    #[error("storage: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_account(code: impl Into<String>) -> Self {
        Self::InvalidAccount(code.into())
    }

    pub fn group_account(code: impl Into<String>) -> Self {
        Self::GroupAccountPosting(code.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Signed difference reported for unbalanced entries (debit - credit).
    pub fn unbalanced_delta(&self) -> Option<Decimal> {
        match self {
            Self::Unbalanced { debit, credit } => Some(debit - credit),
            _ => None,
        }
    }
}
