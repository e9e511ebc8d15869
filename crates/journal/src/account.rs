//! Chart-of-accounts records, read-only to the ledger engine.

use serde::{Deserialize, Serialize};

/// High-level account kind (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
}

/// Account identifier + metadata.
///
/// Group accounts are aggregation nodes and are never posted to directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub code: String, // e.g. "1000"
    pub name: String, // e.g. "Cash"
    pub kind: AccountType,
    pub is_group: bool,
}

impl Account {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        kind: AccountType,
        is_group: bool,
    ) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            kind,
            is_group,
        }
    }

    /// Leaf accounts accept postings; group accounts do not.
    pub fn postable(&self) -> bool {
        !self.is_group
    }
}
