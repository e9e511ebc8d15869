//! General ledger domain model (double-entry journal).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod account;
pub mod entry;

pub use account::{Account, AccountType};
pub use entry::{EntryDraft, EntryStatus, JournalEntry, JournalLine, LineDraft};
