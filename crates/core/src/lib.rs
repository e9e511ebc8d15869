//! `tally-core` — ledger foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, the domain error model, fixed-point money and currency
//! conversion.

pub mod error;
pub mod fx;
pub mod id;
pub mod money;

pub use error::{LedgerError, LedgerResult};
pub use fx::{CurrencyConverter, FX_RATE_SCALE, FxRate};
pub use id::{ActorId, EntryId, LineId, OrgId, StatementId, StatementLineId};
pub use money::{Currency, Money};
