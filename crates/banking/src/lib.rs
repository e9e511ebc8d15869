//! Bank statement domain model and match heuristics.
//!
//! Statements are externally sourced facts; the engine never edits their
//! monetary content, only the match outcome fields. Pure domain logic only.

pub mod matching;
pub mod statement;

pub use matching::{MatchCandidate, MatchConfig, MatchOutcome, select_candidate, token_overlap};
pub use statement::{BankStatement, BankStatementLine, StatementImport, StatementLineImport};
