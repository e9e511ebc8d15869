//! Candidate selection heuristics for bank reconciliation.
//!
//! Amount and date filtering happen upstream; this module decides between
//! surviving candidates: highest reference token overlap wins, then earliest
//! posting date, and a remaining tie is reported as ambiguous rather than
//! guessed.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tally_core::EntryId;

/// Reconciliation tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Half-width of the posting-date window around the statement tx date.
    pub window_days: i64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self { window_days: 3 }
    }
}

impl MatchConfig {
    pub fn within_window(&self, tx_date: NaiveDate, posting_date: NaiveDate) -> bool {
        (posting_date - tx_date).num_days().abs() <= self.window_days
    }
}

/// A posted journal entry that passed the amount and window filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchCandidate {
    pub entry_id: EntryId,
    pub posting_date: NaiveDate,
    pub reference: Option<String>,
}

/// Outcome of candidate selection for one statement line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched(EntryId),
    NoCandidate,
    /// More than one candidate survived every tie-break; surfaced, not guessed.
    Ambiguous(Vec<EntryId>),
}

/// Number of distinct tokens shared by the two references.
///
/// Tokens are maximal alphanumeric runs, compared case-insensitively, so
/// "CBE-TEST-1" and "cbe test 1" overlap fully.
pub fn token_overlap(left: &str, right: &str) -> usize {
    fn tokens(s: &str) -> BTreeSet<String> {
        s.split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_ascii_uppercase)
            .collect()
    }
    tokens(left).intersection(&tokens(right)).count()
}

/// Pick the winning candidate for a statement line, if any.
pub fn select_candidate(
    line_reference: Option<&str>,
    candidates: &[MatchCandidate],
) -> MatchOutcome {
    match candidates {
        [] => return MatchOutcome::NoCandidate,
        [only] => return MatchOutcome::Matched(only.entry_id),
        _ => {}
    }

    let score = |candidate: &MatchCandidate| -> usize {
        match (line_reference, candidate.reference.as_deref()) {
            (Some(line_ref), Some(cand_ref)) => token_overlap(line_ref, cand_ref),
            _ => 0,
        }
    };

    let best_score = candidates.iter().map(score).max().unwrap_or(0);
    let by_score: Vec<&MatchCandidate> = candidates
        .iter()
        .filter(|c| score(c) == best_score)
        .collect();
    if let [winner] = by_score.as_slice() {
        return MatchOutcome::Matched(winner.entry_id);
    }

    let earliest = by_score
        .iter()
        .map(|c| c.posting_date)
        .min()
        .unwrap_or_default();
    let by_date: Vec<&&MatchCandidate> = by_score
        .iter()
        .filter(|c| c.posting_date == earliest)
        .collect();
    if let [winner] = by_date.as_slice() {
        return MatchOutcome::Matched(winner.entry_id);
    }

    let mut ids: Vec<EntryId> = by_date.iter().map(|c| c.entry_id).collect();
    ids.sort();
    MatchOutcome::Ambiguous(ids)
}
