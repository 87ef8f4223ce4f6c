//! DictionaryIndex: bounded-mismatch lookup against a variable segment's
//! candidate set, with ambiguity detection.

use ahash::AHashSet;
use indexmap::IndexSet;

use super::distance::distance;

/// Result of probing a dictionary for a query window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Exactly one candidate fell within the mismatch budget.
    Unique(String, usize),
    /// Two or more candidates fell within the mismatch budget, at the given
    /// best score among them.
    Ambiguous(usize),
    /// No candidate fell within the mismatch budget.
    NoMatch,
}

/// Holds the candidate set of one Variable segment and answers bounded
/// mismatch lookups against it.
///
/// A linear scan is sufficient for the candidate set sizes this pattern
/// language produces (one dictionary line per variable segment); no
/// q-gram pre-filtering is implemented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryIndex {
    candidates: IndexSet<String>,
    exact: AHashSet<String>,
}

impl DictionaryIndex {
    pub fn new(candidates: Vec<String>) -> Self {
        let exact: AHashSet<String> = candidates.iter().cloned().collect();
        DictionaryIndex {
            candidates: candidates.into_iter().collect(),
            exact,
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Length shared by every candidate (the segment's nominal length).
    pub fn candidate_length(&self) -> usize {
        self.candidates.get_index(0).map(String::len).unwrap_or(0)
    }

    /// Iterate candidates in construction order.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.candidates.iter()
    }

    /// Look up `window` within `budget` mismatches. `window` may be the
    /// segment's nominal length or one base shorter/longer (the caller
    /// probes those three widths to absorb a single indel).
    pub fn lookup(&self, window: &str, budget: usize) -> Lookup {
        if budget == 0 && window.len() == self.candidates.get_index(0).map(String::len).unwrap_or(0)
        {
            // Exact-match fast path: a zero budget can only ever resolve
            // via an identical candidate, and ambiguity requires a second
            // distinct candidate to also be identical, which the
            // non-empty-and-distinct dictionary invariant rules out.
            if self.exact.contains(window) {
                return Lookup::Unique(window.to_string(), 0);
            }
            return Lookup::NoMatch;
        }

        let mut best_score = usize::MAX;
        let mut best_candidate: Option<&str> = None;
        let mut within_budget = 0usize;

        for candidate in &self.candidates {
            let score = distance(window, candidate);
            if score <= budget {
                within_budget += 1;
                if score < best_score {
                    best_score = score;
                    best_candidate = Some(candidate);
                }
            }
        }

        match within_budget {
            0 => Lookup::NoMatch,
            1 => Lookup::Unique(best_candidate.unwrap().to_string(), best_score),
            _ => Lookup::Ambiguous(best_score),
        }
    }
}
