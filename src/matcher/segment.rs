//! SegmentMatcher: align one pattern Segment against a read window.

use crate::types::{MatchResult, Segment};

use super::dictionary::Lookup;
use super::distance::distance;

/// Outcome of matching one non-wildcard Segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched(MatchResult),
    /// Best probe hit a tie in the dictionary; the read is rejected and
    /// `multi_barcode` is incremented by the caller.
    Ambiguous,
    /// No probe met the mismatch budget.
    Unmatched,
}

/// Sort key for picking the best probe: smaller score first, then window
/// length equal to the segment's nominal length, then smaller length.
type ProbeKey = (usize, usize, usize);

fn probe_key(score: usize, probed_len: usize, nominal: usize) -> ProbeKey {
    let len_rank = if probed_len == nominal { 0 } else { 1 };
    (score, len_rank, probed_len)
}

/// Start positions to probe around `offset`: `offset` itself, then
/// `offset-d` and `offset+d` for `d` in `1..=drift`, both directions —
/// a wildcard or an earlier segment's length delta can leave the true
/// anchor either side of the expected offset (an absorbed deletion pulls
/// it left, an absorbed insertion pushes it right).
fn probe_starts(offset: usize, drift: usize) -> Vec<usize> {
    let mut starts = vec![offset];
    for d in 1..=drift {
        if let Some(s) = offset.checked_sub(d) {
            starts.push(s);
        }
        starts.push(offset + d);
    }
    starts
}

fn probe_lengths(nominal: usize) -> Vec<usize> {
    let mut lens = Vec::with_capacity(3);
    if nominal > 0 {
        lens.push(nominal - 1);
    }
    lens.push(nominal);
    lens.push(nominal + 1);
    lens
}

/// Attempt to align `segment` (never a Wildcard; the caller defers those)
/// starting at `offset`, probing window lengths `{len-1, len, len+1}` and,
/// if `drift > 0`, start positions `offset-drift .. offset+drift` as well
/// (absorbing drift carried in from a preceding wildcard or a length delta
/// from an earlier segment: an absorbed deletion pulls the anchor left of
/// `offset`, an absorbed insertion pushes it right).
///
/// Across every probe that meets the mismatch budget, the lowest-keyed one
/// wins: smaller score first, then window length equal to the segment's
/// nominal length, then smaller length. If the winning key is produced by
/// an ambiguous dictionary probe, the whole match is reported ambiguous
/// even if some worse-keyed probe happened to be unique.
pub fn match_segment(
    segment: &Segment,
    read: &str,
    offset: usize,
    drift: usize,
) -> MatchOutcome {
    debug_assert!(
        !segment.is_wildcard(),
        "SegmentMatcher is never called for Wildcard segments"
    );

    let nominal = segment.length();
    let budget = segment.mismatches();
    let read_len = read.len();

    let mut best_key: Option<ProbeKey> = None;
    let mut best_matched: Option<MatchResult> = None;
    let mut best_is_ambiguous = false;

    for start in probe_starts(offset, drift) {
        for len in probe_lengths(nominal) {
            let end = match start.checked_add(len) {
                Some(end) if end <= read_len => end,
                _ => continue,
            };
            let window = &read[start..end];

            let outcome: Option<(ProbeKey, Option<String>)> = match segment {
                Segment::Constant { sequence, .. } => {
                    let score = distance(window, sequence);
                    if score <= budget {
                        Some((probe_key(score, len, nominal), Some(sequence.clone())))
                    } else {
                        None
                    }
                }
                Segment::Variable { dictionary, .. } => match dictionary.lookup(window, budget) {
                    Lookup::Unique(canonical_id, score) => {
                        Some((probe_key(score, len, nominal), Some(canonical_id)))
                    }
                    Lookup::Ambiguous(score) => Some((probe_key(score, len, nominal), None)),
                    Lookup::NoMatch => None,
                },
                Segment::Wildcard { .. } => unreachable!(),
            };

            if let Some((key, canonical_id)) = outcome {
                if should_replace(best_key, key) {
                    best_key = Some(key);
                    best_is_ambiguous = canonical_id.is_none();
                    best_matched = canonical_id.map(|canonical_id| MatchResult {
                        start,
                        end,
                        score: key.0,
                        canonical_id,
                        length_delta: nominal.saturating_sub(len),
                    });
                }
            }
        }
    }

    match (best_key, best_is_ambiguous, best_matched) {
        (None, _, _) => MatchOutcome::Unmatched,
        (Some(_), true, _) => MatchOutcome::Ambiguous,
        (Some(_), false, Some(result)) => MatchOutcome::Matched(result),
        (Some(_), false, None) => unreachable!("non-ambiguous best probe always carries a result"),
    }
}

fn should_replace(current: Option<ProbeKey>, candidate: ProbeKey) -> bool {
    match current {
        None => true,
        Some(current) => candidate < current,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_exact_match() {
        let segment = Segment::Constant {
            sequence: "ACGT".to_string(),
            mismatches: 0,
        };
        let outcome = match_segment(&segment, "ACGTTTTT", 0, 0);
        assert_eq!(
            outcome,
            MatchOutcome::Matched(MatchResult {
                start: 0,
                end: 4,
                score: 0,
                canonical_id: "ACGT".to_string(),
                length_delta: 0,
            })
        );
    }

    #[test]
    fn test_constant_absorbs_insertion() {
        // read has a 1-base insertion before the anchor; probing length+1
        // at the nominal offset should still find it.
        let segment = Segment::Constant {
            sequence: "TTTT".to_string(),
            mismatches: 0,
        };
        let outcome = match_segment(&segment, "ACGTGTTTT", 4, 0);
        match outcome {
            MatchOutcome::Matched(result) => {
                assert_eq!(result.canonical_id, "TTTT");
                assert_eq!(result.score, 0);
            }
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_window_is_unmatched() {
        let segment = Segment::Constant {
            sequence: "ACGT".to_string(),
            mismatches: 0,
        };
        let outcome = match_segment(&segment, "AC", 0, 0);
        assert_eq!(outcome, MatchOutcome::Unmatched);
    }

    #[test]
    fn test_variable_unique_match() {
        let segment = Segment::variable(vec!["AAAA".to_string(), "CCCC".to_string()], 1);
        let outcome = match_segment(&segment, "AAAT", 0, 0);
        match outcome {
            MatchOutcome::Matched(result) => {
                assert_eq!(result.canonical_id, "AAAA");
                assert_eq!(result.score, 1);
            }
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn test_variable_ambiguous_returns_ambiguous_outcome() {
        let segment = Segment::variable(vec!["AAAA".to_string(), "CCCC".to_string()], 2);
        let outcome = match_segment(&segment, "AACC", 0, 0);
        assert_eq!(outcome, MatchOutcome::Ambiguous);
    }

    #[test]
    fn test_left_drift_probes_earlier_start() {
        // Offset is 2 past the true anchor start; with drift=2 the matcher
        // should still find the segment to the left.
        let segment = Segment::Constant {
            sequence: "ACGT".to_string(),
            mismatches: 0,
        };
        let outcome = match_segment(&segment, "ACGTTTTT", 2, 2);
        match outcome {
            MatchOutcome::Matched(result) => {
                assert_eq!(result.start, 0);
                assert_eq!(result.canonical_id, "ACGT");
            }
            other => panic!("expected a match, got {:?}", other),
        }
    }

    #[test]
    fn test_right_drift_probes_later_start() {
        // Offset is 2 short of the true anchor start (an absorbed insertion
        // upstream pushed the anchor right); with drift=2 the matcher
        // should still find it.
        let segment = Segment::Constant {
            sequence: "TTTT".to_string(),
            mismatches: 0,
        };
        let outcome = match_segment(&segment, "ACGGTTTT", 2, 2);
        match outcome {
            MatchOutcome::Matched(result) => {
                assert_eq!(result.start, 4);
                assert_eq!(result.canonical_id, "TTTT");
            }
            other => panic!("expected a match, got {:?}", other),
        }
    }
}
