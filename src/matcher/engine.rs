//! PatternEngine: drive segmentation of a whole read through an ordered
//! Pattern, managing offset, wildcard deferral, and length-drift carry.

use crate::types::{DemultiplexedRead, MatchFailure, Pattern, Payload, Segment};

use super::segment::{match_segment, MatchOutcome};

/// Maximum number of bases the matcher probes to either side of the
/// expected offset, whether that slack comes from a preceding wildcard or
/// from a length delta carried out of the previous segment: an absorbed
/// deletion needs a probe to the left, an absorbed insertion needs one to
/// the right. Kept at a fixed ceiling of 2 until a reference dataset says
/// otherwise.
const MAX_DRIFT: usize = 2;

/// One segment's contribution to the per-barcode mismatch histograms:
/// its canonical id, the score it matched at, and its configured budget.
pub struct SegmentHit {
    pub canonical_id: String,
    pub score: usize,
    pub budget: usize,
}

/// Everything PatternEngine produces for one successfully (or, under
/// "analyse unmapped", partially) segmented read.
pub struct EngineOutput {
    pub demuxed: DemultiplexedRead,
    pub score_sum: usize,
    pub hits: Vec<SegmentHit>,
    pub multi_barcode: bool,
}

/// Segment a read against `pattern`.
///
/// Under `analyse_unmapped = false` (the default), the first segment that
/// fails to match or that resolves ambiguously aborts the read with a
/// [`MatchFailure`]. Under `analyse_unmapped = true`, failures leave an
/// empty canonical id in that position and segmentation continues, and no
/// statistics are recorded for reads processed this way: callers must skip
/// `hits`/`multi_barcode`/`score_sum` bookkeeping entirely when this flag is
/// set; this function still returns them, but the caller silently discards
/// them.
pub fn run(
    pattern: &Pattern,
    read_name: &str,
    sequence: &str,
    quality: Option<&str>,
    analyse_unmapped: bool,
) -> Result<EngineOutput, MatchFailure> {
    let mut offset: usize = 0;
    let mut score_sum: usize = 0;
    let mut length_delta_carry: usize = 0;
    let mut canonical_ids: Vec<String> = Vec::with_capacity(pattern.segments.len());
    let mut hits: Vec<SegmentHit> = Vec::new();
    let mut multi_barcode = false;
    let mut payload: Option<Payload> = None;

    // Absolute offset where the current (possibly multi-segment) run of
    // wildcards began, and the canonical_ids slot it will backfill.
    let mut pending_wildcard_start: Option<usize> = None;
    let mut pending_wildcard_slot: Option<usize> = None;

    for (i, segment) in pattern.segments.iter().enumerate() {
        if let Segment::Wildcard { length } = segment {
            if pending_wildcard_start.is_none() {
                pending_wildcard_start = Some(offset);
                pending_wildcard_slot = Some(canonical_ids.len());
                canonical_ids.push(String::new());
            }
            offset += length;
            continue;
        }

        if offset >= sequence.len() {
            if analyse_unmapped {
                for _ in i..pattern.segments.len() {
                    canonical_ids.push(String::new());
                }
                break;
            }
            return Err(MatchFailure::TruncatedRead);
        }

        let drift = if pending_wildcard_start.is_some() || length_delta_carry > 0 {
            MAX_DRIFT
        } else {
            0
        };

        match match_segment(segment, sequence, offset, drift) {
            MatchOutcome::Matched(result) => {
                score_sum += result.score;
                length_delta_carry = result.length_delta;

                if let (Some(wc_start), Some(slot)) =
                    (pending_wildcard_start.take(), pending_wildcard_slot.take())
                {
                    let wildcard_seq = sequence[wc_start..result.start].to_string();
                    if pattern.contains_payload {
                        payload = Some(Payload {
                            sequence: wildcard_seq.clone(),
                            quality: quality.map(|q| q[wc_start..result.start].to_string()),
                        });
                    }
                    canonical_ids[slot] = wildcard_seq;
                }

                hits.push(SegmentHit {
                    canonical_id: result.canonical_id.clone(),
                    score: result.score,
                    budget: segment.mismatches(),
                });
                canonical_ids.push(result.canonical_id);
                offset = result.end;
            }
            MatchOutcome::Ambiguous => {
                multi_barcode = true;
                if analyse_unmapped {
                    canonical_ids.push(String::new());
                    continue;
                }
                return Err(MatchFailure::Ambiguous(i));
            }
            MatchOutcome::Unmatched => {
                if analyse_unmapped {
                    canonical_ids.push(String::new());
                    continue;
                }
                return Err(MatchFailure::SegmentUnmatched(i));
            }
        }
    }

    if let (Some(wc_start), Some(slot)) = (pending_wildcard_start.take(), pending_wildcard_slot.take())
    {
        let wildcard_seq = sequence[wc_start..sequence.len()].to_string();
        if pattern.contains_payload {
            payload = Some(Payload {
                sequence: wildcard_seq.clone(),
                quality: quality.map(|q| q[wc_start..sequence.len()].to_string()),
            });
        }
        canonical_ids[slot] = wildcard_seq;
    }

    Ok(EngineOutput {
        demuxed: DemultiplexedRead {
            read_name: read_name.to_string(),
            canonical_ids,
            payload,
        },
        score_sum,
        hits,
        multi_barcode,
    })
}
