//! Core data structures for barcode pattern matching.
//!
//! This module contains the fundamental types shared by the matcher,
//! the worker pool, and the output sink.

use std::fmt;

use crate::matcher::dictionary::DictionaryIndex;

/// A sequencing read: its identifier, sequence, and optional quality string.
///
/// Quality is payload metadata only; it is never consulted during matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    pub name: String,
    pub sequence: String,
    pub quality: Option<String>,
}

impl Read {
    pub fn new(name: String, sequence: String, quality: Option<String>) -> Self {
        Read {
            name,
            sequence,
            quality,
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// One segment of a barcode pattern.
///
/// Invariants (checked at construction by `config::parse_pattern`, not
/// re-checked here): `mismatches < length()` for `Constant`/`Variable`;
/// `Variable` candidates are non-empty, distinct, and share one length;
/// stored sequences are `ACGT`-only.
///
/// `Variable`'s [`DictionaryIndex`] is built once, at pattern construction,
/// and shared read-only thereafter (§3 Lifecycles); `SegmentMatcher` never
/// rebuilds it per probe or per read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Constant {
        sequence: String,
        mismatches: usize,
    },
    Variable {
        dictionary: DictionaryIndex,
        mismatches: usize,
    },
    Wildcard {
        length: usize,
    },
}

impl Segment {
    /// Build a Variable segment, indexing `candidates` once.
    pub fn variable(candidates: Vec<String>, mismatches: usize) -> Self {
        Segment::Variable {
            dictionary: DictionaryIndex::new(candidates),
            mismatches,
        }
    }

    /// Expected window length of this segment, absent any indel drift.
    pub fn length(&self) -> usize {
        match self {
            Segment::Constant { sequence, .. } => sequence.len(),
            Segment::Variable { dictionary, .. } => dictionary.candidate_length(),
            Segment::Wildcard { length } => *length,
        }
    }

    pub fn mismatches(&self) -> usize {
        match self {
            Segment::Constant { mismatches, .. } => *mismatches,
            Segment::Variable { mismatches, .. } => *mismatches,
            Segment::Wildcard { .. } => 0,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Segment::Wildcard { .. })
    }
}

/// The outcome of matching one Segment against a read window.
///
/// `start`/`end` are absolute offsets into the read (end exclusive).
/// `score` is the edit distance, `m + 1` meaning "exceeded budget".
/// `length_delta` is `len(canonical) - (end - start)`, clamped to `>= 0`,
/// and carries forward as the probing slack for the next segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub start: usize,
    pub end: usize,
    pub score: usize,
    pub canonical_id: String,
    pub length_delta: usize,
}

/// An ordered arrangement of segments, parsed once from configuration and
/// shared read-only across workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub name: String,
    pub segments: Vec<Segment>,
    pub contains_payload: bool,
}

impl Pattern {
    pub fn new(name: String, segments: Vec<Segment>) -> Self {
        let contains_payload = segments.iter().any(Segment::is_wildcard);
        Pattern {
            name,
            segments,
            contains_payload,
        }
    }
}

/// The non-barcode portion of a read, extracted from a Wildcard segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub sequence: String,
    pub quality: Option<String>,
}

/// One fully (or partially, in "analyse unmapped" mode) segmented read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemultiplexedRead {
    pub read_name: String,
    /// One canonical id per pattern segment, in pattern order. Empty string
    /// marks a segment left unresolved under "analyse unmapped" mode.
    pub canonical_ids: Vec<String>,
    pub payload: Option<Payload>,
}

/// Why a read failed to segment against a Pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchFailure {
    TruncatedRead,
    SegmentUnmatched(usize),
    /// A Variable segment's dictionary lookup landed on two or more
    /// candidates within budget. Kept distinct from `SegmentUnmatched` so
    /// callers can credit `multi_barcode` instead of `no_matches` (§4.4).
    Ambiguous(usize),
}

impl fmt::Display for MatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchFailure::TruncatedRead => write!(f, "truncated read"),
            MatchFailure::SegmentUnmatched(i) => write!(f, "segment {} unmatched", i),
            MatchFailure::Ambiguous(i) => write!(f, "segment {} ambiguous", i),
        }
    }
}

impl std::error::Error for MatchFailure {}
