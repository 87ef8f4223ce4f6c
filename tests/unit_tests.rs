//! Cross-module tests that exercise `config::parse_pattern` feeding directly
//! into `matcher::engine::run`, the shape each in-module `#[cfg(test)]`
//! block doesn't already cover on its own.

use rgmatch::config::parse_pattern;
use rgmatch::matcher::engine;
use rgmatch::types::MatchFailure;
use std::io::Write;

fn write_dict(contents: &str) -> tempfile::NamedTempFile {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    write!(f, "{}", contents).unwrap();
    f
}

// -------------------------------------------------------------------------
// End-to-end: pattern string -> engine run, covering spec.md's S1-S6
// scenarios through the actual CLI parsing path rather than hand-built
// Pattern values.
// -------------------------------------------------------------------------

#[test]
fn test_s1_constant_only_pattern_through_config() {
    let pattern = parse_pattern("p", "[ACGT]", "0", None).unwrap();
    let out = engine::run(&pattern, "r1", "ACGT", None, false).unwrap();
    assert_eq!(out.demuxed.canonical_ids, vec!["ACGT".to_string()]);
    assert_eq!(out.score_sum, 0);
}

#[test]
fn test_s2_variable_pattern_through_config_corrects_one_mismatch() {
    let dict = write_dict("AAAA,CCCC,GGGG,TTTT\n");
    let pattern = parse_pattern("p", "[NNNN]", "1", Some(dict.path())).unwrap();
    let out = engine::run(&pattern, "r1", "AAAT", None, false).unwrap();
    assert_eq!(out.demuxed.canonical_ids, vec!["AAAA".to_string()]);
    assert_eq!(out.score_sum, 1);
}

#[test]
fn test_s3_ambiguous_variable_rejected_through_config() {
    let dict = write_dict("AAAA,CCCC,GGGG,TTTT\n");
    let pattern = parse_pattern("p", "[NNNN]", "2", Some(dict.path())).unwrap();
    let err = engine::run(&pattern, "r1", "AACC", None, false).unwrap_err();
    assert_eq!(err, MatchFailure::Ambiguous(0));
}

#[test]
fn test_s4_wildcard_payload_pattern_through_config() {
    let pattern = parse_pattern("p", "[ACGT][XXX][TTTT]", "0,0,0", None).unwrap();
    let out = engine::run(&pattern, "r1", "ACGTGGGGTTTT", None, false).unwrap();
    assert_eq!(
        out.demuxed.canonical_ids,
        vec!["ACGT".to_string(), "GGGG".to_string(), "TTTT".to_string()]
    );
    assert!(pattern.contains_payload);
    assert_eq!(out.demuxed.payload.unwrap().sequence, "GGGG");
}

#[test]
fn test_multi_variable_segments_consume_dictionary_lines_in_order() {
    let dict = write_dict("AAAA,CCCC\nGGGG,TTTT\n");
    let pattern = parse_pattern("p", "[NNNN][NNNN]", "0,0", Some(dict.path())).unwrap();
    let out = engine::run(&pattern, "r1", "CCCCGGGG", None, false).unwrap();
    assert_eq!(
        out.demuxed.canonical_ids,
        vec!["CCCC".to_string(), "GGGG".to_string()]
    );
}

#[test]
fn test_truncated_read_reported_as_truncated_not_unmatched() {
    let pattern = parse_pattern("p", "[ACGT][ACGT]", "0,0", None).unwrap();
    let err = engine::run(&pattern, "r1", "AC", None, false).unwrap_err();
    assert_eq!(err, MatchFailure::TruncatedRead);
}

#[test]
fn test_analyse_unmapped_records_no_stats_for_partial_read() {
    let pattern = parse_pattern("p", "[ACGT][TTTT]", "0,0", None).unwrap();
    let out = engine::run(&pattern, "r1", "ACGTAAAA", None, true).unwrap();
    assert_eq!(out.demuxed.canonical_ids[0], "ACGT");
    assert!(out.demuxed.canonical_ids[1].is_empty());
}

// -------------------------------------------------------------------------
// Paired mismatch-budget validation errors surfaced through the full
// config::parse_pattern entry point (not exercised by config.rs's own
// inline tests, which check each failure independently).
// -------------------------------------------------------------------------

#[test]
fn test_pattern_with_mixed_constant_variable_and_wildcard_segments() {
    let dict = write_dict("AAAA,CCCC\n");
    let pattern = parse_pattern("p", "[ACGT][NNNN][XX][TTTT]", "0,1,0,0", Some(dict.path())).unwrap();
    assert_eq!(pattern.segments.len(), 4);
    let out = engine::run(&pattern, "r1", "ACGTAAAAGGTTTT", None, false).unwrap();
    assert_eq!(out.demuxed.canonical_ids[0], "ACGT");
    assert_eq!(out.demuxed.canonical_ids[1], "AAAA");
    assert_eq!(out.demuxed.canonical_ids[2], "GG");
    assert_eq!(out.demuxed.canonical_ids[3], "TTTT");
}
