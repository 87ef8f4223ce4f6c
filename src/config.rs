//! Pattern/mismatch/dictionary parsing and run configuration.
//!
//! Parsing follows a fixed validation order so that error messages are
//! deterministic and name the first violated precondition: pattern string,
//! then mismatch list, then dictionary file, then per-segment length checks.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::types::{Pattern, Segment};

/// Run-wide configuration assembled from CLI arguments.
#[derive(Debug, Clone)]
pub struct Config {
    pub pattern: Pattern,
    pub out_path: PathBuf,
    pub threads: usize,
    pub batch_size: usize,
    pub analyse_unmapped: bool,
    pub paired: bool,
}

/// A pattern segment before mismatch budgets and dictionary candidates are
/// attached.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RawSegment {
    Constant(String),
    Variable(usize),
    Wildcard(usize),
}

/// Split a pattern description string into its bracketed segments,
/// classifying each as constant bases, an `N` placeholder, or an `X`
/// wildcard. Mixing character classes within one segment, or whitespace
/// anywhere inside it, is rejected.
fn parse_pattern_segments(pattern: &str) -> Result<Vec<RawSegment>> {
    let mut segments = Vec::new();
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '[' {
            bail!("pattern must be a sequence of bracketed segments, found '{}' outside brackets", c);
        }
        let mut body = String::new();
        loop {
            match chars.next() {
                Some(']') => break,
                Some(ch) => body.push(ch),
                None => bail!("unterminated segment in pattern: missing ']'"),
            }
        }
        if body.is_empty() {
            bail!("empty segment '[]' in pattern");
        }
        if body.chars().any(char::is_whitespace) {
            bail!("whitespace is not allowed inside a pattern segment: '[{}]'", body);
        }

        let upper = body.to_uppercase();
        let all_n = upper.chars().all(|c| c == 'N');
        let all_x = upper.chars().all(|c| c == 'X');
        let all_bases = upper.chars().all(|c| matches!(c, 'A' | 'C' | 'G' | 'T'));

        segments.push(if all_n {
            RawSegment::Variable(upper.len())
        } else if all_x {
            RawSegment::Wildcard(upper.len())
        } else if all_bases {
            RawSegment::Constant(upper)
        } else {
            bail!(
                "segment '[{}]' mixes constant bases, 'N', and 'X': exactly one kind is allowed per segment",
                body
            );
        });
    }

    if segments.is_empty() {
        bail!("pattern contains no segments");
    }

    Ok(segments)
}

/// Parse a comma-separated list of non-negative mismatch budgets, one per
/// segment.
fn parse_mismatches(mismatches: &str, n_segments: usize) -> Result<Vec<usize>> {
    let values: Result<Vec<usize>> = mismatches
        .split(',')
        .map(|tok| {
            tok.trim()
                .parse::<usize>()
                .with_context(|| format!("invalid mismatch value '{}': expected a non-negative integer", tok))
        })
        .collect();
    let values = values?;

    if values.len() != n_segments {
        bail!(
            "mismatch list has {} entries but the pattern has {} segments",
            values.len(),
            n_segments
        );
    }
    Ok(values)
}

/// Parse the dictionary file: one line per variable segment, in order of
/// occurrence, each a comma-separated list of equal-length `ACGT` sequences.
fn parse_dictionary(path: &Path, n_variable: usize) -> Result<Vec<Vec<String>>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read dictionary file: {}", path.display()))?;

    let lines: Vec<Vec<String>> = contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            line.trim()
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .collect()
        })
        .collect();

    if lines.len() != n_variable {
        bail!(
            "dictionary file has {} lines but the pattern has {} variable segments",
            lines.len(),
            n_variable
        );
    }

    for (i, candidates) in lines.iter().enumerate() {
        if candidates.is_empty() || candidates.iter().any(|c| c.is_empty()) {
            bail!("dictionary line {} contains an empty candidate sequence", i + 1);
        }
        let len = candidates[0].len();
        if candidates.iter().any(|c| c.len() != len) {
            bail!(
                "dictionary line {} mixes candidate sequences of different lengths",
                i + 1
            );
        }
        for c in candidates {
            if !c.chars().all(|ch| matches!(ch, 'A' | 'C' | 'G' | 'T')) {
                bail!("dictionary line {} contains a non-ACGT base: '{}'", i + 1, c);
            }
        }
        let mut deduped = candidates.clone();
        deduped.sort();
        deduped.dedup();
        if deduped.len() != candidates.len() {
            bail!("dictionary line {} contains duplicate candidate sequences", i + 1);
        }
    }

    Ok(lines)
}

/// Parse and validate a pattern description, mismatch list, and (if needed)
/// dictionary file into an immutable [`Pattern`].
///
/// Validation order: pattern segments, then mismatch count, then dictionary
/// line count and shape, then per-segment `mismatches < length` checks.
pub fn parse_pattern(
    name: &str,
    pattern: &str,
    mismatches: &str,
    dictionary_path: Option<&Path>,
) -> Result<Pattern> {
    let raw_segments = parse_pattern_segments(pattern)?;
    let mismatch_budgets = parse_mismatches(mismatches, raw_segments.len())?;

    let n_variable = raw_segments
        .iter()
        .filter(|s| matches!(s, RawSegment::Variable(_)))
        .count();

    let dictionary_lines = if n_variable > 0 {
        let path = dictionary_path.ok_or_else(|| {
            anyhow::anyhow!("pattern has {} variable segment(s) but no dictionary file was given", n_variable)
        })?;
        parse_dictionary(path, n_variable)?
    } else {
        Vec::new()
    };

    let mut dict_iter = dictionary_lines.into_iter();
    let mut segments = Vec::with_capacity(raw_segments.len());

    for (raw, m) in raw_segments.into_iter().zip(mismatch_budgets) {
        let segment = match raw {
            RawSegment::Constant(sequence) => {
                if m >= sequence.len() {
                    bail!(
                        "mismatch budget {} is not smaller than segment length {} for constant segment '{}'",
                        m,
                        sequence.len(),
                        sequence
                    );
                }
                Segment::Constant {
                    sequence,
                    mismatches: m,
                }
            }
            RawSegment::Variable(len) => {
                let candidates = dict_iter
                    .next()
                    .expect("dictionary line count already validated to match variable segment count");
                if candidates[0].len() != len {
                    bail!(
                        "dictionary candidates have length {} but the pattern declares an {}-character variable segment",
                        candidates[0].len(),
                        len
                    );
                }
                if m >= len {
                    bail!(
                        "mismatch budget {} is not smaller than segment length {} for a variable segment",
                        m,
                        len
                    );
                }
                Segment::variable(candidates, m)
            }
            RawSegment::Wildcard(length) => Segment::Wildcard { length },
        };
        segments.push(segment);
    }

    Ok(Pattern::new(name.to_string(), segments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_dict(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{}", contents).unwrap();
        f
    }

    #[test]
    fn test_parse_constant_only_pattern() {
        let pattern = parse_pattern("p", "[ACGT]", "0", None).unwrap();
        assert_eq!(pattern.segments.len(), 1);
        assert_eq!(
            pattern.segments[0],
            Segment::Constant {
                sequence: "ACGT".to_string(),
                mismatches: 0
            }
        );
        assert!(!pattern.contains_payload);
    }

    #[test]
    fn test_parse_wildcard_pattern() {
        let pattern = parse_pattern("p", "[ACGT][XXX][TTTT]", "0,0,0", None).unwrap();
        assert_eq!(pattern.segments.len(), 3);
        assert!(pattern.segments[1].is_wildcard());
        assert!(pattern.contains_payload);
    }

    #[test]
    fn test_parse_variable_pattern_with_dictionary() {
        let dict = write_dict("AAAA,CCCC,GGGG,TTTT\n");
        let pattern =
            parse_pattern("p", "[NNNN]", "1", Some(dict.path())).unwrap();
        match &pattern.segments[0] {
            Segment::Variable {
                dictionary,
                mismatches,
            } => {
                assert_eq!(dictionary.len(), 4);
                assert_eq!(*mismatches, 1);
            }
            _ => panic!("expected a Variable segment"),
        }
    }

    #[test]
    fn test_mixed_segment_rejected() {
        let err = parse_pattern_segments("[ACGTN]").unwrap_err();
        assert!(err.to_string().contains("mixes"));
    }

    #[test]
    fn test_whitespace_rejected() {
        let err = parse_pattern_segments("[AC GT]").unwrap_err();
        assert!(err.to_string().contains("whitespace"));
    }

    #[test]
    fn test_mismatch_count_mismatch() {
        let err = parse_pattern("p", "[ACGT][TTTT]", "0", None).unwrap_err();
        assert!(err.to_string().contains("2 segments"));
    }

    #[test]
    fn test_mismatch_budget_too_large() {
        let err = parse_pattern("p", "[ACGT]", "4", None).unwrap_err();
        assert!(err.to_string().contains("not smaller than segment length"));
    }

    #[test]
    fn test_missing_dictionary_for_variable_segment() {
        let err = parse_pattern("p", "[NNNN]", "1", None).unwrap_err();
        assert!(err.to_string().contains("no dictionary file"));
    }

    #[test]
    fn test_dictionary_line_count_mismatch() {
        let dict = write_dict("AAAA,CCCC\nGGGG,TTTT\n");
        let err = parse_pattern("p", "[NNNN]", "1", Some(dict.path())).unwrap_err();
        assert!(err.to_string().contains("2 lines"));
    }

    #[test]
    fn test_dictionary_duplicate_candidates_rejected() {
        let dict = write_dict("AAAA,AAAA,CCCC\n");
        let err = parse_pattern("p", "[NNNN]", "1", Some(dict.path())).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_dictionary_unequal_length_rejected() {
        let dict = write_dict("AAAA,CCC\n");
        let err = parse_pattern("p", "[NNNN]", "1", Some(dict.path())).unwrap_err();
        assert!(err.to_string().contains("different lengths"));
    }
}
