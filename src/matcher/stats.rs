//! StatsAggregator: per-pattern and per-barcode mismatch histograms,
//! thread-local during scanning and merged once at shutdown.

use indexmap::IndexMap;

/// Per-canonical-id mismatch histograms plus the run's global counters.
///
/// One instance lives per worker during scanning (`Default::default`);
/// workers never share a `StatsAggregator`. [`StatsAggregator::merge`]
/// folds a worker's totals into a running aggregate at shutdown.
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    /// canonical_id -> histogram of length `budget + 2`; index `budget + 1`
    /// is the "exceeded threshold" slot (unreachable via `matcher::engine`,
    /// which only ever records matches within budget, but kept so the
    /// histogram shape always has a final overflow bucket).
    histograms: IndexMap<String, Vec<u64>>,
    pub perfect_matches: u64,
    pub moderate_matches: u64,
    pub no_matches: u64,
    pub multi_barcode: u64,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one segment hit: `canonical_id` matched at `score` edits
    /// against a segment with mismatch budget `budget`.
    pub fn record_hit(&mut self, canonical_id: &str, score: usize, budget: usize) {
        let histogram = self
            .histograms
            .entry(canonical_id.to_string())
            .or_insert_with(|| vec![0u64; budget + 2]);
        let index = score.min(budget + 1);
        histogram[index] += 1;
    }

    pub fn record_read_outcome(&mut self, score_sum: usize) {
        if score_sum == 0 {
            self.perfect_matches += 1;
        } else {
            self.moderate_matches += 1;
        }
    }

    pub fn record_no_match(&mut self) {
        self.no_matches += 1;
    }

    pub fn record_multi_barcode(&mut self) {
        self.multi_barcode += 1;
    }

    pub fn histogram(&self, canonical_id: &str) -> Option<&[u64]> {
        self.histograms.get(canonical_id).map(Vec::as_slice)
    }

    /// Iterate histograms in first-seen order, for deterministic output.
    pub fn histograms(&self) -> impl Iterator<Item = (&String, &Vec<u64>)> {
        self.histograms.iter()
    }

    /// Fold `other` into `self`, summing histograms bucket-wise and adding
    /// counters. Used to combine per-worker stats after the pool joins.
    pub fn merge(&mut self, other: StatsAggregator) {
        for (canonical_id, histogram) in other.histograms {
            match self.histograms.get_mut(&canonical_id) {
                Some(existing) => {
                    for (a, b) in existing.iter_mut().zip(histogram.iter()) {
                        *a += b;
                    }
                }
                None => {
                    self.histograms.insert(canonical_id, histogram);
                }
            }
        }
        self.perfect_matches += other.perfect_matches;
        self.moderate_matches += other.moderate_matches;
        self.no_matches += other.no_matches;
        self.multi_barcode += other.multi_barcode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_hit_indexes_by_score() {
        let mut stats = StatsAggregator::new();
        stats.record_hit("ACGT", 0, 1);
        stats.record_hit("ACGT", 1, 1);
        assert_eq!(stats.histogram("ACGT").unwrap(), &[1, 1, 0]);
    }

    #[test]
    fn test_perfect_vs_moderate_counters() {
        let mut stats = StatsAggregator::new();
        stats.record_read_outcome(0);
        stats.record_read_outcome(2);
        assert_eq!(stats.perfect_matches, 1);
        assert_eq!(stats.moderate_matches, 1);
    }

    #[test]
    fn test_merge_sums_histograms_and_counters() {
        let mut a = StatsAggregator::new();
        a.record_hit("ACGT", 0, 1);
        a.record_read_outcome(0);

        let mut b = StatsAggregator::new();
        b.record_hit("ACGT", 1, 1);
        b.record_read_outcome(0);
        b.record_multi_barcode();

        a.merge(b);

        assert_eq!(a.histogram("ACGT").unwrap(), &[1, 1, 0]);
        assert_eq!(a.perfect_matches, 2);
        assert_eq!(a.multi_barcode, 1);
    }

    #[test]
    fn test_merge_preserves_first_seen_order() {
        let mut a = StatsAggregator::new();
        a.record_hit("GGGG", 0, 0);
        let mut b = StatsAggregator::new();
        b.record_hit("AAAA", 0, 0);
        a.merge(b);

        let ids: Vec<&String> = a.histograms().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["GGGG", "AAAA"]);
    }
}
