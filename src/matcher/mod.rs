//! Barcode pattern matching: DictionaryIndex, SegmentMatcher, PatternEngine,
//! and StatsAggregator.

pub mod dictionary;
pub mod distance;
pub mod engine;
pub mod segment;
pub mod stats;

pub use dictionary::{DictionaryIndex, Lookup};
pub use engine::{EngineOutput, SegmentHit};
pub use segment::{match_segment, MatchOutcome};
pub use stats::StatsAggregator;
