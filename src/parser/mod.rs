//! Input parsers: FASTQ/plain-text read streams and shared file utilities.

pub mod fastq;
pub mod util;

pub use fastq::{FastqReader, InputReader, PlainTextReader};
