//! rgmatch - barcode pattern matching for high-throughput sequencing reads.
//!
//! Locates a user-specified arrangement of constant, variable-from-dictionary,
//! and wildcard segments ("barcodes") inside each read, corrects small
//! sequencing errors against a dictionary, and emits the identified barcode
//! identity for each read together with any intervening payload DNA/RNA as
//! separate files.
//!
//! # Features
//!
//! - Parse the bracketed pattern description language, mismatch budgets, and
//!   dictionary files into an immutable [`types::Pattern`]
//! - Segment a read through that pattern, absorbing small indels via
//!   windowed probing and wildcard deferral
//! - Correct variable segments against a dictionary with bounded edit
//!   tolerance and ambiguity detection
//! - Run the matcher across a worker pool with per-worker buffered output
//!   and deterministic final concatenation
//!
//! # Example
//!
//! ```ignore
//! use rgmatch::config::parse_pattern;
//! use rgmatch::matcher::engine;
//!
//! let pattern = parse_pattern("p", "[ACGT][NNNN]", "0,1", Some(std::path::Path::new("dict.txt")))?;
//! let out = engine::run(&pattern, "read1", "ACGTAAAT", None, false)?;
//! println!("{:?}", out.demuxed.canonical_ids);
//! ```

pub mod config;
pub mod matcher;
pub mod output;
pub mod parser;
pub mod types;
pub mod worker;

pub use config::Config;
pub use types::{DemultiplexedRead, MatchFailure, Pattern, Read, Segment};
