//! CLI entry point for rgmatch: locate a barcode pattern in a read stream,
//! demultiplex by canonical identity, and emit per-pattern TSV/FASTQ plus
//! run-wide mismatch statistics.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use rgmatch::config::parse_pattern;
use rgmatch::parser::{FastqReader, InputReader, PlainTextReader};
use rgmatch::worker::{self, PoolConfig};

/// Demultiplex sequencing reads by a bracketed barcode pattern.
#[derive(Parser, Debug)]
#[command(name = "rgmatch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pattern description, e.g. "[ACGT][NNNN][XXXXXX]" (§6).
    #[arg(short = 'p', long = "pattern")]
    pattern: String,

    /// Comma-separated mismatch budget, one per segment.
    #[arg(short = 'm', long = "mismatches")]
    mismatches: String,

    /// Dictionary file: one line per variable segment, required iff the
    /// pattern has any `[NNN...]` segments.
    #[arg(short = 'b', long = "barcodes")]
    barcodes: Option<PathBuf>,

    /// Name used for output file prefixes (`<name>.tsv`, `<name>.fastq`).
    #[arg(short = 'n', long = "name", default_value = "barcodes")]
    name: String,

    /// Forward (or single-end) input file. FASTQ or plain-text, optionally
    /// gzip-compressed (".gz" suffix).
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Reverse input file for paired-end runs. When given, failed reads are
    /// routed to FailedLines_FW.txt / FailedLines_RV.txt instead of a single
    /// FailedLines.txt.
    #[arg(short = 'I', long = "input2")]
    input2: Option<PathBuf>,

    /// Treat input(s) as one raw sequence per line instead of 4-line FASTQ
    /// records.
    #[arg(long = "text-input")]
    text_input: bool,

    /// Output directory (created if missing).
    #[arg(short = 'o', long = "out-path")]
    out_path: PathBuf,

    /// Number of worker threads (0 = auto-detect).
    #[arg(short = 't', long = "threads", default_value = "0")]
    threads: usize,

    /// Number of reads read from input per dispatched batch.
    #[arg(long = "batch-size", default_value = "10000")]
    batch_size: usize,

    /// Keep reads that fail to segment instead of rejecting them: leaves
    /// empty canonical ids in unresolved positions and records no
    /// statistics for that read (§4.3, §7).
    #[arg(long = "analyse-unmapped")]
    analyse_unmapped: bool,
}

fn build_reader(path: &PathBuf, text_input: bool) -> Result<Box<dyn InputReader>> {
    if text_input {
        Ok(Box::new(PlainTextReader::new(path)?))
    } else {
        Ok(Box::new(FastqReader::new(path)?))
    }
}

fn main() -> Result<()> {
    if let Err(err) = run() {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    let args = Args::parse();

    if !args.input.exists() {
        bail!("input file not found: {}", args.input.display());
    }
    if let Some(input2) = &args.input2 {
        if !input2.exists() {
            bail!("reverse input file not found: {}", input2.display());
        }
    }
    if args.batch_size == 0 {
        bail!("batch size must be greater than 0");
    }

    let pattern = parse_pattern(&args.name, &args.pattern, &args.mismatches, args.barcodes.as_deref())
        .context("invalid pattern/mismatch/dictionary configuration")?;

    std::fs::create_dir_all(&args.out_path)
        .with_context(|| format!("failed to create output directory {:?}", args.out_path))?;

    let num_threads = if args.threads == 0 { num_cpus::get() } else { args.threads };

    let pool_config = PoolConfig {
        threads: num_threads,
        batch_size: args.batch_size,
        analyse_unmapped: args.analyse_unmapped,
        paired: args.input2.is_some(),
    };

    eprintln!("Processing input: {}", args.input.display());
    let mut reader = build_reader(&args.input, args.text_input)?;
    let mut reverse_reader = args
        .input2
        .as_ref()
        .map(|path| build_reader(path, args.text_input))
        .transpose()?;

    let summary = worker::run(
        &pattern,
        &pool_config,
        &args.out_path,
        reader.as_mut(),
        reverse_reader.as_deref_mut(),
    )?;

    eprintln!(
        "MATCHED: {} | MODERATE MATCH: {} | MISMATCHED: {} | Multiplebarcode: {}",
        summary.stats.perfect_matches, summary.stats.moderate_matches, summary.stats.no_matches, summary.stats.multi_barcode
    );
    eprintln!("Reads processed: {}", summary.reads_processed);
    eprintln!("Output written to: {}", args.out_path.display());

    Ok(())
}
