//! WorkerPool: partitions batches of reads across worker threads, each
//! owning a thread-local [`StatsAggregator`] and [`OutputSink`] (§4.5, §5).
//!
//! A batch read from the input is sliced into `T` contiguous sub-batches
//! and dispatched one-per-worker over `T` bounded channels; each worker
//! only ever drains its own channel, so reads stay in input order within
//! one worker's output, though order across workers is not input order
//! (§5); final concatenation restores a deterministic order by worker
//! index, not by input position. A [`std::sync::Barrier`] shared by every
//! worker and the dispatcher guarantees every worker has opened its temp
//! files before the dispatcher sends the first sub-batch.
//!
//! Workers run on a dedicated [`rayon::ThreadPool`] of exactly `threads`
//! threads, spawned via `pool.scope` the way the teacher's `run_parallel`
//! spins up its worker loop: the scope itself runs on its own
//! [`std::thread`] so the dispatcher can drive the reader concurrently,
//! and each worker reports its final tally back over a bounded results
//! channel instead of a `JoinHandle`, since a scoped closure has no
//! return value of its own.

use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel::bounded;

use crate::matcher::{engine, StatsAggregator};
use crate::output::{OutputSink, TempFileManifest};
use crate::parser::InputReader;
use crate::types::{MatchFailure, Pattern, Read};

/// One worker's final tally, reported back over `summary_tx` once its
/// input channel closes.
struct WorkerSummary {
    worker_id: usize,
    stats: StatsAggregator,
    reads_processed: u64,
    sink: OutputSink,
}

/// Run-wide knobs the pool needs that don't belong to [`Pattern`] itself.
pub struct PoolConfig {
    pub threads: usize,
    pub batch_size: usize,
    pub analyse_unmapped: bool,
    pub paired: bool,
}

/// Totals returned after every worker has joined and its stats were
/// merged into one running aggregate.
pub struct RunSummary {
    pub stats: StatsAggregator,
    pub reads_processed: u64,
}

/// One sub-batch dispatched to a worker: its forward reads and, in paired
/// mode, the corresponding reverse reads (same length, same positions).
struct Chunk {
    forward: Vec<Read>,
    reverse: Option<Vec<Read>>,
}

/// Drives `reader` (and, in paired mode, `reverse_reader`) to completion,
/// fanning batches out across `config.threads` workers that each own an
/// [`OutputSink`] writing to `out_dir`, and returns the merged stats.
pub fn run(
    pattern: &Pattern,
    config: &PoolConfig,
    out_dir: &Path,
    reader: &mut dyn InputReader,
    mut reverse_reader: Option<&mut dyn InputReader>,
) -> Result<RunSummary> {
    let num_threads = config.threads.max(1);

    crate::output::write_tsv_header(out_dir, pattern).context("writing TSV header")?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .context("failed to build worker thread pool")?;

    // num_threads workers + the dispatcher itself.
    let barrier = Arc::new(Barrier::new(num_threads + 1));

    let mut senders = Vec::with_capacity(num_threads);
    let (summary_tx, summary_rx) = bounded::<Result<WorkerSummary, String>>(num_threads);

    let workers_handle = {
        let mut rxs = Vec::with_capacity(num_threads);
        for _ in 0..num_threads {
            let (tx, rx) = bounded::<Chunk>(8);
            senders.push(tx);
            rxs.push(rx);
        }

        let pattern = pattern.clone();
        let out_dir = out_dir.to_path_buf();
        let analyse_unmapped = config.analyse_unmapped;
        let paired = config.paired;
        let barrier_for_workers = Arc::clone(&barrier);

        thread::spawn(move || {
            pool.scope(|s| {
                for (worker_id, rx) in rxs.into_iter().enumerate() {
                    let pattern = pattern.clone();
                    let out_dir = out_dir.clone();
                    let barrier = Arc::clone(&barrier_for_workers);
                    let summary_tx = summary_tx.clone();

                    s.spawn(move |_| {
                        let result = (|| -> Result<WorkerSummary> {
                            let mut sink =
                                OutputSink::new(&out_dir, std::slice::from_ref(&pattern), worker_id, paired)?;
                            barrier.wait();

                            let mut stats = StatsAggregator::new();
                            let mut reads_processed = 0u64;

                            while let Ok(chunk) = rx.recv() {
                                for (i, read) in chunk.forward.iter().enumerate() {
                                    reads_processed += 1;
                                    let rv_sequence = chunk
                                        .reverse
                                        .as_ref()
                                        .and_then(|rv| rv.get(i))
                                        .map(|rv| rv.sequence.as_str());
                                    process_one(&pattern, read, rv_sequence, analyse_unmapped, &mut sink, &mut stats)?;
                                }
                            }

                            sink.flush()?;
                            Ok(WorkerSummary {
                                worker_id,
                                stats,
                                reads_processed,
                                sink,
                            })
                        })();
                        let _ = summary_tx.send(result.map_err(|e| format!("{:#}", e)));
                    });
                }
            });
        })
    };

    // Wait until every worker has opened its temp files before sending
    // the first sub-batch (§5, §9 "Thread-start barrier").
    barrier.wait();

    let mut dispatched: u64 = 0;
    loop {
        let batch = reader.read_batch(config.batch_size).context("reading input batch")?;
        let batch = match batch {
            Some(batch) => batch,
            None => break,
        };
        let rv_batch = if config.paired {
            reverse_reader
                .as_deref_mut()
                .map(|r| r.read_batch(batch.len()))
                .transpose()
                .context("reading reverse input batch")?
                .flatten()
        } else {
            None
        };

        dispatched += batch.len() as u64;
        let forward_parts = partition_owned(batch, num_threads);
        let mut reverse_parts = rv_batch.map(|rv| partition_owned(rv, num_threads));

        for (worker_id, forward) in forward_parts.into_iter().enumerate() {
            let reverse = reverse_parts.as_mut().map(|parts| std::mem::take(&mut parts[worker_id]));
            senders[worker_id]
                .send(Chunk { forward, reverse })
                .map_err(|_| anyhow::anyhow!("worker {} channel closed unexpectedly", worker_id))?;
        }

        // Input is a stream of unknown total length, so progress is a plain
        // read count tick rather than a percentage (mapping.cpp's
        // printProgress has the file size to compute a percentage; we don't).
        eprintln!("Processed {} reads", dispatched);
    }

    drop(senders);

    workers_handle
        .join()
        .map_err(|_| anyhow::anyhow!("worker pool thread panicked"))?;

    let mut summaries = Vec::with_capacity(num_threads);
    for summary in summary_rx.try_iter() {
        summaries.push(summary.map_err(|e| anyhow::anyhow!("worker failed: {}", e))?);
    }
    // Workers report in completion order, not worker_id order; `record`
    // requires ascending worker_id so concatenation matches §5's
    // deterministic-by-worker-index ordering.
    summaries.sort_by_key(|s| s.worker_id);

    let mut merged = StatsAggregator::new();
    let mut reads_processed = 0u64;
    let mut manifest = TempFileManifest::new(std::slice::from_ref(pattern));
    for summary in summaries {
        merged.merge(summary.stats);
        reads_processed += summary.reads_processed;
        manifest.record(summary.sink);
    }

    manifest.concatenate().context("concatenating worker temp files")?;
    crate::output::write_barcode_mismatches(out_dir, &merged).context("writing BarcodeMismatches.txt")?;

    Ok(RunSummary {
        stats: merged,
        reads_processed,
    })
}

fn process_one(
    pattern: &Pattern,
    read: &Read,
    rv_sequence: Option<&str>,
    analyse_unmapped: bool,
    sink: &mut OutputSink,
    stats: &mut StatsAggregator,
) -> Result<()> {
    match engine::run(pattern, &read.name, &read.sequence, read.quality.as_deref(), analyse_unmapped) {
        Ok(out) => {
            // A segment left empty means "analyse unmapped" papered over a
            // failure (unmatched or ambiguous); §4.3 requires no statistics
            // be recorded for those reads at all.
            let partial = out.demuxed.canonical_ids.iter().any(String::is_empty);
            sink.write_demuxed(0, pattern, &out.demuxed)?;
            if !partial {
                debug_assert!(!out.multi_barcode, "an ambiguous segment always leaves a blank canonical id");
                for hit in &out.hits {
                    stats.record_hit(&hit.canonical_id, hit.score, hit.budget);
                }
                stats.record_read_outcome(out.score_sum);
            }
        }
        Err(failure) => {
            sink.write_failed_fw(&read.sequence)?;
            if let Some(rv_sequence) = rv_sequence {
                sink.write_failed_rv(rv_sequence)?;
            }
            // Every rejected read counts toward `no_matches` (spec invariant
            // #4: perfect + moderate + no_matches = reads_processed);
            // ambiguity additionally bumps `multi_barcode` alongside it.
            if let MatchFailure::Ambiguous(_) = failure {
                stats.record_multi_barcode();
            }
            stats.record_no_match();
        }
    }
    Ok(())
}

/// Split an owned `batch` into `n` contiguous, near-equal-size pieces, in
/// order. The first `len % n` pieces get one extra element.
fn partition_owned(mut batch: Vec<Read>, n: usize) -> Vec<Vec<Read>> {
    let len = batch.len();
    let base = len / n;
    let remainder = len % n;

    let mut parts = Vec::with_capacity(n);
    // Drain from the back so earlier pieces keep their original order
    // without repeated front-shifts.
    let mut remaining = len;
    let mut sizes = Vec::with_capacity(n);
    for i in 0..n {
        sizes.push(base + if i < remainder { 1 } else { 0 });
    }
    for size in sizes.into_iter().rev() {
        let start = remaining - size;
        parts.push(batch.split_off(start));
        remaining = start;
    }
    debug_assert!(batch.is_empty());
    parts.reverse();
    parts
}
