//! OutputSink: per-worker buffered TSV/FASTQ/failed-lines streams and the
//! final deterministic concatenation step (§4.6).
//!
//! Each worker writes to its own `<name>.<worker_id>.<ext>` temp file; no
//! coordination is needed until shutdown, when the pool concatenates every
//! worker's temp file into the final destination in worker-index order and
//! removes the temp files.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::matcher::StatsAggregator;
use crate::types::{DemultiplexedRead, MatchFailure, Pattern};

fn temp_path(final_path: &Path, worker_id: usize) -> PathBuf {
    let stem = final_path.file_stem().unwrap_or_default().to_string_lossy();
    let ext = final_path.extension().map(|e| e.to_string_lossy().into_owned());
    let name = match ext {
        Some(ext) => format!("{stem}.{worker_id}.{ext}"),
        None => format!("{stem}.{worker_id}"),
    };
    final_path.with_file_name(name)
}

/// Per-pattern temp output streams owned by one worker: a barcode TSV and,
/// if the pattern carries a payload, a FASTQ.
struct PatternStreams {
    tsv: BufWriter<File>,
    tsv_tmp_path: PathBuf,
    tsv_final_path: PathBuf,
    fastq: Option<BufWriter<File>>,
    fastq_tmp_path: Option<PathBuf>,
    fastq_final_path: Option<PathBuf>,
}

/// Owns one worker's temp output streams: one [`PatternStreams`] per
/// pattern, plus failed-line sink(s) (single file, or FW/RV pair for
/// paired-end input).
///
/// Constructed once per worker, after the startup barrier in
/// [`crate::worker::WorkerPool`] has confirmed every worker opened its
/// files, and written to exclusively by that worker until shutdown.
pub struct OutputSink {
    worker_id: usize,
    patterns: Vec<PatternStreams>,
    failed_fw: BufWriter<File>,
    failed_fw_tmp: PathBuf,
    failed_fw_final: PathBuf,
    failed_rv: Option<(BufWriter<File>, PathBuf, PathBuf)>,
    sequence_number: u64,
}

impl OutputSink {
    /// Open this worker's temp files for every pattern plus the failed-line
    /// sink(s). `paired` selects between a single `FailedLines.txt` and a
    /// `FailedLines_FW.txt` / `FailedLines_RV.txt` pair.
    pub fn new(out_dir: &Path, patterns: &[Pattern], worker_id: usize, paired: bool) -> Result<Self> {
        let mut pattern_streams = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let tsv_final_path = out_dir.join(format!("{}.tsv", pattern.name));
            let tsv_tmp_path = temp_path(&tsv_final_path, worker_id);
            let tsv = BufWriter::new(
                File::create(&tsv_tmp_path)
                    .with_context(|| format!("failed to create temp TSV file {:?}", tsv_tmp_path))?,
            );

            let (fastq, fastq_tmp_path, fastq_final_path) = if pattern.contains_payload {
                let final_path = out_dir.join(format!("{}.fastq", pattern.name));
                let tmp_path = temp_path(&final_path, worker_id);
                let writer = BufWriter::new(
                    File::create(&tmp_path)
                        .with_context(|| format!("failed to create temp FASTQ file {:?}", tmp_path))?,
                );
                (Some(writer), Some(tmp_path), Some(final_path))
            } else {
                (None, None, None)
            };

            pattern_streams.push(PatternStreams {
                tsv,
                tsv_tmp_path,
                tsv_final_path,
                fastq,
                fastq_tmp_path,
                fastq_final_path,
            });
        }

        let failed_fw_final = out_dir.join(if paired { "FailedLines_FW.txt" } else { "FailedLines.txt" });
        let failed_fw_tmp = temp_path(&failed_fw_final, worker_id);
        let failed_fw = BufWriter::new(
            File::create(&failed_fw_tmp)
                .with_context(|| format!("failed to create temp failed-lines file {:?}", failed_fw_tmp))?,
        );

        let failed_rv = if paired {
            let final_path = out_dir.join("FailedLines_RV.txt");
            let tmp_path = temp_path(&final_path, worker_id);
            let writer = BufWriter::new(
                File::create(&tmp_path)
                    .with_context(|| format!("failed to create temp failed-lines file {:?}", tmp_path))?,
            );
            Some((writer, tmp_path, final_path))
        } else {
            None
        };

        Ok(OutputSink {
            worker_id,
            patterns: pattern_streams,
            failed_fw,
            failed_fw_tmp,
            failed_fw_final,
            failed_rv,
            sequence_number: 0,
        })
    }

    /// Write one successfully (or, under "analyse unmapped", partially)
    /// segmented read's TSV row and, if the pattern carries a payload, its
    /// FASTQ record.
    pub fn write_demuxed(&mut self, pattern_index: usize, pattern: &Pattern, demuxed: &DemultiplexedRead) -> Result<()> {
        let streams = &mut self.patterns[pattern_index];

        let synthetic_name = if pattern.contains_payload {
            self.sequence_number += 1;
            Some(format!("{}_{}_{}", self.worker_id, self.sequence_number, demuxed.read_name))
        } else {
            None
        };

        let mut columns: Vec<&str> = Vec::with_capacity(demuxed.canonical_ids.len() + 1);
        if let Some(name) = synthetic_name.as_deref() {
            columns.push(name);
        }
        // Every segment contributes a column, wildcards included: a
        // Wildcard's canonical_id is its resolved span (scenarios S4/S5),
        // so the row reports the full segmented read, not just the
        // anchors.
        columns.extend(demuxed.canonical_ids.iter().map(String::as_str));
        writeln!(streams.tsv, "{}", columns.join("\t")).context("writing barcode TSV row")?;

        if let (Some(fastq), Some(payload), Some(name)) =
            (streams.fastq.as_mut(), demuxed.payload.as_ref(), synthetic_name)
        {
            let quality = payload
                .quality
                .clone()
                .unwrap_or_else(|| "I".repeat(payload.sequence.len()));
            writeln!(fastq, "@{}\n{}\n+\n{}", name, payload.sequence, quality)
                .context("writing FASTQ record")?;
        }

        Ok(())
    }

    /// Append a verbatim failed line to the forward (or single-end) sink.
    pub fn write_failed_fw(&mut self, line: &str) -> Result<()> {
        writeln!(self.failed_fw, "{}", line).context("writing failed-lines file")
    }

    /// Append a verbatim failed line to the reverse sink. Panics if this
    /// sink was constructed with `paired = false`.
    pub fn write_failed_rv(&mut self, line: &str) -> Result<()> {
        let (rv, _, _) = self
            .failed_rv
            .as_mut()
            .expect("write_failed_rv called on a single-end OutputSink");
        writeln!(rv, "{}", line).context("writing failed-lines (reverse) file")
    }

    /// Annotate a failure with its kind for the caller's own bookkeeping;
    /// OutputSink itself only ever appends verbatim lines.
    pub fn failure_label(failure: MatchFailure) -> &'static str {
        match failure {
            MatchFailure::TruncatedRead => "TruncatedRead",
            MatchFailure::SegmentUnmatched(_) => "SegmentUnmatched",
            MatchFailure::Ambiguous(_) => "Ambiguous",
        }
    }

    /// Flush every open stream. Called before [`WorkerPool`](crate::worker::WorkerPool)
    /// collects temp file paths for concatenation.
    pub fn flush(&mut self) -> Result<()> {
        for streams in &mut self.patterns {
            streams.tsv.flush().context("flushing barcode TSV")?;
            if let Some(fastq) = streams.fastq.as_mut() {
                fastq.flush().context("flushing FASTQ")?;
            }
        }
        self.failed_fw.flush().context("flushing failed-lines file")?;
        if let Some((rv, _, _)) = self.failed_rv.as_mut() {
            rv.flush().context("flushing failed-lines (reverse) file")?;
        }
        Ok(())
    }

    /// Temp file paths produced by this worker, grouped by destination, for
    /// the pool to fold into [`TempFileManifest`].
    fn into_manifest_entries(self) -> (Vec<(usize, PathBuf, PathBuf, Option<(PathBuf, PathBuf)>)>, PathBuf, PathBuf, Option<(PathBuf, PathBuf)>) {
        let patterns = self
            .patterns
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                let fastq = match (s.fastq_tmp_path, s.fastq_final_path) {
                    (Some(t), Some(f)) => Some((t, f)),
                    _ => None,
                };
                (i, s.tsv_tmp_path, s.tsv_final_path, fastq)
            })
            .collect();
        let failed_rv = self.failed_rv.map(|(_, tmp, fin)| (tmp, fin));
        (patterns, self.failed_fw_tmp, self.failed_fw_final, failed_rv)
    }
}

/// Accumulates temp file paths across every worker, in worker-index order,
/// so concatenation at shutdown is independent of scheduling.
#[derive(Default)]
pub struct TempFileManifest {
    /// `pattern_index -> (tsv temp paths in worker order, tsv final path,
    /// fastq temp paths in worker order, fastq final path)`.
    pattern_files: Vec<(Vec<PathBuf>, PathBuf, Vec<PathBuf>, Option<PathBuf>)>,
    failed_fw: Vec<PathBuf>,
    failed_fw_final: Option<PathBuf>,
    failed_rv: Vec<PathBuf>,
    failed_rv_final: Option<PathBuf>,
}

impl TempFileManifest {
    pub fn new(patterns: &[Pattern]) -> Self {
        TempFileManifest {
            pattern_files: patterns.iter().map(|_| (Vec::new(), PathBuf::new(), Vec::new(), None)).collect(),
            ..Default::default()
        }
    }

    /// Fold one worker's [`OutputSink`] temp paths in, at `worker_id`'s
    /// position (workers are folded in ascending `worker_id` order by the
    /// caller, so push order already matches final concatenation order).
    pub fn record(&mut self, sink: OutputSink) {
        let (pattern_entries, failed_fw_tmp, failed_fw_final, failed_rv) = sink.into_manifest_entries();
        for (index, tsv_tmp, tsv_final, fastq) in pattern_entries {
            let entry = &mut self.pattern_files[index];
            entry.0.push(tsv_tmp);
            entry.1 = tsv_final;
            if let Some((fastq_tmp, fastq_final)) = fastq {
                entry.2.push(fastq_tmp);
                entry.3 = Some(fastq_final);
            }
        }
        self.failed_fw.push(failed_fw_tmp);
        self.failed_fw_final = Some(failed_fw_final);
        if let Some((rv_tmp, rv_final)) = failed_rv {
            self.failed_rv.push(rv_tmp);
            self.failed_rv_final = Some(rv_final);
        }
    }

    /// Concatenate every worker's temp files into their final destinations,
    /// by worker index, and delete the temp files.
    pub fn concatenate(&self) -> Result<()> {
        for (tmp_paths, final_path, fastq_tmp_paths, fastq_final_path) in &self.pattern_files {
            concatenate_files(tmp_paths, final_path)?;
            if let Some(fastq_final) = fastq_final_path {
                concatenate_files(fastq_tmp_paths, fastq_final)?;
            }
        }
        if let Some(final_path) = &self.failed_fw_final {
            concatenate_files(&self.failed_fw, final_path)?;
        }
        if let Some(final_path) = &self.failed_rv_final {
            concatenate_files(&self.failed_rv, final_path)?;
        }
        Ok(())
    }
}

/// Append every temp file's contents, in order, to `final_path`, then
/// delete the temp files. `final_path` is opened in append mode (not
/// truncated) because the barcode TSV header is written there before any
/// worker starts.
fn concatenate_files(tmp_paths: &[PathBuf], final_path: &Path) -> Result<()> {
    let mut out = BufWriter::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(final_path)
            .with_context(|| format!("failed to open output file {:?}", final_path))?,
    );
    for tmp in tmp_paths {
        let mut contents = fs::File::open(tmp).with_context(|| format!("failed to open temp file {:?}", tmp))?;
        std::io::copy(&mut contents, &mut out)
            .with_context(|| format!("failed to append temp file {:?} to {:?}", tmp, final_path))?;
    }
    out.flush()?;
    for tmp in tmp_paths {
        let _ = fs::remove_file(tmp);
    }
    Ok(())
}

/// Write a pattern's barcode TSV header: `READNAME` (if the pattern has a
/// payload) followed by one column per segment, in pattern order.
pub fn write_tsv_header(out_dir: &Path, pattern: &Pattern) -> Result<()> {
    let path = out_dir.join(format!("{}.tsv", pattern.name));
    let mut writer = BufWriter::new(File::create(&path).with_context(|| format!("failed to create {:?}", path))?);
    let mut columns: Vec<String> = Vec::new();
    if pattern.contains_payload {
        columns.push("READNAME".to_string());
    }
    for i in 0..pattern.segments.len() {
        columns.push(format!("{}_{}", pattern.name, i));
    }
    writeln!(writer, "{}", columns.join("\t"))?;
    writer.flush()?;
    Ok(())
}

/// Write `BarcodeMismatches.txt`: one row per canonical id, `id` then its
/// histogram buckets (§6), in the histograms' first-seen iteration order.
pub fn write_barcode_mismatches(out_dir: &Path, stats: &StatsAggregator) -> Result<()> {
    let path = out_dir.join("BarcodeMismatches.txt");
    let mut writer = BufWriter::new(File::create(&path).with_context(|| format!("failed to create {:?}", path))?);
    for (canonical_id, histogram) in stats.histograms() {
        let counts: Vec<String> = histogram.iter().map(u64::to_string).collect();
        writeln!(writer, "{}\t{}", canonical_id, counts.join("\t"))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Payload, Segment};
    use tempfile::tempdir;

    fn pattern_with_payload() -> Pattern {
        Pattern::new(
            "p".to_string(),
            vec![
                Segment::Constant { sequence: "ACGT".to_string(), mismatches: 0 },
                Segment::Wildcard { length: 4 },
            ],
        )
    }

    #[test]
    fn test_write_demuxed_row_and_fastq() {
        let dir = tempdir().unwrap();
        let patterns = vec![pattern_with_payload()];
        let mut sink = OutputSink::new(dir.path(), &patterns, 0, false).unwrap();

        let demuxed = DemultiplexedRead {
            read_name: "r1".to_string(),
            canonical_ids: vec!["ACGT".to_string(), "GGGG".to_string()],
            payload: Some(Payload { sequence: "GGGG".to_string(), quality: Some("IIII".to_string()) }),
        };
        sink.write_demuxed(0, &patterns[0], &demuxed).unwrap();
        sink.flush().unwrap();

        let mut manifest = TempFileManifest::new(&patterns);
        manifest.record(sink);
        manifest.concatenate().unwrap();

        let tsv = fs::read_to_string(dir.path().join("p.tsv")).unwrap();
        assert!(tsv.contains("0_1_r1"));
        assert!(tsv.contains("ACGT"));
        assert!(!tsv.contains("GGGG\tACGT"));

        let fastq = fs::read_to_string(dir.path().join("p.fastq")).unwrap();
        assert!(fastq.contains("@0_1_r1"));
        assert!(fastq.contains("GGGG"));
        assert!(fastq.contains("IIII"));
    }

    #[test]
    fn test_concatenation_order_is_by_worker_index() {
        let dir = tempdir().unwrap();
        let patterns = vec![Pattern::new(
            "p".to_string(),
            vec![Segment::Constant { sequence: "ACGT".to_string(), mismatches: 0 }],
        )];
        let mut manifest = TempFileManifest::new(&patterns);

        for worker_id in 0..3 {
            let mut sink = OutputSink::new(dir.path(), &patterns, worker_id, false).unwrap();
            let demuxed = DemultiplexedRead {
                read_name: format!("r{}", worker_id),
                canonical_ids: vec!["ACGT".to_string()],
                payload: None,
            };
            sink.write_demuxed(0, &patterns[0], &demuxed).unwrap();
            sink.flush().unwrap();
            manifest.record(sink);
        }
        manifest.concatenate().unwrap();

        let tsv = fs::read_to_string(dir.path().join("p.tsv")).unwrap();
        let lines: Vec<&str> = tsv.lines().collect();
        assert_eq!(lines, vec!["ACGT", "ACGT", "ACGT"]);
    }

    #[test]
    fn test_failed_lines_paired_mode_uses_fw_rv_files() {
        let dir = tempdir().unwrap();
        let patterns = vec![];
        let mut sink = OutputSink::new(dir.path(), &patterns, 0, true).unwrap();
        sink.write_failed_fw("ACGTACGT").unwrap();
        sink.write_failed_rv("TTTTTTTT").unwrap();
        sink.flush().unwrap();

        let mut manifest = TempFileManifest::new(&patterns);
        manifest.record(sink);
        manifest.concatenate().unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("FailedLines_FW.txt")).unwrap().trim(), "ACGTACGT");
        assert_eq!(fs::read_to_string(dir.path().join("FailedLines_RV.txt")).unwrap().trim(), "TTTTTTTT");
    }
}
