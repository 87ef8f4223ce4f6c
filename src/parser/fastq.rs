//! Streaming input readers: FASTQ (4 lines per record) and plain-text
//! (one sequence per line), both transparent to gzip compression.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::BufRead;
use std::path::Path;

use crate::parser::util::create_buffered_reader;
use crate::types::Read;

/// Source of reads, batched for the worker pool.
///
/// Implementations own their underlying buffered reader and are not
/// `Clone`; one `InputReader` is built per input file and consumed by a
/// single driver thread that slices off batches and hands them to workers.
pub trait InputReader {
    /// Pull up to `size` reads from the stream. Returns `None` once the
    /// stream is exhausted (a final partial batch is still returned as
    /// `Some` before that).
    fn read_batch(&mut self, size: usize) -> Result<Option<Vec<Read>>>;
}

/// Reads standard 4-line FASTQ records: `@name`, sequence, `+`, quality.
pub struct FastqReader {
    reader: Box<dyn BufRead + Send>,
}

impl FastqReader {
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
        Ok(FastqReader {
            reader: create_buffered_reader(file, path),
        })
    }

    fn read_one(&mut self) -> Result<Option<Read>> {
        let mut header = String::new();
        if self.reader.read_line(&mut header).context("reading FASTQ header line")? == 0 {
            return Ok(None);
        }
        let header = header.trim_end();
        if header.is_empty() {
            return Ok(None);
        }
        if !header.starts_with('@') {
            bail!("malformed FASTQ record: expected '@' header, got {:?}", header);
        }
        let name = header[1..].to_string();

        let mut sequence = String::new();
        if self.reader.read_line(&mut sequence).context("reading FASTQ sequence line")? == 0 {
            bail!("truncated FASTQ record: missing sequence line for {:?}", name);
        }
        let sequence = sequence.trim_end().to_string();

        let mut plus = String::new();
        if self.reader.read_line(&mut plus).context("reading FASTQ separator line")? == 0 {
            bail!("truncated FASTQ record: missing '+' line for {:?}", name);
        }
        if !plus.trim_end().starts_with('+') {
            bail!("malformed FASTQ record: expected '+' line, got {:?}", plus.trim_end());
        }

        let mut quality = String::new();
        if self.reader.read_line(&mut quality).context("reading FASTQ quality line")? == 0 {
            bail!("truncated FASTQ record: missing quality line for {:?}", name);
        }
        let quality = quality.trim_end().to_string();

        Ok(Some(Read {
            name,
            sequence,
            quality: Some(quality),
        }))
    }
}

impl InputReader for FastqReader {
    fn read_batch(&mut self, size: usize) -> Result<Option<Vec<Read>>> {
        let mut reads = Vec::with_capacity(size);
        while reads.len() < size {
            match self.read_one()? {
                Some(read) => reads.push(read),
                None => break,
            }
        }
        if reads.is_empty() {
            Ok(None)
        } else {
            Ok(Some(reads))
        }
    }
}

/// Reads one raw sequence per line, with no header or quality track.
/// Read names are synthesized from the line's ordinal position.
pub struct PlainTextReader {
    reader: Box<dyn BufRead + Send>,
    next_index: u64,
}

impl PlainTextReader {
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open {:?}", path))?;
        Ok(PlainTextReader {
            reader: create_buffered_reader(file, path),
            next_index: 0,
        })
    }
}

impl InputReader for PlainTextReader {
    fn read_batch(&mut self, size: usize) -> Result<Option<Vec<Read>>> {
        let mut reads = Vec::with_capacity(size);
        let mut line = String::new();

        while reads.len() < size {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line).context("reading plain-text line")?;
            if bytes_read == 0 {
                break;
            }
            let trimmed = line.trim_end();
            if trimmed.is_empty() {
                continue;
            }
            reads.push(Read {
                name: format!("read_{}", self.next_index),
                sequence: trimmed.to_string(),
                quality: None,
            });
            self.next_index += 1;
        }

        if reads.is_empty() {
            Ok(None)
        } else {
            Ok(Some(reads))
        }
    }
}
