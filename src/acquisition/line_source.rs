//! Sequential line reader that numbers every physical input line.

use std::io::BufRead;

use crate::pipeline::PipelineError;
use crate::types::LineRecord;

/// Initial capacity for the per-line read buffer (bytes).
const INITIAL_LINE_CAPACITY: usize = 256;

/// Reads an input stream one line at a time, yielding [`LineRecord`]s with
/// sequence numbers starting at 0.
///
/// Blank and comment lines are yielded like any other line so sequence
/// numbers always match the physical line index.
pub struct LineSource<R> {
    reader: R,
    next_sequence: u64,
    buffer: Vec<u8>,
    exhausted: bool,
}

impl<R: BufRead> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            next_sequence: 0,
            buffer: Vec::with_capacity(INITIAL_LINE_CAPACITY),
            exhausted: false,
        }
    }

    /// Read the next line.
    ///
    /// Returns `Ok(None)` once at end of input; calling again after that is
    /// an error. I/O failures carry the 1-based line number being read.
    pub fn next_record(&mut self) -> Result<Option<LineRecord>, PipelineError> {
        if self.exhausted {
            return Err(PipelineError::SourceExhausted);
        }

        self.buffer.clear();
        let bytes = self
            .reader
            .read_until(b'\n', &mut self.buffer)
            .map_err(|source| PipelineError::Input {
                line: self.next_sequence + 1,
                source,
            })?;

        if bytes == 0 {
            self.exhausted = true;
            return Ok(None);
        }

        let mut raw = std::mem::replace(
            &mut self.buffer,
            Vec::with_capacity(INITIAL_LINE_CAPACITY),
        );
        if raw.last() == Some(&b'\n') {
            raw.pop();
            if raw.last() == Some(&b'\r') {
                raw.pop();
            }
        }

        let record = LineRecord {
            sequence: self.next_sequence,
            raw,
        };
        self.next_sequence += 1;
        Ok(Some(record))
    }

    /// Number of lines yielded so far.
    pub fn lines_read(&self) -> u64 {
        self.next_sequence
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
