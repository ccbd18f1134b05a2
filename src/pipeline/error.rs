//! Fatal pipeline errors.
//!
//! Per-line and per-row failures never appear here: they are recovered where
//! they happen and reported through [`Diagnostics`](super::Diagnostics).

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::queue::QueueClosed;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read input at line {line}: {source}")]
    Input { line: u64, source: io::Error },

    #[error("line source was read past end of input")]
    SourceExhausted,

    #[error("failed to open output {}: {source}", path.display())]
    SinkOpen { path: PathBuf, source: io::Error },

    #[error("failed to close output: {source}")]
    SinkClose { source: io::Error },

    #[error("writer started without a sink handle")]
    SinkMissing,

    #[error("writer received a second sink handle")]
    DuplicateSink,

    #[error("failed to start {role} thread: {source}")]
    Spawn { role: String, source: io::Error },

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    #[error("writer panicked")]
    WriterPanicked,

    #[error(transparent)]
    Queue(#[from] QueueClosed),
}

impl PipelineError {
    /// Whether this error is only a consequence of another component
    /// stopping (a queue closing underneath its user).
    pub fn is_secondary(&self) -> bool {
        matches!(self, Self::Queue(_))
    }
}
