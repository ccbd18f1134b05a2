//! rdf2csv: N-Triples to delimited text
//!
//! Converts line-oriented RDF into rows of `(line, subject, predicate,
//! object)` ready for bulk loading into a database.
//!
//! ## Architecture
//!
//! - **Acquisition**: numbered input lines and the N-Triples line parser
//! - **Pipeline**: bounded queues, parse workers, the single writer and the
//!   coordinator that starts and stops them
//! - **Storage**: delimited-text row encoding
//! - **Convert**: file and directory driver on top of the pipeline

pub mod acquisition;
pub mod config;
pub mod convert;
pub mod pipeline;
pub mod storage;
pub mod types;

pub use config::{ConfigError, ConverterConfig};
pub use convert::{Converter, FileReport};

pub use acquisition::{LineSource, NTriplesParser, TripleParser};
pub use pipeline::{
    CollectingDiagnostics, Diagnostic, Diagnostics, OrderingPolicy, PipelineCoordinator,
    PipelineError, PipelineSettings, PipelineState, RowLayout, RunSummary, TracingDiagnostics,
};
pub use storage::{DelimitedWriter, Dialect, Quoting, RowSink};
pub use types::{LineRecord, ObjectAnnotation, OutputRow, SharedBuffer, SinkHandle, Triple};
