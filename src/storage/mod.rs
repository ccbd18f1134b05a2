//! Output storage module
//!
//! Turns output rows into delimited text on a file or in-memory sink.

pub mod delimited;

pub use delimited::{DelimitedWriter, Dialect, Quoting, RowSink, SinkError};
