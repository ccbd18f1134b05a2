//! Input acquisition module
//!
//! Reads N-Triples input line by line and parses individual lines into
//! statements.

pub mod line_source;
pub mod ntriples;

pub use line_source::LineSource;
pub use ntriples::{NTriplesParser, ParseError, Statement, Term, TermError, TripleParser};
