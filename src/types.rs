//! Record types flowing through the conversion pipeline.
//!
//! ```text
//! LineSource ──LineRecord──▶ work queue ──▶ Workers ──OutputRow──▶ result queue ──▶ Writer ──▶ sink
//! ```
//!
//! Queue items are tagged enums: a termination marker is its own variant,
//! never an empty line or a missing value.

use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ============================================================================
// Line and Triple Records
// ============================================================================

/// One physical input line and its 0-based position in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    /// 0-based line index, one per physical line.
    pub sequence: u64,
    /// Raw line bytes without the line terminator.
    pub raw: Vec<u8>,
}

/// Language tag or datatype attached to a literal object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ObjectAnnotation {
    /// IRI or blank node object, or a plain literal.
    #[default]
    None,
    /// `"..."@lang`
    Language(String),
    /// `"..."^^<iri>`
    Datatype(String),
}

impl ObjectAnnotation {
    /// Column text for the annotation (empty when absent).
    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "",
            Self::Language(tag) => tag,
            Self::Datatype(iri) => iri,
        }
    }
}

/// A rendered subject / predicate / object statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub annotation: ObjectAnnotation,
}

/// A row ready for the writer.
///
/// `sequence` is the index of the line the triple came from, not a row
/// counter: every triple of one line shares it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRow {
    pub sequence: u64,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub annotation: ObjectAnnotation,
}

impl OutputRow {
    /// Tag a triple with the sequence number of its source line.
    pub fn from_triple(sequence: u64, triple: Triple) -> Self {
        Self {
            sequence,
            subject: triple.subject,
            predicate: triple.predicate,
            object: triple.object,
            annotation: triple.annotation,
        }
    }
}

// ============================================================================
// Queue Items
// ============================================================================

/// Item carried by the work queue.
#[derive(Debug)]
pub enum WorkItem {
    Line(LineRecord),
    /// Termination marker: exactly one per worker.
    Stop,
}

/// Item carried by the result queue.
#[derive(Debug)]
pub enum ResultItem {
    /// Always the first item; tells the writer where to write.
    Sink(SinkHandle),
    Row(OutputRow),
    /// Every triple of this line has been forwarded (ordered output only).
    LineDone(u64),
    /// Termination marker for the writer, sent once after all workers exited.
    Stop,
}

// ============================================================================
// Sinks
// ============================================================================

/// Destination handed to the writer as the first result-queue item.
pub enum SinkHandle {
    /// File to create (truncating any existing file).
    Path(PathBuf),
    /// Shared in-memory buffer, used for string conversion and tests.
    Buffer(SharedBuffer),
    /// Any other byte stream, e.g. stdout.
    Stream(Box<dyn Write + Send>),
}

impl fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Buffer(buffer) => write!(f, "Buffer({} bytes)", buffer.len()),
            Self::Stream(_) => write!(f, "Stream"),
        }
    }
}

/// Cloneable in-memory byte sink.
///
/// Clones share the same storage, so the caller keeps a handle while the
/// writer thread owns another.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the bytes written so far.
    pub fn contents(&self) -> Vec<u8> {
        match self.0.lock() {
            Ok(bytes) => bytes.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.contents()).into_owned()
    }

    pub fn len(&self) -> usize {
        match self.0.lock() {
            Ok(bytes) => bytes.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut bytes = self
            .0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "shared buffer lock poisoned"))?;
        bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
