//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Pipeline
// ============================================================================

/// Bound of both the work queue and the result queue (items).
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Sequences between worker progress log lines.
pub const PROGRESS_LOG_INTERVAL: u64 = 100_000;

/// Lines the writer may hold back while waiting for an earlier line in
/// ordered mode.
pub const DEFAULT_REORDER_WINDOW: usize = 100_000;

// ============================================================================
// Files
// ============================================================================

/// Extension of the files picked up when converting a directory.
pub const INPUT_EXTENSION: &str = "nt";

/// Extension given to the output written next to each input file.
pub const OUTPUT_EXTENSION: &str = "csv";

/// Environment variable naming a config file.
pub const CONFIG_ENV_VAR: &str = "RDF2CSV_CONFIG";

/// Config file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "rdf2csv.toml";

// ============================================================================
// Self-test
// ============================================================================

/// Input converted by `rdf2csv -t`.
pub const SELF_TEST_SAMPLE: &str = "<http://example.org/#this> <http://example.org/p1> \"abc english\"@en .\n\
<http://example.org/#this> <http://example.org/p2> \"abc @de\"@en .";

/// Graph column used by the self-test when none is given.
pub const SELF_TEST_GRAPH: &str = "http://example.org/default";
