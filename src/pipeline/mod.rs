//! Conversion Pipeline Module
//!
//! ## Single reader, N workers, single writer
//!
//! ```text
//! LineSource ─▶ work queue ─▶ Worker × N ─▶ result queue ─▶ Writer ─▶ sink
//!     ▲                                                         │
//!     └───────────────── PipelineCoordinator ───────────────────┘
//! ```
//!
//! Both queues are bounded, so memory stays flat however large the input.
//! Shutdown is driven by termination markers: one per worker on the work
//! queue, then one for the writer on the result queue.

mod coordinator;
pub mod diagnostics;
mod error;
pub mod queue;
pub mod reorder;
mod state;
pub mod worker;
pub mod writer;

pub use coordinator::{default_worker_count, PipelineCoordinator, PipelineSettings};
pub use diagnostics::{CollectingDiagnostics, Diagnostic, Diagnostics, TracingDiagnostics};
pub use error::PipelineError;
pub use queue::QueueClosed;
pub use state::{PipelineState, RunSummary};
pub use writer::{OrderingPolicy, RowLayout};
