//! Run lifecycle and end-of-run accounting.

use std::fmt;
use std::time::Duration;

/// Lifecycle of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Nothing allocated yet
    #[default]
    Idle,
    /// Queues allocated, writer and workers starting
    Starting,
    /// Feeding input lines to the work queue
    Draining,
    /// Input exhausted, markers sent, waiting for threads
    Joining,
    /// Every thread joined cleanly
    Done,
    /// A fatal error ended the run (threads are still joined first)
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Starting => write!(f, "Starting"),
            Self::Draining => write!(f, "Draining"),
            Self::Joining => write!(f, "Joining"),
            Self::Done => write!(f, "Done"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Counters collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Physical lines read from the input
    pub lines_read: u64,
    /// Rows forwarded by workers
    pub rows_emitted: u64,
    /// Rows the sink accepted
    pub rows_written: u64,
    pub lines_rejected: u64,
    pub statements_rejected: u64,
    pub rows_rejected: u64,
    /// Workers that started
    pub workers: usize,
    /// Termination markers taken off the work queue
    pub worker_markers: u64,
    /// Termination markers taken off the result queue
    pub writer_markers: u64,
    /// Times the reorder window overflowed
    pub order_gaps: u64,
    pub peak_work_depth: usize,
    pub peak_result_depth: usize,
    pub elapsed: Duration,
}

impl RunSummary {
    /// Lines per second over the whole run.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.lines_read as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::Idle.to_string(), "Idle");
        assert_eq!(PipelineState::Joining.to_string(), "Joining");
        assert_eq!(PipelineState::Failed.to_string(), "Failed");
    }

    #[test]
    fn test_default_state_is_idle() {
        assert_eq!(PipelineState::default(), PipelineState::Idle);
    }

    #[test]
    fn test_throughput_handles_zero_elapsed() {
        let summary = RunSummary {
            lines_read: 10,
            ..RunSummary::default()
        };
        assert_eq!(summary.throughput(), 0.0);

        let summary = RunSummary {
            lines_read: 10,
            elapsed: Duration::from_secs(2),
            ..RunSummary::default()
        };
        assert!((summary.throughput() - 5.0).abs() < f64::EPSILON);
    }
}
