//! Recoverable-failure reporting.
//!
//! Workers and the writer never stop on a bad line or row; they hand a
//! [`Diagnostic`] to the injected [`Diagnostics`] collaborator and move on.

use std::sync::Mutex;

use tracing::warn;

/// A recovered failure observed during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The whole line could not be decoded or parsed.
    LineRejected {
        sequence: u64,
        line: String,
        reason: String,
    },
    /// One statement of a parsed line could not be rendered; its siblings
    /// were still forwarded.
    StatementRejected {
        sequence: u64,
        statement: String,
        reason: String,
    },
    /// The sink refused a single row.
    RowRejected { sequence: u64, reason: String },
    /// Ordered output gave up waiting for `expected` and resumed at
    /// `resumed_at`; rows of the skipped lines are written as they arrive.
    OrderGap { expected: u64, resumed_at: u64 },
}

impl Diagnostic {
    /// Input line the diagnostic refers to.
    pub fn sequence(&self) -> u64 {
        match self {
            Self::LineRejected { sequence, .. }
            | Self::StatementRejected { sequence, .. }
            | Self::RowRejected { sequence, .. } => *sequence,
            Self::OrderGap { expected, .. } => *expected,
        }
    }
}

/// Sink for recovered failures, shared by every pipeline thread.
pub trait Diagnostics: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Default collaborator: one `warn!` per diagnostic.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::LineRejected {
                sequence,
                line,
                reason,
            } => warn!(sequence, line = %line, error = %reason, "Could not parse line"),
            Diagnostic::StatementRejected {
                sequence,
                statement,
                reason,
            } => warn!(sequence, statement = %statement, error = %reason, "Problem with statement"),
            Diagnostic::RowRejected { sequence, reason } => {
                warn!(sequence, error = %reason, "Could not write row");
            }
            Diagnostic::OrderGap {
                expected,
                resumed_at,
            } => warn!(
                expected,
                resumed_at, "Reorder window full, releasing rows out of order"
            ),
        }
    }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    events: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the diagnostics reported so far.
    pub fn events(&self) -> Vec<Diagnostic> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        match self.events.lock() {
            Ok(mut events) => events.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SharedBuffer;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_collecting_diagnostics_across_threads() {
        let diagnostics = Arc::new(CollectingDiagnostics::new());
        let handles: Vec<_> = (0..4u64)
            .map(|i| {
                let d = Arc::clone(&diagnostics);
                thread::spawn(move || {
                    d.report(Diagnostic::RowRejected {
                        sequence: i,
                        reason: "boom".into(),
                    });
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut sequences: Vec<u64> = diagnostics.events().iter().map(Diagnostic::sequence).collect();
        sequences.sort_unstable();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_tracing_diagnostics_warns_for_every_variant() {
        let logs = SharedBuffer::new();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let d = TracingDiagnostics;
            d.report(Diagnostic::LineRejected {
                sequence: 0,
                line: "garbage".into(),
                reason: "expected IRI".into(),
            });
            d.report(Diagnostic::StatementRejected {
                sequence: 1,
                statement: "<s> <p> \"\\q\" .".into(),
                reason: "bad escape".into(),
            });
            d.report(Diagnostic::RowRejected {
                sequence: 2,
                reason: "unrepresentable field".into(),
            });
            d.report(Diagnostic::OrderGap {
                expected: 3,
                resumed_at: 9,
            });
        });

        let out = logs.to_string_lossy();
        assert_eq!(out.matches("WARN").count(), 4, "{out}");
        assert!(out.contains("Could not parse line"), "{out}");
        assert!(out.contains("expected IRI"), "{out}");
        assert!(out.contains("Problem with statement"), "{out}");
        assert!(out.contains("bad escape"), "{out}");
        assert!(out.contains("Could not write row"), "{out}");
        assert!(out.contains("Reorder window full"), "{out}");
        assert!(out.contains("resumed_at=9"), "{out}");
    }
}
