//! Parse workers.
//!
//! Each worker owns its own parser instance and loops on the work queue
//! until it takes one termination marker. Bad lines and bad statements are
//! reported and skipped; only a closed queue ends a worker early.

use std::sync::Arc;

use tracing::{debug, Span};

use super::diagnostics::{Diagnostic, Diagnostics};
use super::error::PipelineError;
use super::queue::{QueueClosed, QueueReceiver, QueueSender};
use crate::acquisition::TripleParser;
use crate::types::{LineRecord, OutputRow, ResultItem, WorkItem};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub lines_processed: u64,
    pub rows_emitted: u64,
    pub lines_rejected: u64,
    pub statements_rejected: u64,
    pub markers_consumed: u64,
}

pub struct Worker<P> {
    id: usize,
    parser: P,
    emit_line_done: bool,
    progress_interval: u64,
    diagnostics: Arc<dyn Diagnostics>,
    span: Span,
}

impl<P: TripleParser> Worker<P> {
    pub fn new(
        id: usize,
        parser: P,
        emit_line_done: bool,
        progress_interval: u64,
        diagnostics: Arc<dyn Diagnostics>,
        span: Span,
    ) -> Self {
        Self {
            id,
            parser,
            emit_line_done,
            progress_interval,
            diagnostics,
            span,
        }
    }

    /// Process lines until a termination marker arrives.
    pub fn run(
        mut self,
        lines: QueueReceiver<WorkItem>,
        results: QueueSender<ResultItem>,
    ) -> Result<WorkerReport, PipelineError> {
        let span = self.span.clone();
        let _entered = span.enter();
        let mut report = WorkerReport::default();

        loop {
            match lines.get()? {
                WorkItem::Stop => {
                    report.markers_consumed += 1;
                    break;
                }
                WorkItem::Line(record) => self.process(record, &results, &mut report)?,
            }
        }

        debug!(
            worker = self.id,
            lines = report.lines_processed,
            rows = report.rows_emitted,
            rejected = report.lines_rejected,
            "Worker finished"
        );
        Ok(report)
    }

    fn process(
        &mut self,
        record: LineRecord,
        results: &QueueSender<ResultItem>,
        report: &mut WorkerReport,
    ) -> Result<(), QueueClosed> {
        report.lines_processed += 1;
        if self.progress_interval > 0 && record.sequence % self.progress_interval == 0 {
            debug!(worker = self.id, sequence = record.sequence, "Parsing line");
        }

        match std::str::from_utf8(&record.raw) {
            Ok(text) => match self.parser.parse(text) {
                Ok(statements) => {
                    for statement in &statements {
                        match statement.to_triple() {
                            Ok(triple) => {
                                let row = OutputRow::from_triple(record.sequence, triple);
                                results.put(ResultItem::Row(row))?;
                                report.rows_emitted += 1;
                            }
                            Err(e) => {
                                report.statements_rejected += 1;
                                self.diagnostics.report(Diagnostic::StatementRejected {
                                    sequence: record.sequence,
                                    statement: statement.to_string(),
                                    reason: e.to_string(),
                                });
                            }
                        }
                    }
                }
                Err(e) => self.reject_line(record.sequence, text, e.to_string(), report),
            },
            Err(e) => {
                let text = String::from_utf8_lossy(&record.raw);
                self.reject_line(record.sequence, &text, e.to_string(), report);
            }
        }

        if self.emit_line_done {
            results.put(ResultItem::LineDone(record.sequence))?;
        }
        Ok(())
    }

    fn reject_line(&self, sequence: u64, line: &str, reason: String, report: &mut WorkerReport) {
        report.lines_rejected += 1;
        self.diagnostics.report(Diagnostic::LineRejected {
            sequence,
            line: line.to_string(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{NTriplesParser, ParseError, Statement};
    use crate::pipeline::diagnostics::CollectingDiagnostics;
    use crate::pipeline::queue;

    fn line(sequence: u64, text: &str) -> WorkItem {
        WorkItem::Line(LineRecord {
            sequence,
            raw: text.as_bytes().to_vec(),
        })
    }

    fn drain(rx: &QueueReceiver<ResultItem>) -> Vec<ResultItem> {
        let mut items = Vec::new();
        while !rx.is_empty() {
            items.push(rx.get().unwrap());
        }
        items
    }

    fn run_worker(
        items: Vec<WorkItem>,
        emit_line_done: bool,
    ) -> (WorkerReport, Vec<ResultItem>, Arc<CollectingDiagnostics>) {
        let (work_tx, work_rx) = queue::bounded("work", 64);
        let (result_tx, result_rx) = queue::bounded("result", 64);
        for item in items {
            work_tx.put(item).unwrap();
        }
        let diagnostics = Arc::new(CollectingDiagnostics::new());
        let worker = Worker::new(
            0,
            NTriplesParser::new(),
            emit_line_done,
            0,
            diagnostics.clone(),
            Span::none(),
        );
        let report = worker.run(work_rx, result_tx).unwrap();
        (report, drain(&result_rx), diagnostics)
    }

    #[test]
    fn test_rows_carry_line_sequence() {
        let (report, items, _) = run_worker(
            vec![
                line(7, r#"<http://e/a> <http://e/p> "1" . <http://e/b> <http://e/p> "2" ."#),
                WorkItem::Stop,
            ],
            false,
        );
        assert_eq!(report.rows_emitted, 2);
        assert_eq!(report.markers_consumed, 1);
        for item in items {
            match item {
                ResultItem::Row(row) => assert_eq!(row.sequence, 7),
                other => panic!("unexpected item {other:?}"),
            }
        }
    }

    #[test]
    fn test_garbage_line_is_reported_and_skipped() {
        let (report, items, diagnostics) = run_worker(
            vec![
                line(0, "garbage text"),
                line(1, "<http://e/s> <http://e/p> <http://e/o> ."),
                WorkItem::Stop,
            ],
            false,
        );
        assert_eq!(report.lines_processed, 2);
        assert_eq!(report.lines_rejected, 1);
        assert_eq!(items.len(), 1);

        let events = diagnostics.events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Diagnostic::LineRejected { sequence, line, .. } => {
                assert_eq!(*sequence, 0);
                assert_eq!(line, "garbage text");
            }
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }

    #[test]
    fn test_bad_statement_keeps_its_siblings() {
        let (report, items, diagnostics) = run_worker(
            vec![
                line(
                    4,
                    r#"<http://e/a> <http://e/p> "\uD800" . <http://e/b> <http://e/p> "ok" ."#,
                ),
                WorkItem::Stop,
            ],
            false,
        );
        assert_eq!(report.rows_emitted, 1);
        assert_eq!(report.statements_rejected, 1);
        assert_eq!(report.lines_rejected, 0);
        assert!(matches!(&items[0], ResultItem::Row(row) if row.object == "ok"));
        assert!(matches!(
            &diagnostics.events()[0],
            Diagnostic::StatementRejected { sequence: 4, .. }
        ));
    }

    #[test]
    fn test_invalid_utf8_is_a_rejected_line() {
        let (report, _, diagnostics) = run_worker(
            vec![
                WorkItem::Line(LineRecord {
                    sequence: 2,
                    raw: b"<http://e/s> \xff".to_vec(),
                }),
                WorkItem::Stop,
            ],
            false,
        );
        assert_eq!(report.lines_rejected, 1);
        assert_eq!(diagnostics.events()[0].sequence(), 2);
    }

    #[test]
    fn test_line_done_follows_rows_when_ordered() {
        let (_, items, _) = run_worker(
            vec![
                line(0, "<http://e/s> <http://e/p> <http://e/o> ."),
                line(1, "# comment only"),
                WorkItem::Stop,
            ],
            true,
        );
        assert!(matches!(items[0], ResultItem::Row(_)));
        assert!(matches!(items[1], ResultItem::LineDone(0)));
        assert!(matches!(items[2], ResultItem::LineDone(1)));
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_closed_result_queue_ends_worker_with_error() {
        let (work_tx, work_rx) = queue::bounded("work", 4);
        let (result_tx, result_rx) = queue::bounded::<ResultItem>("result", 4);
        drop(result_rx);
        work_tx
            .put(line(0, "<http://e/s> <http://e/p> <http://e/o> ."))
            .unwrap();

        let worker = Worker::new(
            0,
            NTriplesParser::new(),
            false,
            0,
            Arc::new(CollectingDiagnostics::new()),
            Span::none(),
        );
        assert!(matches!(
            worker.run(work_rx, result_tx),
            Err(PipelineError::Queue(QueueClosed("result")))
        ));
    }

    /// Parser that counts its calls, to check one instance serves many lines.
    struct CountingParser {
        calls: usize,
    }

    impl TripleParser for CountingParser {
        fn parse(&mut self, _line: &str) -> Result<Vec<Statement>, ParseError> {
            self.calls += 1;
            Err(ParseError {
                column: 1,
                message: format!("call {}", self.calls),
            })
        }
    }

    #[test]
    fn test_parser_instance_is_reused_across_lines() {
        let (work_tx, work_rx) = queue::bounded("work", 8);
        let (result_tx, _result_rx) = queue::bounded::<ResultItem>("result", 8);
        for seq in 0..3 {
            work_tx.put(line(seq, "x")).unwrap();
        }
        work_tx.put(WorkItem::Stop).unwrap();

        let diagnostics = Arc::new(CollectingDiagnostics::new());
        let worker = Worker::new(
            0,
            CountingParser { calls: 0 },
            false,
            0,
            diagnostics.clone(),
            Span::none(),
        );
        worker.run(work_rx, result_tx).unwrap();

        let reasons: Vec<String> = diagnostics
            .events()
            .into_iter()
            .filter_map(|d| match d {
                Diagnostic::LineRejected { reason, .. } => Some(reason),
                _ => None,
            })
            .collect();
        assert_eq!(reasons, vec!["call 1 at column 1", "call 2 at column 1", "call 3 at column 1"]);
    }
}
