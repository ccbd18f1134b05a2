//! Single consumer of the result queue.
//!
//! Only one writer may exist per sink: rows from two writers would
//! interleave bytes. The first item it receives is the sink handle; after
//! that it appends rows until its termination marker arrives.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;

use tracing::{debug, Span};

use super::diagnostics::{Diagnostic, Diagnostics};
use super::error::PipelineError;
use super::queue::QueueReceiver;
use super::reorder::ReorderBuffer;
use crate::storage::{DelimitedWriter, Dialect, RowSink};
use crate::types::{OutputRow, ResultItem, SinkHandle};

/// Order in which rows reach the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderingPolicy {
    /// Whatever order workers deliver them in.
    #[default]
    Arrival,
    /// Input line order, holding back at most `window` lines.
    Sequence { window: usize },
}

impl OrderingPolicy {
    pub fn is_ordered(&self) -> bool {
        matches!(self, Self::Sequence { .. })
    }
}

/// Which optional columns follow `(sequence, subject, predicate, object)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowLayout {
    /// Append the object's language tag or datatype.
    pub object_annotations: bool,
    /// Append this graph identifier to every row.
    pub target_graph: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterReport {
    pub rows_written: u64,
    pub rows_rejected: u64,
    pub markers_consumed: u64,
    pub order_gaps: u64,
}

pub struct Writer {
    dialect: Dialect,
    layout: RowLayout,
    ordering: OrderingPolicy,
    diagnostics: Arc<dyn Diagnostics>,
    span: Span,
}

type BoxedSink = DelimitedWriter<Box<dyn Write + Send>>;

impl Writer {
    pub fn new(
        dialect: Dialect,
        layout: RowLayout,
        ordering: OrderingPolicy,
        diagnostics: Arc<dyn Diagnostics>,
        span: Span,
    ) -> Self {
        Self {
            dialect,
            layout,
            ordering,
            diagnostics,
            span,
        }
    }

    /// Drain the result queue into the sink named by its first item.
    pub fn run(self, results: QueueReceiver<ResultItem>) -> Result<WriterReport, PipelineError> {
        let _entered = self.span.clone().entered();

        let handle = match results.get()? {
            ResultItem::Sink(handle) => handle,
            _ => return Err(PipelineError::SinkMissing),
        };
        debug!(sink = ?handle, "Writer bound to sink");
        let mut sink = self.open(handle)?;

        let mut reorder = match self.ordering {
            OrderingPolicy::Sequence { window } => Some(ReorderBuffer::new(window)),
            OrderingPolicy::Arrival => None,
        };
        let mut report = WriterReport::default();
        let mut ready: Vec<OutputRow> = Vec::new();

        loop {
            match results.get()? {
                ResultItem::Stop => {
                    report.markers_consumed += 1;
                    break;
                }
                ResultItem::Row(row) => match reorder.as_mut() {
                    Some(buffer) => {
                        if let Some(gap) = buffer.push_row(row, &mut ready) {
                            self.report_gap(gap.expected, gap.resumed_at, &mut report);
                        }
                    }
                    None => self.write(&mut sink, &row, &mut report),
                },
                ResultItem::LineDone(sequence) => {
                    if let Some(buffer) = reorder.as_mut() {
                        if let Some(gap) = buffer.complete(sequence, &mut ready) {
                            self.report_gap(gap.expected, gap.resumed_at, &mut report);
                        }
                    }
                }
                ResultItem::Sink(_) => return Err(PipelineError::DuplicateSink),
            }
            for row in ready.drain(..) {
                self.write(&mut sink, &row, &mut report);
            }
        }

        if let Some(buffer) = reorder {
            buffer.finish(&mut ready);
            for row in ready.drain(..) {
                self.write(&mut sink, &row, &mut report);
            }
        }

        sink.finish()
            .map_err(|source| PipelineError::SinkClose { source })?;
        debug!(
            rows = report.rows_written,
            rejected = report.rows_rejected,
            "Writer closed sink"
        );
        Ok(report)
    }

    fn open(&self, handle: SinkHandle) -> Result<BoxedSink, PipelineError> {
        let out: Box<dyn Write + Send> = match handle {
            SinkHandle::Path(path) => {
                let file = File::create(&path)
                    .map_err(|source| PipelineError::SinkOpen { path, source })?;
                Box::new(BufWriter::new(file))
            }
            SinkHandle::Buffer(buffer) => Box::new(buffer),
            SinkHandle::Stream(stream) => stream,
        };
        Ok(DelimitedWriter::new(out, self.dialect))
    }

    fn write(&self, sink: &mut BoxedSink, row: &OutputRow, report: &mut WriterReport) {
        let sequence = row.sequence.to_string();
        let mut fields: Vec<&str> = Vec::with_capacity(6);
        fields.extend([
            sequence.as_str(),
            row.subject.as_str(),
            row.predicate.as_str(),
            row.object.as_str(),
        ]);
        if self.layout.object_annotations {
            fields.push(row.annotation.as_str());
        }
        if let Some(graph) = &self.layout.target_graph {
            fields.push(graph);
        }

        match sink.write_row(&fields) {
            Ok(()) => report.rows_written += 1,
            Err(e) => {
                report.rows_rejected += 1;
                self.diagnostics.report(Diagnostic::RowRejected {
                    sequence: row.sequence,
                    reason: e.to_string(),
                });
            }
        }
    }

    fn report_gap(&self, expected: u64, resumed_at: u64, report: &mut WriterReport) {
        report.order_gaps += 1;
        self.diagnostics.report(Diagnostic::OrderGap {
            expected,
            resumed_at,
        });
    }
}
