//! Pipeline Coordinator - owns the queues and the thread lifecycle of a run.
//!
//! ```text
//! Idle ──▶ Starting ──▶ Draining ──▶ Joining ──▶ Done
//!              │            │            │
//!              └────────────┴────────────┴──▶ Failed
//! ```
//!
//! Starting: allocate both queues, start the writer, hand it the sink, start
//! the workers. Draining: feed every input line. Joining: one marker per
//! started worker, join them, one marker for the writer, join it, close the
//! input.
//!
//! A failure at any step still sends markers to every consumer that was
//! started and joins every thread before the first root cause is returned.

use std::io::BufRead;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, error, info, info_span};

use super::diagnostics::{Diagnostics, TracingDiagnostics};
use super::error::PipelineError;
use super::queue::{self, QueueSender};
use super::state::{PipelineState, RunSummary};
use super::worker::{Worker, WorkerReport};
use super::writer::{OrderingPolicy, RowLayout, Writer, WriterReport};
use crate::acquisition::{LineSource, TripleParser};
use crate::config::defaults::{DEFAULT_QUEUE_CAPACITY, PROGRESS_LOG_INTERVAL};
use crate::storage::Dialect;
use crate::types::{ResultItem, SinkHandle, WorkItem};

/// Everything a run needs besides its input, sink and parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub workers: usize,
    pub queue_capacity: usize,
    /// Sequences between worker progress logs (0 disables them)
    pub progress_interval: u64,
    pub ordering: OrderingPolicy,
    pub dialect: Dialect,
    pub layout: RowLayout,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            progress_interval: PROGRESS_LOG_INTERVAL,
            ordering: OrderingPolicy::Arrival,
            dialect: Dialect::default(),
            layout: RowLayout::default(),
        }
    }
}

/// One less than the available cores, never below one.
pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Runs the reader / workers / writer pipeline.
///
/// `parser_factory` is called once per worker; each worker keeps its parser
/// for the whole run.
pub struct PipelineCoordinator<F> {
    settings: PipelineSettings,
    parser_factory: F,
    diagnostics: Arc<dyn Diagnostics>,
    label: String,
    state: PipelineState,
}

impl<F, P> PipelineCoordinator<F>
where
    F: Fn() -> P,
    P: TripleParser + 'static,
{
    pub fn new(settings: PipelineSettings, parser_factory: F) -> Self {
        Self {
            settings,
            parser_factory,
            diagnostics: Arc::new(TracingDiagnostics),
            label: String::from("<stream>"),
            state: PipelineState::Idle,
        }
    }

    /// Replace the default `warn!`-based reporter for recovered failures.
    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Name recorded on the run's span, usually the input path.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Convert `input` into delimited rows on `sink`.
    ///
    /// Consumes the input; it is dropped once every thread has been joined.
    pub fn run<R: BufRead>(
        &mut self,
        input: R,
        sink: SinkHandle,
    ) -> Result<RunSummary, PipelineError> {
        let started_at = Instant::now();
        let span = info_span!("pipeline", input = %self.label);
        let _entered = span.enter();
        self.transition(PipelineState::Starting);

        let (work_tx, work_rx) = queue::bounded::<WorkItem>("work", self.settings.queue_capacity);
        let (result_tx, result_rx) =
            queue::bounded::<ResultItem>("result", self.settings.queue_capacity);

        let writer = Writer::new(
            self.settings.dialect,
            self.settings.layout.clone(),
            self.settings.ordering,
            Arc::clone(&self.diagnostics),
            span.clone(),
        );
        let writer_handle = match thread::Builder::new()
            .name("rdf2csv-writer".into())
            .spawn(move || writer.run(result_rx))
        {
            Ok(handle) => handle,
            Err(source) => {
                let e = PipelineError::Spawn {
                    role: "writer".into(),
                    source,
                };
                self.fail(&e);
                return Err(e);
            }
        };

        // Startup, feeding and input failures; the first one wins.
        let mut failure: Option<PipelineError> = None;
        if let Err(e) = result_tx.put(ResultItem::Sink(sink)) {
            failure = Some(e.into());
        }

        let mut workers: Vec<(usize, JoinHandle<Result<WorkerReport, PipelineError>>)> =
            Vec::with_capacity(self.settings.workers);
        if failure.is_none() {
            for id in 0..self.settings.workers.max(1) {
                let worker = Worker::new(
                    id,
                    (self.parser_factory)(),
                    self.settings.ordering.is_ordered(),
                    self.settings.progress_interval,
                    Arc::clone(&self.diagnostics),
                    span.clone(),
                );
                let lines = work_rx.clone();
                let results = result_tx.clone();
                match thread::Builder::new()
                    .name(format!("rdf2csv-worker-{id}"))
                    .spawn(move || worker.run(lines, results))
                {
                    Ok(handle) => workers.push((id, handle)),
                    Err(source) => {
                        failure = Some(PipelineError::Spawn {
                            role: format!("worker {id}"),
                            source,
                        });
                        break;
                    }
                }
            }
        }
        drop(work_rx);
        debug!(
            workers = workers.len(),
            queue_capacity = work_tx.capacity(),
            "Workers started"
        );

        self.transition(PipelineState::Draining);
        let mut source = LineSource::new(input);
        if failure.is_none() && !workers.is_empty() {
            if let Err(e) = feed(&mut source, &work_tx) {
                failure = Some(e);
            }
        }

        self.transition(PipelineState::Joining);
        for _ in 0..workers.len() {
            if work_tx.put(WorkItem::Stop).is_err() {
                // Every worker is already gone.
                break;
            }
        }
        let peak_work_depth = work_tx.peak_depth();
        drop(work_tx);

        let worker_count = workers.len();
        let mut worker_reports = Vec::with_capacity(worker_count);
        let mut worker_errors = Vec::new();
        for (id, handle) in workers {
            match handle.join() {
                Ok(Ok(report)) => worker_reports.push(report),
                Ok(Err(e)) => {
                    debug!(worker = id, error = %e, "Worker stopped early");
                    worker_errors.push(e);
                }
                Err(_) => worker_errors.push(PipelineError::WorkerPanicked(id)),
            }
        }

        if let Err(e) = result_tx.put(ResultItem::Stop) {
            debug!(error = %e, "Writer already stopped");
        }
        let peak_result_depth = result_tx.peak_depth();
        drop(result_tx);

        let writer_result = writer_handle
            .join()
            .unwrap_or(Err(PipelineError::WriterPanicked));

        let lines_read = source.lines_read();
        drop(source);

        let writer_report = match writer_result {
            Ok(report) => Some(report),
            Err(e) => {
                failure = Some(match failure.take() {
                    Some(existing) => root_cause(existing, e),
                    None => e,
                });
                None
            }
        };
        for e in worker_errors {
            failure = Some(match failure.take() {
                Some(existing) => root_cause(existing, e),
                None => e,
            });
        }

        if let Some(e) = failure {
            self.fail(&e);
            return Err(e);
        }

        let summary = summarize(
            lines_read,
            worker_count,
            &worker_reports,
            writer_report.unwrap_or_default(),
            peak_work_depth,
            peak_result_depth,
            started_at,
        );
        self.transition(PipelineState::Done);
        info!(
            lines = summary.lines_read,
            rows = summary.rows_written,
            rejected_lines = summary.lines_rejected,
            rejected_statements = summary.statements_rejected,
            rejected_rows = summary.rows_rejected,
            workers = summary.workers,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Pipeline complete"
        );
        Ok(summary)
    }

    fn transition(&mut self, next: PipelineState) {
        debug!(from = %self.state, to = %next, "Pipeline state");
        self.state = next;
    }

    fn fail(&mut self, e: &PipelineError) {
        self.transition(PipelineState::Failed);
        error!(error = %e, "Pipeline failed");
    }
}

/// Push every input line onto the work queue, in order.
fn feed<R: BufRead>(
    source: &mut LineSource<R>,
    work: &QueueSender<WorkItem>,
) -> Result<(), PipelineError> {
    while let Some(record) = source.next_record()? {
        work.put(WorkItem::Line(record))?;
    }
    Ok(())
}

/// Keep `current` unless it only reports a side effect of `candidate`.
fn root_cause(current: PipelineError, candidate: PipelineError) -> PipelineError {
    if current.is_secondary() && !candidate.is_secondary() {
        candidate
    } else {
        current
    }
}

fn summarize(
    lines_read: u64,
    workers: usize,
    worker_reports: &[WorkerReport],
    writer: WriterReport,
    peak_work_depth: usize,
    peak_result_depth: usize,
    started_at: Instant,
) -> RunSummary {
    let mut summary = RunSummary {
        lines_read,
        workers,
        rows_written: writer.rows_written,
        rows_rejected: writer.rows_rejected,
        writer_markers: writer.markers_consumed,
        order_gaps: writer.order_gaps,
        peak_work_depth,
        peak_result_depth,
        elapsed: started_at.elapsed(),
        ..RunSummary::default()
    };
    for report in worker_reports {
        summary.rows_emitted += report.rows_emitted;
        summary.lines_rejected += report.lines_rejected;
        summary.statements_rejected += report.statements_rejected;
        summary.worker_markers += report.markers_consumed;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::{NTriplesParser, ParseError, Statement};
    use crate::pipeline::diagnostics::CollectingDiagnostics;
    use crate::types::SharedBuffer;
    use std::io::{self, BufReader, Read, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn settings(workers: usize) -> PipelineSettings {
        PipelineSettings {
            workers,
            queue_capacity: 8,
            ..PipelineSettings::default()
        }
    }

    #[test]
    fn test_default_worker_count_is_at_least_one() {
        assert!(default_worker_count() >= 1);
    }

    #[test]
    fn test_run_reaches_done_and_counts_markers() {
        let input = "<http://e/s> <http://e/p> \"a\" .\n<http://e/s> <http://e/p> \"b\" .\n";
        let buffer = SharedBuffer::new();
        let mut coordinator = PipelineCoordinator::new(settings(3), NTriplesParser::new);
        assert_eq!(coordinator.state(), PipelineState::Idle);

        let summary = coordinator
            .run(input.as_bytes(), SinkHandle::Buffer(buffer.clone()))
            .unwrap();

        assert_eq!(coordinator.state(), PipelineState::Done);
        assert_eq!(summary.lines_read, 2);
        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.workers, 3);
        assert_eq!(summary.worker_markers, 3);
        assert_eq!(summary.writer_markers, 1);
        assert_eq!(buffer.to_string_lossy().lines().count(), 2);
    }

    #[test]
    fn test_one_parser_per_worker() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let factory = move || {
            counter.fetch_add(1, Ordering::SeqCst);
            NTriplesParser::new()
        };
        let mut coordinator = PipelineCoordinator::new(settings(4), factory);
        coordinator
            .run(&b""[..], SinkHandle::Buffer(SharedBuffer::new()))
            .unwrap();
        assert_eq!(created.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_zero_workers_still_runs_one() {
        let mut coordinator = PipelineCoordinator::new(settings(0), NTriplesParser::new);
        let summary = coordinator
            .run(
                &b"<http://e/s> <http://e/p> <http://e/o> .\n"[..],
                SinkHandle::Buffer(SharedBuffer::new()),
            )
            .unwrap();
        assert_eq!(summary.workers, 1);
        assert_eq!(summary.rows_written, 1);
    }

    /// Yields one good line, then fails.
    struct BrokenInput {
        sent: bool,
    }

    impl Read for BrokenInput {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(io::ErrorKind::Other, "disk went away"));
            }
            self.sent = true;
            let line = b"<http://e/s> <http://e/p> <http://e/o> .\n";
            buf[..line.len()].copy_from_slice(line);
            Ok(line.len())
        }
    }

    #[test]
    fn test_input_failure_joins_everything_and_fails() {
        let diagnostics = Arc::new(CollectingDiagnostics::new());
        let buffer = SharedBuffer::new();
        let mut coordinator = PipelineCoordinator::new(settings(2), NTriplesParser::new)
            .with_diagnostics(diagnostics)
            .with_label("broken.nt");

        let err = coordinator
            .run(
                BufReader::new(BrokenInput { sent: false }),
                SinkHandle::Buffer(buffer.clone()),
            )
            .unwrap_err();

        assert!(matches!(err, PipelineError::Input { line: 2, .. }));
        assert_eq!(coordinator.state(), PipelineState::Failed);
        // The line read before the failure still reached the sink.
        assert_eq!(buffer.to_string_lossy().lines().count(), 1);
    }

    #[test]
    fn test_sink_failure_is_the_root_cause() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("no-such-dir").join("out.csv");
        let input = numbered_lines(500);

        let mut coordinator = PipelineCoordinator::new(settings(2), NTriplesParser::new);
        let err = coordinator
            .run(input.as_bytes(), SinkHandle::Path(path))
            .unwrap_err();

        assert!(matches!(err, PipelineError::SinkOpen { .. }), "got {err}");
        assert_eq!(coordinator.state(), PipelineState::Failed);
    }

    fn numbered_lines(count: usize) -> String {
        (0..count)
            .map(|i| format!("<http://e/s{i}> <http://e/p> \"{i}\" .\n"))
            .collect()
    }

    /// Parses normally until the shared call count reaches `panic_at`.
    struct PanickingParser {
        calls: Arc<AtomicUsize>,
        panic_at: usize,
        inner: NTriplesParser,
    }

    impl TripleParser for PanickingParser {
        fn parse(&mut self, line: &str) -> Result<Vec<Statement>, ParseError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.panic_at {
                panic!("parser blew up");
            }
            self.inner.parse(line)
        }
    }

    #[test]
    fn test_worker_panic_fails_the_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let factory = {
            let calls = Arc::clone(&calls);
            move || PanickingParser {
                calls: Arc::clone(&calls),
                panic_at: 4,
                inner: NTriplesParser::new(),
            }
        };
        let settings = PipelineSettings {
            workers: 3,
            queue_capacity: 2,
            ..PipelineSettings::default()
        };

        let mut coordinator = PipelineCoordinator::new(settings, factory);
        let err = coordinator
            .run(
                numbered_lines(2_000).as_bytes(),
                SinkHandle::Buffer(SharedBuffer::new()),
            )
            .unwrap_err();

        assert!(matches!(err, PipelineError::WorkerPanicked(_)), "got {err}");
        assert_eq!(coordinator.state(), PipelineState::Failed);
    }

    /// A byte stream that panics on the first write.
    struct PanickingStream;

    impl Write for PanickingStream {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            panic!("stream blew up");
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_panic_fails_the_run() {
        let settings = PipelineSettings {
            workers: 3,
            queue_capacity: 2,
            ..PipelineSettings::default()
        };

        let mut coordinator = PipelineCoordinator::new(settings, NTriplesParser::new);
        let err = coordinator
            .run(
                numbered_lines(2_000).as_bytes(),
                SinkHandle::Stream(Box::new(PanickingStream)),
            )
            .unwrap_err();

        assert!(matches!(err, PipelineError::WriterPanicked), "got {err}");
        assert_eq!(coordinator.state(), PipelineState::Failed);
    }

    #[test]
    fn test_root_cause_prefers_primary_errors() {
        let closed = PipelineError::Queue(queue::QueueClosed("work"));
        let picked = root_cause(closed, PipelineError::SinkMissing);
        assert!(matches!(picked, PipelineError::SinkMissing));

        let picked = root_cause(PipelineError::WriterPanicked, PipelineError::SinkMissing);
        assert!(matches!(picked, PipelineError::WriterPanicked));
    }
}
