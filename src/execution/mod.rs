//! Execution engine for processing many rows with configurable parallelism.
//!
//! This module sits "above" [`crate::ingestion::RowProcessor`] and provides:
//!
//! - Parallel (chunked) row processing on a dedicated rayon pool
//! - Resource limits / throttling (in-flight chunks)
//! - Real-time metrics + observer hooks for monitoring
//!
//! Output is identical to processing the rows one by one: rows keep their order, and under
//! [`ErrorPolicy::FailFast`] the reported error is the one from the lowest failing row. Row
//! processors holding stateful processors (e.g. `Unique`) are run sequentially so "first seen"
//! stays well defined.

mod observer;
mod semaphore;

use std::ops::Range;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;

use crate::error::{PipelineError, PipelineResult};
use crate::ingestion::{ErrorPolicy, ProcessedRows, RejectedRow, RowProcessor};
use crate::types::Value;

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver,
    TracingExecutionObserver,
};

use semaphore::Semaphore;

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Number of worker threads used by the engine.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Number of rows per chunk.
    pub chunk_size: usize,
    /// Upper bound on concurrently executing chunks.
    ///
    /// This is an additional throttle on top of `num_threads`.
    pub max_in_flight_chunks: usize,
    /// Row number given to the first input row in diagnostics (1-based).
    pub first_row: usize,
    pub error_policy: ErrorPolicy,
    /// Reset stateful processors before every run.
    pub reset_stateful_processors: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        let n = available_threads();
        Self {
            num_threads: Some(n),
            chunk_size: 4_096,
            max_in_flight_chunks: n,
            first_row: 1,
            error_policy: ErrorPolicy::default(),
            reset_stateful_processors: true,
        }
    }
}

impl ExecutionOptions {
    fn validate(&self) -> PipelineResult<()> {
        let invalid = |message: &str| -> PipelineResult<()> {
            Err(PipelineError::InvalidOptions {
                message: message.to_string(),
            })
        };
        if self.chunk_size == 0 {
            return invalid("chunk_size must be > 0");
        }
        if self.max_in_flight_chunks == 0 {
            return invalid("max_in_flight_chunks must be > 0");
        }
        if self.num_threads == Some(0) {
            return invalid("num_threads must be > 0 when set");
        }
        if self.first_row == 0 {
            return invalid("first_row is 1-based");
        }
        Ok(())
    }
}

/// Outcome of one chunk: accepted rows, rejected rows, and the error that stopped it.
#[derive(Default)]
struct ChunkOutput {
    rows: Vec<Vec<Value>>,
    rejected: Vec<RejectedRow>,
    error: Option<PipelineError>,
}

/// A configurable execution engine for running a [`RowProcessor`] over in-memory rows.
pub struct ExecutionEngine {
    pool: ThreadPool,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    ///
    /// Fails with [`PipelineError::InvalidOptions`] for zero sizes and with
    /// [`PipelineError::ThreadPool`] if the pool cannot be created.
    pub fn new(opts: ExecutionOptions) -> PipelineResult<Self> {
        opts.validate()?;
        let n_threads = opts.num_threads.unwrap_or_else(available_threads);
        let pool = ThreadPoolBuilder::new().num_threads(n_threads).build()?;

        Ok(Self {
            pool,
            opts,
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        })
    }

    /// Attach an observer for execution events (metrics/logging).
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.opts
    }

    /// Process every row through `processor`.
    ///
    /// The result has no headers; rows and rejected rows are in input order.
    pub fn process_rows(
        &self,
        processor: &RowProcessor,
        rows: &[Vec<Value>],
    ) -> PipelineResult<ProcessedRows> {
        let start = Instant::now();
        self.metrics.begin_run();

        let stateful = processor.is_stateful();
        if stateful && self.opts.reset_stateful_processors {
            processor.reset();
        }
        self.emit(ExecutionEvent::RunStarted {
            rows: rows.len(),
            parallel: !stateful,
        });

        let per_chunk: Vec<ChunkOutput> = if stateful {
            tracing::debug!(rows = rows.len(), "stateful processors present, running sequentially");
            vec![self.run_chunk(processor, rows, 0..rows.len(), None)]
        } else {
            let sem = Semaphore::new(self.opts.max_in_flight_chunks);
            let ranges = chunk_ranges(rows.len(), self.opts.chunk_size);
            self.pool.install(|| {
                ranges
                    .into_par_iter()
                    .map(|range| self.run_chunk(processor, rows, range, Some(&sem)))
                    .collect()
            })
        };

        let mut out = ProcessedRows::default();
        let mut failure = None;
        for chunk in per_chunk {
            out.rows.extend(chunk.rows);
            out.rejected.extend(chunk.rejected);
            if let Some(e) = chunk.error {
                failure = Some(e);
                break;
            }
        }

        self.metrics.end_run(start.elapsed());
        self.emit(ExecutionEvent::RunFinished {
            elapsed: start.elapsed(),
            metrics: self.metrics.snapshot(),
        });

        match failure {
            Some(e) => Err(e),
            None => Ok(out),
        }
    }

    fn run_chunk(
        &self,
        processor: &RowProcessor,
        rows: &[Vec<Value>],
        range: Range<usize>,
        sem: Option<&Semaphore>,
    ) -> ChunkOutput {
        let _permit = sem.map(|sem| {
            let (permit, waited) = sem.acquire();
            if waited > Duration::ZERO {
                self.metrics.on_throttle_wait(waited);
                self.emit(ExecutionEvent::ThrottleWaited { duration: waited });
            }
            permit
        });

        self.metrics.on_chunk_start();
        self.emit(ExecutionEvent::ChunkStarted {
            start_row: range.start + self.opts.first_row,
            row_count: range.len(),
        });

        let mut out = ChunkOutput {
            rows: Vec::with_capacity(range.len()),
            ..ChunkOutput::default()
        };
        for idx in range {
            let row = idx + self.opts.first_row;
            let raw = &rows[idx];
            self.metrics.on_row_processed();
            match processor.process_row(row, raw) {
                Ok(values) => out.rows.push(values),
                Err(PipelineError::Processing(error))
                    if self.opts.error_policy == ErrorPolicy::Collect =>
                {
                    self.metrics.on_row_rejected();
                    out.rejected.push(RejectedRow {
                        row,
                        raw: raw.clone(),
                        error,
                    });
                }
                Err(e) => {
                    self.metrics.on_row_rejected();
                    out.error = Some(e);
                    break;
                }
            }
        }

        self.emit(ExecutionEvent::ChunkFinished {
            accepted_rows: out.rows.len(),
            rejected_rows: out.rejected.len(),
        });
        self.metrics.on_chunk_end();
        out
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

fn available_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn chunk_ranges(row_count: usize, chunk_size: usize) -> Vec<Range<usize>> {
    (0..row_count)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(row_count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{chunk_ranges, ExecutionEngine, ExecutionOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::context::CellContext;
    use crate::error::{ErrorKind, PipelineError, Violation};
    use crate::execution::{ExecutionEvent, ExecutionObserver};
    use crate::ingestion::{ErrorPolicy, RowProcessor};
    use crate::processing::{CellProcessor, CellResult, Chain, FmtNumber, ParseLong, Unique};
    use crate::types::Value;

    fn rows_of_n(n: usize) -> Vec<Vec<Value>> {
        (0..n).map(|i| vec![Value::Utf8(i.to_string())]).collect()
    }

    fn formatting_processor() -> RowProcessor {
        RowProcessor::from_chains([Chain::builder()
            .then(ParseLong::new())
            .then(FmtNumber::new("#,##0").unwrap())
            .build()
            .unwrap()])
    }

    /// Sleeps so that chunks overlap when not throttled.
    #[derive(Debug)]
    struct Slow;

    impl CellProcessor for Slow {
        fn name(&self) -> &'static str {
            "Slow"
        }

        fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
            std::thread::sleep(Duration::from_millis(1));
            Ok(value)
        }
    }

    fn opts(threads: usize, chunk_size: usize, in_flight: usize) -> ExecutionOptions {
        ExecutionOptions {
            num_threads: Some(threads),
            chunk_size,
            max_in_flight_chunks: in_flight,
            ..ExecutionOptions::default()
        }
    }

    #[test]
    fn parallel_output_matches_sequential() {
        let rows = rows_of_n(2_500);
        let processor = formatting_processor();

        let sequential: Vec<Vec<Value>> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| processor.process_row(i + 1, row).unwrap())
            .collect();

        let engine = ExecutionEngine::new(opts(4, 64, 4)).unwrap();
        let out = engine.process_rows(&processor, &rows).unwrap();
        assert_eq!(out.rows, sequential);
        assert_eq!(out.rows[1_234], vec![Value::from("1,234")]);
        assert!(out.rejected.is_empty());
    }

    #[test]
    fn fail_fast_reports_lowest_failing_row() {
        let mut rows = rows_of_n(300);
        rows[250][0] = Value::from("x");
        rows[40][0] = Value::from("y");
        let engine = ExecutionEngine::new(opts(4, 8, 4)).unwrap();

        let err = engine.process_rows(&formatting_processor(), &rows).unwrap_err();
        let PipelineError::Processing(err) = err else {
            panic!("expected processing error, got {err:?}");
        };
        assert_eq!(err.location().row, 41);
        assert_eq!(err.kind(), ErrorKind::Constraint);
    }

    #[test]
    fn collect_keeps_going_and_counts_rejections() {
        let mut rows = rows_of_n(100);
        rows[10][0] = Value::from("x");
        rows[90][0] = Value::Null;
        let engine = ExecutionEngine::new(ExecutionOptions {
            error_policy: ErrorPolicy::Collect,
            first_row: 2,
            ..opts(2, 16, 2)
        })
        .unwrap();

        let out = engine.process_rows(&formatting_processor(), &rows).unwrap();
        assert_eq!(out.rows.len(), 98);
        assert_eq!(
            out.rejected.iter().map(|r| r.row).collect::<Vec<_>>(),
            vec![12, 92]
        );
        assert_eq!(out.rejected[1].error.kind(), ErrorKind::NullInput);

        let snap = engine.metrics().snapshot();
        assert_eq!(snap.rows_processed, 100);
        assert_eq!(snap.rows_rejected, 2);
    }

    #[test]
    fn stateful_processors_run_in_input_order() {
        let rows: Vec<Vec<Value>> = ["a", "b", "a", "c", "b"]
            .into_iter()
            .map(|s| vec![Value::from(s)])
            .collect();
        let processor =
            RowProcessor::from_chains([Chain::builder().then(Unique::new()).build().unwrap()]);
        let engine = ExecutionEngine::new(ExecutionOptions {
            error_policy: ErrorPolicy::Collect,
            ..opts(4, 1, 4)
        })
        .unwrap();

        for _ in 0..2 {
            let out = engine.process_rows(&processor, &rows).unwrap();
            assert_eq!(
                out.rejected.iter().map(|r| r.row).collect::<Vec<_>>(),
                vec![3, 5]
            );
            assert!(out.rejected[0].error.to_string().contains("first seen on row 1"));
        }
    }

    struct ConcurrencyObserver {
        active_chunks: AtomicUsize,
        max_active_chunks: AtomicUsize,
    }

    impl ConcurrencyObserver {
        fn new() -> Self {
            Self {
                active_chunks: AtomicUsize::new(0),
                max_active_chunks: AtomicUsize::new(0),
            }
        }

        fn max(&self) -> usize {
            self.max_active_chunks.load(Ordering::SeqCst)
        }
    }

    impl ExecutionObserver for ConcurrencyObserver {
        fn on_event(&self, event: &ExecutionEvent) {
            match event {
                ExecutionEvent::ChunkStarted { .. } => {
                    let now = self.active_chunks.fetch_add(1, Ordering::SeqCst) + 1;
                    self.max_active_chunks.fetch_max(now, Ordering::SeqCst);
                }
                ExecutionEvent::ChunkFinished { .. } => {
                    self.active_chunks.fetch_sub(1, Ordering::SeqCst);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn max_in_flight_chunks_throttles_chunk_concurrency() {
        let rows = rows_of_n(100);
        let processor =
            RowProcessor::from_chains([Chain::builder().then(Slow).build().unwrap()]);
        let observer = Arc::new(ConcurrencyObserver::new());
        let obs_trait: Arc<dyn ExecutionObserver> = observer.clone();
        let engine = ExecutionEngine::new(opts(4, 1, 1))
            .unwrap()
            .with_observer(obs_trait);

        let out = engine.process_rows(&processor, &rows).unwrap();
        assert_eq!(out.rows.len(), rows.len());
        assert_eq!(observer.max(), 1);

        let snap = engine.metrics().snapshot();
        assert_eq!(snap.chunks_started, 100);
        assert_eq!(snap.chunks_finished, 100);
        assert_eq!(snap.max_active_chunks, 1);
        assert!(snap.elapsed.is_some());
    }

    #[test]
    fn invalid_options_are_errors() {
        for bad in [opts(0, 1, 1), opts(1, 0, 1), opts(1, 1, 0)] {
            assert!(matches!(
                ExecutionEngine::new(bad),
                Err(PipelineError::InvalidOptions { .. })
            ));
        }
    }

    #[test]
    fn chunk_ranges_cover_all_rows() {
        assert!(chunk_ranges(0, 4).is_empty());
        assert_eq!(chunk_ranges(10, 4), vec![0..4, 4..8, 8..10]);
    }

    #[test]
    fn violations_from_custom_processors_surface() {
        #[derive(Debug)]
        struct Odd;

        impl CellProcessor for Odd {
            fn name(&self) -> &'static str {
                "Odd"
            }

            fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
                match value {
                    Value::Int64(v) if v % 2 == 0 => Err(Violation::constraint("even", value)),
                    other => Ok(other),
                }
            }
        }

        let processor = RowProcessor::from_chains([Chain::builder()
            .then(ParseLong::new())
            .then(Odd)
            .build()
            .unwrap()]);
        let engine = ExecutionEngine::new(ExecutionOptions {
            error_policy: ErrorPolicy::Collect,
            ..opts(2, 3, 2)
        })
        .unwrap();
        let out = engine.process_rows(&processor, &rows_of_n(10)).unwrap();
        assert_eq!(out.rows.len(), 5);
        assert_eq!(out.rejected.len(), 5);
        assert_eq!(out.rejected[0].error.processor().name, "Odd");
    }
}
