use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::PipelineError;

use super::csv::RejectedRow;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProcessingSeverity {
    /// The read failed because of the data or the configuration.
    Error,
    /// The read failed because of I/O or the CSV tokenizer.
    Critical,
}

impl ProcessingSeverity {
    /// Severity of a failed read.
    pub fn of(error: &PipelineError) -> Self {
        match error {
            PipelineError::Io(_) | PipelineError::Csv(_) | PipelineError::ThreadPool(_) => {
                ProcessingSeverity::Critical
            }
            PipelineError::Chain(_)
            | PipelineError::Processing(_)
            | PipelineError::ColumnCountMismatch { .. }
            | PipelineError::InvalidOptions { .. } => ProcessingSeverity::Error,
        }
    }
}

/// What is being read.
#[derive(Debug, Clone, Default)]
pub struct ReadContext {
    /// Input path, `None` when reading from a caller-supplied reader.
    pub path: Option<PathBuf>,
}

/// Counters reported when a read completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    /// Data records read (header excluded).
    pub rows_read: usize,
    /// Records that passed every chain.
    pub rows_accepted: usize,
    /// Records rejected under [`super::ErrorPolicy::Collect`].
    pub rows_rejected: usize,
}

/// Observer interface for row processing outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait ProcessingObserver: Send + Sync {
    /// Called for each row rejected while collecting errors.
    fn on_rejected(&self, _ctx: &ReadContext, _rejected: &RejectedRow) {}

    /// Called when a read completes.
    fn on_finished(&self, _ctx: &ReadContext, _stats: ProcessingStats) {}

    /// Called when a read fails.
    fn on_failure(&self, _ctx: &ReadContext, _severity: ProcessingSeverity, _error: &PipelineError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &ReadContext, severity: ProcessingSeverity, error: &PipelineError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn ProcessingObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn ProcessingObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl ProcessingObserver for CompositeObserver {
    fn on_rejected(&self, ctx: &ReadContext, rejected: &RejectedRow) {
        for o in &self.observers {
            o.on_rejected(ctx, rejected);
        }
    }

    fn on_finished(&self, ctx: &ReadContext, stats: ProcessingStats) {
        for o in &self.observers {
            o.on_finished(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &ReadContext, severity: ProcessingSeverity, error: &PipelineError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &ReadContext, severity: ProcessingSeverity, error: &PipelineError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Emits processing events as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl ProcessingObserver for TracingObserver {
    fn on_rejected(&self, ctx: &ReadContext, rejected: &RejectedRow) {
        tracing::warn!(
            path = ?ctx.path,
            row = rejected.row,
            column = rejected.error.location().column,
            processor = %rejected.error.processor(),
            error = %rejected.error,
            "row rejected"
        );
    }

    fn on_finished(&self, ctx: &ReadContext, stats: ProcessingStats) {
        tracing::info!(
            path = ?ctx.path,
            rows_read = stats.rows_read,
            rows_accepted = stats.rows_accepted,
            rows_rejected = stats.rows_rejected,
            "csv processing finished"
        );
    }

    fn on_failure(&self, ctx: &ReadContext, severity: ProcessingSeverity, error: &PipelineError) {
        tracing::error!(path = ?ctx.path, ?severity, %error, "csv processing failed");
    }

    fn on_alert(&self, ctx: &ReadContext, severity: ProcessingSeverity, error: &PipelineError) {
        tracing::error!(path = ?ctx.path, ?severity, %error, alert = true, "csv processing failed");
    }
}
