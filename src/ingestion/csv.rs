//! CSV read path: tokenize with the `csv` crate, then run every row through a [`RowProcessor`].

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult, ProcessorError};
use crate::types::Value;

use super::observability::{
    ProcessingObserver, ProcessingSeverity, ProcessingStats, ReadContext,
};
use super::row::RowProcessor;

/// What to do when a cell fails its chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Stop at the first failing cell and return its error.
    #[default]
    FailFast,
    /// Record the failing row in [`ProcessedRows::rejected`] and continue.
    Collect,
}

/// A row that failed processing under [`ErrorPolicy::Collect`].
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    /// 1-based record number (the header, when present, is record 1).
    pub row: usize,
    /// Raw cells as read.
    pub raw: Vec<Value>,
    pub error: ProcessorError,
}

/// Result of reading a CSV source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessedRows {
    pub headers: Option<Vec<String>>,
    /// Processed rows, in input order.
    pub rows: Vec<Vec<Value>>,
    pub rejected: Vec<RejectedRow>,
}

impl ProcessedRows {
    pub fn stats(&self) -> ProcessingStats {
        ProcessingStats {
            rows_read: self.rows.len() + self.rejected.len(),
            rows_accepted: self.rows.len(),
            rows_rejected: self.rejected.len(),
        }
    }
}

/// Options controlling CSV reads.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct ReadOptions {
    /// Whether the first record is a header. Only used by [`read_csv_from_path`].
    pub has_headers: bool,
    /// Field delimiter. Only used by [`read_csv_from_path`].
    pub delimiter: u8,
    pub error_policy: ErrorPolicy,
    /// Reset stateful processors (e.g. `Unique`) before reading, so each read is an
    /// independent dataset.
    pub reset_stateful_processors: bool,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn ProcessingObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: ProcessingSeverity,
}

impl fmt::Debug for ReadOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOptions")
            .field("has_headers", &self.has_headers)
            .field("delimiter", &(self.delimiter as char))
            .field("error_policy", &self.error_policy)
            .field("reset_stateful_processors", &self.reset_stateful_processors)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            has_headers: true,
            delimiter: b',',
            error_policy: ErrorPolicy::default(),
            reset_stateful_processors: true,
            observer: None,
            alert_at_or_above: ProcessingSeverity::Critical,
        }
    }
}

/// Read and process a CSV file.
///
/// Records may have any width at the tokenizer level; a width that differs from the processor's
/// column count fails with [`PipelineError::ColumnCountMismatch`].
///
/// # Examples
///
/// ```no_run
/// use cell_processors::ingestion::{read_csv_from_path, ReadOptions};
/// use cell_processors::processing::RowConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let processor = RowConfig::from_json(
///     r#"{"columns": [[{"type": "parse_long"}], null]}"#,
/// )?
/// .build()?;
///
/// let out = read_csv_from_path("orders.csv", &processor, &ReadOptions::default())?;
/// println!("rows={} rejected={}", out.rows.len(), out.rejected.len());
/// # Ok(())
/// # }
/// ```
pub fn read_csv_from_path(
    path: impl AsRef<Path>,
    processor: &RowProcessor,
    options: &ReadOptions,
) -> PipelineResult<ProcessedRows> {
    let path = path.as_ref();
    let ctx = ReadContext {
        path: Some(path.to_path_buf()),
    };
    let result = csv::ReaderBuilder::new()
        .has_headers(options.has_headers)
        .delimiter(options.delimiter)
        .flexible(true)
        .from_path(path)
        .map_err(PipelineError::from)
        .and_then(|mut rdr| process_records(&mut rdr, processor, options, &ctx));
    report(&ctx, options, result)
}

/// Read and process CSV data from an existing reader.
///
/// Header handling and delimiter come from how `rdr` was built.
pub fn read_csv_from_reader<R: Read>(
    rdr: &mut csv::Reader<R>,
    processor: &RowProcessor,
    options: &ReadOptions,
) -> PipelineResult<ProcessedRows> {
    let ctx = ReadContext::default();
    let result = process_records(rdr, processor, options, &ctx);
    report(&ctx, options, result)
}

fn process_records<R: Read>(
    rdr: &mut csv::Reader<R>,
    processor: &RowProcessor,
    options: &ReadOptions,
    ctx: &ReadContext,
) -> PipelineResult<ProcessedRows> {
    if options.reset_stateful_processors && processor.is_stateful() {
        tracing::debug!(path = ?ctx.path, "resetting stateful processors");
        processor.reset();
    }

    let has_headers = rdr.has_headers();
    let headers = if has_headers {
        Some(rdr.headers()?.iter().map(str::to_owned).collect::<Vec<_>>())
    } else {
        None
    };
    let first_data_row = if has_headers { 2 } else { 1 };

    let mut out = ProcessedRows {
        headers,
        ..ProcessedRows::default()
    };
    for (idx, record) in rdr.records().enumerate() {
        let row = idx + first_data_row;
        let record = record?;
        let raw: Vec<Value> = record.iter().map(Value::from_raw).collect();

        match processor.process_row(row, &raw) {
            Ok(values) => out.rows.push(values),
            Err(PipelineError::Processing(error)) if options.error_policy == ErrorPolicy::Collect => {
                let rejected = RejectedRow { row, raw, error };
                if let Some(observer) = &options.observer {
                    observer.on_rejected(ctx, &rejected);
                }
                out.rejected.push(rejected);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(out)
}

fn report(
    ctx: &ReadContext,
    options: &ReadOptions,
    result: PipelineResult<ProcessedRows>,
) -> PipelineResult<ProcessedRows> {
    let Some(observer) = &options.observer else {
        return result;
    };
    match &result {
        Ok(rows) => observer.on_finished(ctx, rows.stats()),
        Err(e) => {
            let severity = ProcessingSeverity::of(e);
            if severity >= options.alert_at_or_above {
                observer.on_alert(ctx, severity, e);
            } else {
                observer.on_failure(ctx, severity, e);
            }
        }
    }
    result
}
