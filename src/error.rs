use std::fmt;

use thiserror::Error;

use crate::context::CellLocation;
use crate::processing::CapabilitySet;
use crate::types::Value;

/// Result of running a chain over one cell.
pub type ProcessorResult<T> = Result<T, ProcessorError>;

/// Result of building a chain.
pub type ChainResult<T> = Result<T, ChainError>;

/// Result of the CSV adapters and the execution engine.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Identity of a link inside its chain: processor name and 1-based position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessorId {
    pub name: &'static str,
    pub position: usize,
}

impl fmt::Display for ProcessorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (link {})", self.name, self.position)
    }
}

/// A failure reported by a processor, before its link adds location and identity.
///
/// Returned from [`crate::processing::CellProcessor::process`].
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// The value's runtime type is not one the processor can handle.
    TypeMismatch {
        expected: CapabilitySet,
        value: Value,
    },
    /// The value violates a rule the processor enforces.
    Constraint { message: String, value: Value },
}

impl Violation {
    pub fn type_mismatch(expected: CapabilitySet, value: Value) -> Self {
        Violation::TypeMismatch { expected, value }
    }

    pub fn constraint(message: impl Into<String>, value: Value) -> Self {
        Violation::Constraint {
            message: message.into(),
            value,
        }
    }

    /// Attach the cell location and the raising link.
    pub fn at(self, location: CellLocation, processor: ProcessorId) -> ProcessorError {
        match self {
            Violation::TypeMismatch { expected, value } => ProcessorError::TypeMismatch {
                expected,
                actual: value.type_name(),
                value,
                location,
                processor,
            },
            Violation::Constraint { message, value } => ProcessorError::Constraint {
                message,
                value,
                location,
                processor,
            },
        }
    }
}

/// Coarse classification of a [`ProcessorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NullInput,
    TypeMismatch,
    Constraint,
}

/// Diagnostic error raised while processing a single cell.
///
/// Always fatal for that cell. Carries the cell location (row, column, raw row) and the link
/// that raised it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessorError {
    /// A null value reached a processor that is not null-tolerant.
    #[error("{location}: {processor} does not accept null input")]
    NullInput {
        location: CellLocation,
        processor: ProcessorId,
    },

    /// The value's runtime type is incompatible with the processor.
    #[error("{location}: {processor} expected {expected} but got {actual} value '{value}'")]
    TypeMismatch {
        expected: CapabilitySet,
        actual: &'static str,
        value: Value,
        location: CellLocation,
        processor: ProcessorId,
    },

    /// The value violates the processor's constraint (or could not be converted).
    #[error("{location}: {processor} rejected '{value}': {message}")]
    Constraint {
        message: String,
        value: Value,
        location: CellLocation,
        processor: ProcessorId,
    },
}

impl ProcessorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessorError::NullInput { .. } => ErrorKind::NullInput,
            ProcessorError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            ProcessorError::Constraint { .. } => ErrorKind::Constraint,
        }
    }

    pub fn location(&self) -> &CellLocation {
        match self {
            ProcessorError::NullInput { location, .. }
            | ProcessorError::TypeMismatch { location, .. }
            | ProcessorError::Constraint { location, .. } => location,
        }
    }

    pub fn processor(&self) -> ProcessorId {
        match self {
            ProcessorError::NullInput { processor, .. }
            | ProcessorError::TypeMismatch { processor, .. }
            | ProcessorError::Constraint { processor, .. } => *processor,
        }
    }

    /// The value the failing link received (`None` for null input).
    pub fn value(&self) -> Option<&Value> {
        match self {
            ProcessorError::NullInput { .. } => None,
            ProcessorError::TypeMismatch { value, .. } | ProcessorError::Constraint { value, .. } => {
                Some(value)
            }
        }
    }
}

/// Configuration error raised while building a chain, never during processing.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Two adjacent links have no value kind in common.
    #[error(
        "incompatible processors at link {position}: {upstream} produces {produced} but {downstream} accepts {accepted}"
    )]
    Incompatible {
        position: usize,
        upstream: &'static str,
        downstream: &'static str,
        produced: CapabilitySet,
        accepted: CapabilitySet,
    },

    /// A processor was configured with invalid parameters (bad pattern, inverted range, ...).
    #[error("invalid configuration for {processor}: {message}")]
    InvalidConfig {
        processor: &'static str,
        message: String,
    },

    /// A chain needs at least one processor.
    #[error("chain has no processors")]
    Empty,

    /// Chain configuration could not be deserialized.
    #[error("chain configuration json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ChainError {
    pub(crate) fn invalid(processor: &'static str, message: impl Into<String>) -> Self {
        ChainError::InvalidConfig {
            processor,
            message: message.into(),
        }
    }
}

/// Error type returned by the CSV adapters and the execution engine.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV tokenizer/writer error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Chain construction failed.
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    /// A cell failed processing.
    #[error("processing error: {0}")]
    Processing(#[from] ProcessorError),

    /// A row does not have one cell per configured column.
    #[error("row {row}: expected {expected} columns but found {actual}")]
    ColumnCountMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// The execution thread pool could not be created.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Execution options are out of range.
    #[error("invalid options: {message}")]
    InvalidOptions { message: String },
}

#[cfg(test)]
mod tests {
    use super::{ChainError, ErrorKind, PipelineError, ProcessorId, Violation};
    use crate::context::CellContext;
    use crate::processing::CapabilitySet;
    use crate::types::Value;

    fn id() -> ProcessorId {
        ProcessorId {
            name: "FmtNumber",
            position: 2,
        }
    }

    #[test]
    fn violation_gains_location_and_processor() {
        let row = vec![Value::from("abc"), Value::from("x")];
        let loc = CellContext::new(3, 1).with_row_source(&row).location();
        let err = Violation::type_mismatch(CapabilitySet::NUMERIC, Value::from("abc")).at(loc, id());

        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert_eq!(err.location().row, 3);
        assert_eq!(err.processor(), id());
        assert_eq!(err.value(), Some(&Value::from("abc")));
        let msg = err.to_string();
        assert!(msg.contains("row 3 column 1"));
        assert!(msg.contains("FmtNumber (link 2)"));
        assert!(msg.contains("{int64, float64}"));
        assert!(msg.contains("'abc'"));
    }

    #[test]
    fn pipeline_error_keeps_processor_context() {
        let loc = CellContext::new(9, 4).location();
        let err: PipelineError = Violation::constraint("too long", Value::from("xyz"))
            .at(loc, id())
            .into();
        let msg = err.to_string();
        assert!(msg.starts_with("processing error"));
        assert!(msg.contains("row 9 column 4"));
        assert!(msg.contains("too long"));
    }

    #[test]
    fn chain_error_names_both_links() {
        let err = ChainError::Incompatible {
            position: 2,
            upstream: "ParseDate",
            downstream: "FmtNumber",
            produced: CapabilitySet::DATE,
            accepted: CapabilitySet::NUMERIC,
        };
        let msg = err.to_string();
        assert!(msg.contains("ParseDate produces {date}"));
        assert!(msg.contains("FmtNumber accepts {int64, float64}"));
    }
}
