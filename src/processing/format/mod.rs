//! Formatting processors: typed values to text.

mod number;

use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

use super::convert::validate_date_format;
use super::{CapabilitySet, CellProcessor, CellResult};
use crate::context::CellContext;
use crate::error::{ChainError, ChainResult, Violation};
use crate::types::Value;

pub use number::{DecimalFormatter, DecimalSymbols, NumberPattern, PatternError};

#[derive(Debug, Clone)]
enum NumberSource {
    /// Immutable pattern; every call formats into its own buffer.
    Pattern(NumberPattern),
    /// Caller-owned formatter with scratch state; every call takes the lock.
    Shared(Arc<Mutex<DecimalFormatter>>),
}

/// Formats a number with a decimal pattern and passes the text on.
///
/// Two configurations are available:
///
/// - [`FmtNumber::new`] / [`FmtNumber::from_pattern`]: the pattern is parsed up front and each
///   invocation formats into a private buffer. Safe to share across threads without contention.
/// - [`FmtNumber::with_formatter`]: uses a caller-supplied [`DecimalFormatter`] whose reusable
///   buffer is mutable state. It is guarded by the caller's `Mutex`, so concurrent use of the
///   chain serializes on that lock. Prefer the pattern form for parallel processing.
#[derive(Debug, Clone)]
pub struct FmtNumber {
    source: NumberSource,
}

impl FmtNumber {
    /// Parse `pattern` now; malformed patterns fail with [`ChainError::InvalidConfig`].
    pub fn new(pattern: &str) -> ChainResult<Self> {
        let pattern = NumberPattern::parse(pattern)
            .map_err(|e| ChainError::invalid("FmtNumber", e.to_string()))?;
        Ok(Self::from_pattern(pattern))
    }

    pub fn from_pattern(pattern: NumberPattern) -> Self {
        Self {
            source: NumberSource::Pattern(pattern),
        }
    }

    /// Format through a shared, externally synchronized formatter.
    pub fn with_formatter(formatter: Arc<Mutex<DecimalFormatter>>) -> Self {
        Self {
            source: NumberSource::Shared(formatter),
        }
    }
}

impl CellProcessor for FmtNumber {
    fn name(&self) -> &'static str {
        "FmtNumber"
    }

    fn accepts(&self) -> CapabilitySet {
        CapabilitySet::NUMERIC
    }

    fn produces(&self, _accepted: CapabilitySet) -> CapabilitySet {
        CapabilitySet::TEXT
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        let text = match (&self.source, &value) {
            (NumberSource::Pattern(p), Value::Int64(v)) => p.format_i64(*v),
            (NumberSource::Pattern(p), Value::Float64(v)) => p.format_f64(*v),
            (NumberSource::Shared(f), Value::Int64(v)) => {
                let mut guard = f.lock().unwrap_or_else(PoisonError::into_inner);
                guard.format_i64(*v).to_owned()
            }
            (NumberSource::Shared(f), Value::Float64(v)) => {
                let mut guard = f.lock().unwrap_or_else(PoisonError::into_inner);
                guard.format_f64(*v).to_owned()
            }
            _ => return Err(Violation::type_mismatch(self.accepts(), value)),
        };
        Ok(Value::Utf8(text))
    }
}

/// Formats a date with a strftime-style format.
#[derive(Debug, Clone)]
pub struct FmtDate {
    format: String,
}

impl FmtDate {
    /// The format is validated immediately.
    pub fn new(format: impl Into<String>) -> ChainResult<Self> {
        let format = format.into();
        validate_date_format("FmtDate", &format)?;
        Ok(Self { format })
    }
}

impl CellProcessor for FmtDate {
    fn name(&self) -> &'static str {
        "FmtDate"
    }

    fn accepts(&self) -> CapabilitySet {
        CapabilitySet::DATE
    }

    fn produces(&self, _accepted: CapabilitySet) -> CapabilitySet {
        CapabilitySet::TEXT
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        match value {
            Value::Date(d) => {
                let mut out = String::new();
                match write!(out, "{}", d.format(&self.format)) {
                    Ok(()) => Ok(Value::Utf8(out)),
                    Err(_) => Err(Violation::constraint(
                        format!("date cannot be rendered with format '{}'", self.format),
                        Value::Date(d),
                    )),
                }
            }
            other => Err(Violation::type_mismatch(self.accepts(), other)),
        }
    }
}

/// Maps booleans to fixed strings.
#[derive(Debug, Clone)]
pub struct FmtBool {
    true_value: String,
    false_value: String,
}

impl FmtBool {
    pub fn new(true_value: impl Into<String>, false_value: impl Into<String>) -> Self {
        Self {
            true_value: true_value.into(),
            false_value: false_value.into(),
        }
    }
}

impl CellProcessor for FmtBool {
    fn name(&self) -> &'static str {
        "FmtBool"
    }

    fn accepts(&self) -> CapabilitySet {
        CapabilitySet::BOOL
    }

    fn produces(&self, _accepted: CapabilitySet) -> CapabilitySet {
        CapabilitySet::TEXT
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        match value {
            Value::Bool(true) => Ok(Value::Utf8(self.true_value.clone())),
            Value::Bool(false) => Ok(Value::Utf8(self.false_value.clone())),
            other => Err(Violation::type_mismatch(self.accepts(), other)),
        }
    }
}
