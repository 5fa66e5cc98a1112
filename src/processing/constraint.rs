//! Constraint processors: check a value and pass it through unchanged.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{expect_kind, expect_numeric, expect_text, CapabilitySet, CellProcessor, CellResult};
use crate::context::CellContext;
use crate::error::{ChainError, ChainResult, Violation};
use crate::types::Value;

/// Rejects null input and passes everything else through.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotNull;

impl NotNull {
    pub fn new() -> Self {
        Self
    }
}

impl CellProcessor for NotNull {
    fn name(&self) -> &'static str {
        "NotNull"
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        Ok(value)
    }
}

/// Requires a non-empty string.
///
/// Null input fails with a null-input error, any other kind with a type mismatch and `""` with a
/// constraint violation. Non-empty strings pass unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrNotNullOrEmpty;

impl StrNotNullOrEmpty {
    pub fn new() -> Self {
        Self
    }
}

impl CellProcessor for StrNotNullOrEmpty {
    fn name(&self) -> &'static str {
        "StrNotNullOrEmpty"
    }

    fn accepts(&self) -> CapabilitySet {
        CapabilitySet::TEXT
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        let s = expect_text(value)?;
        if s.is_empty() {
            return Err(Violation::constraint("unexpected empty string", Value::Utf8(s)));
        }
        Ok(Value::Utf8(s))
    }
}

/// Fails when the string contains any of the configured substrings (case-sensitive).
///
/// An empty substring set lets every string through.
#[derive(Debug, Clone, Default)]
pub struct ForbidSubStr {
    forbidden: Vec<String>,
}

impl ForbidSubStr {
    pub fn new<I>(forbidden: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            forbidden: forbidden.into_iter().map(Into::into).collect(),
        }
    }

    pub fn forbidden(&self) -> &[String] {
        &self.forbidden
    }
}

impl CellProcessor for ForbidSubStr {
    fn name(&self) -> &'static str {
        "ForbidSubStr"
    }

    fn accepts(&self) -> CapabilitySet {
        CapabilitySet::TEXT
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        let s = expect_text(value)?;
        match self.forbidden.iter().find(|needle| s.contains(needle.as_str())) {
            Some(needle) => Err(Violation::constraint(
                format!("contains the forbidden substring '{needle}'"),
                Value::Utf8(s),
            )),
            None => Ok(Value::Utf8(s)),
        }
    }
}

/// Older name of [`ForbidSubStr`].
#[deprecated(note = "use ForbidSubStr")]
pub type StrForbidden = ForbidSubStr;

/// Requires the string to contain at least one of the configured substrings.
///
/// An empty substring set lets every string through.
#[derive(Debug, Clone, Default)]
pub struct RequireSubStr {
    required: Vec<String>,
}

impl RequireSubStr {
    pub fn new<I>(required: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
        }
    }
}

impl CellProcessor for RequireSubStr {
    fn name(&self) -> &'static str {
        "RequireSubStr"
    }

    fn accepts(&self) -> CapabilitySet {
        CapabilitySet::TEXT
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        let s = expect_text(value)?;
        if self.required.is_empty() || self.required.iter().any(|needle| s.contains(needle.as_str())) {
            return Ok(Value::Utf8(s));
        }
        Err(Violation::constraint(
            format!("does not contain any of {:?}", self.required),
            Value::Utf8(s),
        ))
    }
}

/// Character length within `min..=max`.
#[derive(Debug, Clone, Copy)]
pub struct StrMinMax {
    min: usize,
    max: usize,
}

impl StrMinMax {
    pub fn new(min: usize, max: usize) -> ChainResult<Self> {
        if min > max {
            return Err(ChainError::invalid(
                "StrMinMax",
                format!("min length {min} is greater than max length {max}"),
            ));
        }
        Ok(Self { min, max })
    }
}

impl CellProcessor for StrMinMax {
    fn name(&self) -> &'static str {
        "StrMinMax"
    }

    fn accepts(&self) -> CapabilitySet {
        CapabilitySet::TEXT
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        let s = expect_text(value)?;
        let len = s.chars().count();
        if len < self.min || len > self.max {
            return Err(Violation::constraint(
                format!(
                    "length {len} is outside the range {}..={}",
                    self.min, self.max
                ),
                Value::Utf8(s),
            ));
        }
        Ok(Value::Utf8(s))
    }
}

/// Inclusive `i64` range.
#[derive(Debug, Clone, Copy)]
pub struct LMinMax {
    min: i64,
    max: i64,
}

impl LMinMax {
    pub fn new(min: i64, max: i64) -> ChainResult<Self> {
        if min > max {
            return Err(ChainError::invalid(
                "LMinMax",
                format!("min {min} is greater than max {max}"),
            ));
        }
        Ok(Self { min, max })
    }
}

impl CellProcessor for LMinMax {
    fn name(&self) -> &'static str {
        "LMinMax"
    }

    fn accepts(&self) -> CapabilitySet {
        CapabilitySet::INTEGRAL
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        match value {
            Value::Int64(v) if v < self.min || v > self.max => Err(Violation::constraint(
                format!("not in the range {}..={}", self.min, self.max),
                value,
            )),
            Value::Int64(_) => Ok(value),
            other => Err(Violation::type_mismatch(self.accepts(), other)),
        }
    }
}

/// Inclusive `f64` range. Integers are compared after widening.
#[derive(Debug, Clone, Copy)]
pub struct DMinMax {
    min: f64,
    max: f64,
}

impl DMinMax {
    pub fn new(min: f64, max: f64) -> ChainResult<Self> {
        if min.is_nan() || max.is_nan() {
            return Err(ChainError::invalid("DMinMax", "range bounds must not be NaN"));
        }
        if min > max {
            return Err(ChainError::invalid(
                "DMinMax",
                format!("min {min} is greater than max {max}"),
            ));
        }
        Ok(Self { min, max })
    }
}

impl CellProcessor for DMinMax {
    fn name(&self) -> &'static str {
        "DMinMax"
    }

    fn accepts(&self) -> CapabilitySet {
        CapabilitySet::NUMERIC
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        let v = expect_numeric(&value)?;
        // NaN fails both comparisons, so check containment positively.
        if (self.min..=self.max).contains(&v) {
            Ok(value)
        } else {
            Err(Violation::constraint(
                format!("not in the range {}..={}", self.min, self.max),
                value,
            ))
        }
    }
}

/// The value must equal one of a fixed set of values.
#[derive(Debug, Clone)]
pub struct IsIncludedIn {
    allowed: Vec<Value>,
    kinds: CapabilitySet,
}

impl IsIncludedIn {
    /// Nulls in `allowed` are ignored; a null cell never reaches this processor.
    pub fn new<I>(allowed: I) -> ChainResult<Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let allowed: Vec<Value> = allowed
            .into_iter()
            .map(Into::into)
            .filter(|v| !v.is_null())
            .collect();
        if allowed.is_empty() {
            return Err(ChainError::invalid("IsIncludedIn", "no allowed values given"));
        }
        let kinds = allowed
            .iter()
            .filter_map(Value::data_type)
            .fold(CapabilitySet::NONE, |acc, t| acc | CapabilitySet::of(t));
        Ok(Self { allowed, kinds })
    }
}

impl CellProcessor for IsIncludedIn {
    fn name(&self) -> &'static str {
        "IsIncludedIn"
    }

    fn accepts(&self) -> CapabilitySet {
        self.kinds
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        let value = expect_kind(value, self.kinds)?;
        if self.allowed.contains(&value) {
            Ok(value)
        } else {
            Err(Violation::constraint("is not one of the allowed values", value))
        }
    }
}

/// Rejects a value that was already seen by this processor.
///
/// Stateful: the seen set lives until [`CellProcessor::reset`]. The error names the row the value
/// was first seen on.
#[derive(Debug, Default)]
pub struct Unique {
    seen: Mutex<HashMap<String, usize>>,
}

impl Unique {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(value: &Value) -> String {
        format!("{}:{}", value.type_name(), value)
    }
}

impl CellProcessor for Unique {
    fn name(&self) -> &'static str {
        "Unique"
    }

    fn process(&self, value: Value, ctx: &CellContext<'_>) -> CellResult<Value> {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        match seen.get(&Self::key(&value)) {
            Some(first) => Err(Violation::constraint(
                format!("duplicate value, first seen on row {first}"),
                value,
            )),
            None => {
                seen.insert(Self::key(&value), ctx.row());
                Ok(value)
            }
        }
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn reset(&self) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
