//! Converting processors: parsing raw text into typed values and null handling.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use chrono::format::{Item, StrftimeItems};

use super::{expect_text, CapabilitySet, CellProcessor, CellResult};
use crate::context::CellContext;
use crate::error::{ChainError, ChainResult, Violation};
use crate::types::Value;

/// Parses text into an [`Value::Int64`]. Integers pass through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseLong;

impl ParseLong {
    pub fn new() -> Self {
        Self
    }
}

impl CellProcessor for ParseLong {
    fn name(&self) -> &'static str {
        "ParseLong"
    }

    fn accepts(&self) -> CapabilitySet {
        CapabilitySet::TEXT | CapabilitySet::INTEGRAL
    }

    fn produces(&self, _accepted: CapabilitySet) -> CapabilitySet {
        CapabilitySet::INTEGRAL
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        match value {
            Value::Int64(_) => Ok(value),
            Value::Utf8(s) => match s.parse::<i64>() {
                Ok(v) => Ok(Value::Int64(v)),
                Err(e) => Err(Violation::constraint(
                    format!("could not be parsed as a long ({e})"),
                    Value::Utf8(s),
                )),
            },
            other => Err(Violation::type_mismatch(self.accepts(), other)),
        }
    }
}

/// Parses text into a [`Value::Float64`]. Integers are widened, floats pass through.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseDouble;

impl ParseDouble {
    pub fn new() -> Self {
        Self
    }
}

impl CellProcessor for ParseDouble {
    fn name(&self) -> &'static str {
        "ParseDouble"
    }

    fn accepts(&self) -> CapabilitySet {
        CapabilitySet::TEXT | CapabilitySet::NUMERIC
    }

    fn produces(&self, _accepted: CapabilitySet) -> CapabilitySet {
        CapabilitySet::DECIMAL
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        match value {
            Value::Float64(_) => Ok(value),
            Value::Int64(v) => Ok(Value::Float64(v as f64)),
            Value::Utf8(s) => match s.parse::<f64>() {
                Ok(v) => Ok(Value::Float64(v)),
                Err(e) => Err(Violation::constraint(
                    format!("could not be parsed as a double ({e})"),
                    Value::Utf8(s),
                )),
            },
            other => Err(Violation::type_mismatch(self.accepts(), other)),
        }
    }
}

/// Parses text into a [`Value::Bool`] (case-insensitive). Booleans pass through.
#[derive(Debug, Clone)]
pub struct ParseBool {
    true_values: BTreeSet<String>,
    false_values: BTreeSet<String>,
}

impl ParseBool {
    /// Accepts `1/true/t/y/yes` and `0/false/f/n/no`.
    pub fn new() -> Self {
        let set = |items: &[&str]| items.iter().map(|s| (*s).to_owned()).collect();
        Self {
            true_values: set(&["1", "true", "t", "y", "yes"]),
            false_values: set(&["0", "false", "f", "n", "no"]),
        }
    }

    /// Custom spellings. The two sets must not overlap (compared case-insensitively).
    pub fn with_values<T, F>(true_values: T, false_values: F) -> ChainResult<Self>
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        F: IntoIterator,
        F::Item: AsRef<str>,
    {
        let true_values: BTreeSet<String> = true_values
            .into_iter()
            .map(|s| s.as_ref().to_lowercase())
            .collect();
        let false_values: BTreeSet<String> = false_values
            .into_iter()
            .map(|s| s.as_ref().to_lowercase())
            .collect();
        if let Some(both) = true_values.intersection(&false_values).next() {
            return Err(ChainError::invalid(
                "ParseBool",
                format!("'{both}' is listed as both true and false"),
            ));
        }
        Ok(Self {
            true_values,
            false_values,
        })
    }
}

impl Default for ParseBool {
    fn default() -> Self {
        Self::new()
    }
}

impl CellProcessor for ParseBool {
    fn name(&self) -> &'static str {
        "ParseBool"
    }

    fn accepts(&self) -> CapabilitySet {
        CapabilitySet::TEXT | CapabilitySet::BOOL
    }

    fn produces(&self, _accepted: CapabilitySet) -> CapabilitySet {
        CapabilitySet::BOOL
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        match value {
            Value::Bool(_) => Ok(value),
            Value::Utf8(s) => {
                let key = s.to_lowercase();
                if self.true_values.contains(&key) {
                    Ok(Value::Bool(true))
                } else if self.false_values.contains(&key) {
                    Ok(Value::Bool(false))
                } else {
                    Err(Violation::constraint(
                        "could not be parsed as a boolean",
                        Value::Utf8(s),
                    ))
                }
            }
            other => Err(Violation::type_mismatch(self.accepts(), other)),
        }
    }
}

/// Parses text into a [`Value::Date`] using a strftime-style format. Dates pass through.
#[derive(Debug, Clone)]
pub struct ParseDate {
    format: String,
}

impl ParseDate {
    /// The format is validated immediately.
    pub fn new(format: impl Into<String>) -> ChainResult<Self> {
        let format = format.into();
        validate_date_format("ParseDate", &format)?;
        Ok(Self { format })
    }

    pub fn format(&self) -> &str {
        &self.format
    }
}

impl CellProcessor for ParseDate {
    fn name(&self) -> &'static str {
        "ParseDate"
    }

    fn accepts(&self) -> CapabilitySet {
        CapabilitySet::TEXT | CapabilitySet::DATE
    }

    fn produces(&self, _accepted: CapabilitySet) -> CapabilitySet {
        CapabilitySet::DATE
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        match value {
            Value::Date(_) => Ok(value),
            Value::Utf8(s) => match NaiveDate::parse_from_str(&s, &self.format) {
                Ok(d) => Ok(Value::Date(d)),
                Err(e) => Err(Violation::constraint(
                    format!("could not be parsed as a date with format '{}' ({e})", self.format),
                    Value::Utf8(s),
                )),
            },
            other => Err(Violation::type_mismatch(self.accepts(), other)),
        }
    }
}

pub(crate) fn validate_date_format(processor: &'static str, format: &str) -> ChainResult<()> {
    if format.is_empty() {
        return Err(ChainError::invalid(processor, "date format is empty"));
    }
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ChainError::invalid(
            processor,
            format!("invalid date format '{format}'"),
        ));
    }
    Ok(())
}

/// Strips leading and trailing whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct Trim;

impl Trim {
    pub fn new() -> Self {
        Self
    }
}

impl CellProcessor for Trim {
    fn name(&self) -> &'static str {
        "Trim"
    }

    fn accepts(&self) -> CapabilitySet {
        CapabilitySet::TEXT
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        let s = expect_text(value)?;
        let trimmed = s.trim();
        if trimmed.len() == s.len() {
            Ok(Value::Utf8(s))
        } else {
            Ok(Value::Utf8(trimmed.to_owned()))
        }
    }
}

/// Replaces a null cell with a fixed value and ends the chain there.
///
/// Non-null values pass through to the next processor.
#[derive(Debug, Clone)]
pub struct ConvertNullTo {
    replacement: Value,
}

impl ConvertNullTo {
    pub fn new(replacement: impl Into<Value>) -> Self {
        Self {
            replacement: replacement.into(),
        }
    }
}

impl CellProcessor for ConvertNullTo {
    fn name(&self) -> &'static str {
        "ConvertNullTo"
    }

    fn produces(&self, accepted: CapabilitySet) -> CapabilitySet {
        match self.replacement.data_type() {
            Some(t) => accepted | CapabilitySet::of(t),
            None => accepted,
        }
    }

    fn on_null(&self, _ctx: &CellContext<'_>) -> Option<Value> {
        Some(self.replacement.clone())
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        Ok(value)
    }
}

/// Lets null cells through as [`Value::Null`] without running the rest of the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct Optional;

impl Optional {
    pub fn new() -> Self {
        Self
    }
}

impl CellProcessor for Optional {
    fn name(&self) -> &'static str {
        "Optional"
    }

    fn on_null(&self, _ctx: &CellContext<'_>) -> Option<Value> {
        Some(Value::Null)
    }

    fn process(&self, value: Value, _ctx: &CellContext<'_>) -> CellResult<Value> {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{ConvertNullTo, Optional, ParseBool, ParseDate, ParseDouble, ParseLong, Trim};
    use crate::context::CellContext;
    use crate::error::{ChainError, ErrorKind};
    use crate::processing::{CapabilitySet, Chain, CellProcessor, LMinMax};
    use crate::types::Value;

    fn ctx() -> CellContext<'static> {
        CellContext::new(2, 1)
    }

    #[test]
    fn parse_long_parses_and_passes_integers() {
        let chain = Chain::builder().then(ParseLong::new()).build().unwrap();
        assert_eq!(chain.execute("42", &ctx()).unwrap(), Value::Int64(42));
        assert_eq!(chain.execute(-7i64, &ctx()).unwrap(), Value::Int64(-7));

        let err = chain.execute("4.2", &ctx()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Constraint);
        assert_eq!(err.value(), Some(&Value::from("4.2")));

        let err = chain.execute(true, &ctx()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn parse_double_widens_integers() {
        let chain = Chain::builder().then(ParseDouble::new()).build().unwrap();
        assert_eq!(chain.execute("2.5", &ctx()).unwrap(), Value::Float64(2.5));
        assert_eq!(chain.execute(3i64, &ctx()).unwrap(), Value::Float64(3.0));
        assert_eq!(
            chain.execute("abc", &ctx()).unwrap_err().kind(),
            ErrorKind::Constraint
        );
    }

    #[test]
    fn parse_bool_is_case_insensitive() {
        let chain = Chain::builder().then(ParseBool::new()).build().unwrap();
        assert_eq!(chain.execute("YES", &ctx()).unwrap(), Value::Bool(true));
        assert_eq!(chain.execute("f", &ctx()).unwrap(), Value::Bool(false));
        assert!(chain.execute("maybe", &ctx()).is_err());

        let custom = ParseBool::with_values(["oui"], ["non"]).unwrap();
        assert_eq!(custom.process(Value::from("Oui"), &ctx()).unwrap(), Value::Bool(true));
        assert!(matches!(
            ParseBool::with_values(["x"], ["X"]),
            Err(ChainError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn parse_date_validates_format_eagerly() {
        let p = ParseDate::new("%d/%m/%Y").unwrap();
        let out = p.process(Value::from("29/02/2024"), &ctx()).unwrap();
        assert_eq!(out, Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(p.process(Value::from("31/02/2024"), &ctx()).is_err());

        assert!(ParseDate::new("%Y-%").is_err());
        assert!(ParseDate::new("").is_err());
    }

    #[test]
    fn date_output_cannot_feed_a_numeric_constraint() {
        let err = Chain::builder()
            .then(ParseDate::new("%Y-%m-%d").unwrap())
            .then(LMinMax::new(0, 10).unwrap())
            .build()
            .unwrap_err();
        assert!(matches!(err, ChainError::Incompatible { position: 2, .. }));
    }

    #[test]
    fn trim_strips_whitespace() {
        assert_eq!(
            Trim.process(Value::from("  a b "), &ctx()).unwrap(),
            Value::from("a b")
        );
        assert_eq!(
            Trim.process(Value::Int64(1), &ctx()).unwrap_err(),
            crate::error::Violation::type_mismatch(CapabilitySet::TEXT, Value::Int64(1))
        );
    }

    #[test]
    fn convert_null_to_short_circuits() {
        let chain = Chain::builder()
            .then(ConvertNullTo::new("n/a"))
            .then(ParseLong::new())
            .build()
            .unwrap();
        assert_eq!(chain.execute(Value::Null, &ctx()).unwrap(), Value::from("n/a"));
        assert_eq!(chain.execute("5", &ctx()).unwrap(), Value::Int64(5));
    }

    #[test]
    fn optional_returns_null_for_null() {
        let chain = Chain::builder()
            .then(Optional::new())
            .then(ParseLong::new())
            .build()
            .unwrap();
        assert_eq!(chain.execute(Value::Null, &ctx()).unwrap(), Value::Null);
        assert_eq!(chain.execute("9", &ctx()).unwrap(), Value::Int64(9));
    }
}
