//! Declarative chain configuration.
//!
//! Chains can be described as data (typically JSON) and built at runtime:
//!
//! ```rust
//! use cell_processors::processing::RowConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RowConfig::from_json(
//!     r#"{
//!         "columns": [
//!             [{ "type": "unique" }, { "type": "parse_long" }],
//!             [{ "type": "str_not_null_or_empty" }, { "type": "forbid_sub_str", "substrings": ["<", ">"] }],
//!             null
//!         ]
//!     }"#,
//! )?;
//! let rows = config.build()?;
//! assert_eq!(rows.len(), 3);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};

use super::{
    CellProcessor, Chain, ConvertNullTo, DMinMax, DecimalSymbols, FmtBool, FmtDate, FmtNumber,
    ForbidSubStr, IsIncludedIn, LMinMax, NotNull, NumberPattern, Optional, ParseBool, ParseDate,
    ParseDouble, ParseLong, RequireSubStr, StrMinMax, StrNotNullOrEmpty, Trim, Unique,
};
use crate::error::{ChainError, ChainResult};
use crate::ingestion::RowProcessor;
use crate::types::Value;

/// One processor, as configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessorConfig {
    NotNull,
    Optional,
    ConvertNullTo {
        value: serde_json::Value,
    },
    Trim,
    ParseLong,
    ParseDouble,
    ParseBool {
        #[serde(default)]
        true_values: Option<Vec<String>>,
        #[serde(default)]
        false_values: Option<Vec<String>>,
    },
    ParseDate {
        format: String,
    },
    FmtNumber {
        pattern: String,
        #[serde(default)]
        decimal_separator: Option<char>,
        #[serde(default)]
        grouping_separator: Option<char>,
    },
    FmtDate {
        format: String,
    },
    FmtBool {
        true_value: String,
        false_value: String,
    },
    StrNotNullOrEmpty,
    /// `str_forbidden` is accepted as an older spelling.
    #[serde(alias = "str_forbidden")]
    ForbidSubStr {
        substrings: Vec<String>,
    },
    RequireSubStr {
        substrings: Vec<String>,
    },
    StrMinMax {
        min: usize,
        max: usize,
    },
    LMinMax {
        min: i64,
        max: i64,
    },
    DMinMax {
        min: f64,
        max: f64,
    },
    IsIncludedIn {
        values: Vec<serde_json::Value>,
    },
    Unique,
}

impl ProcessorConfig {
    /// Instantiate the processor, validating its parameters.
    pub fn build(&self) -> ChainResult<Box<dyn CellProcessor>> {
        Ok(match self {
            ProcessorConfig::NotNull => Box::new(NotNull::new()),
            ProcessorConfig::Optional => Box::new(Optional::new()),
            ProcessorConfig::ConvertNullTo { value } => {
                Box::new(ConvertNullTo::new(scalar("ConvertNullTo", value)?))
            }
            ProcessorConfig::Trim => Box::new(Trim::new()),
            ProcessorConfig::ParseLong => Box::new(ParseLong::new()),
            ProcessorConfig::ParseDouble => Box::new(ParseDouble::new()),
            ProcessorConfig::ParseBool {
                true_values,
                false_values,
            } => match (true_values, false_values) {
                (None, None) => Box::new(ParseBool::new()),
                (Some(t), Some(f)) => Box::new(ParseBool::with_values(t, f)?),
                _ => {
                    return Err(ChainError::invalid(
                        "ParseBool",
                        "true_values and false_values must be given together",
                    ));
                }
            },
            ProcessorConfig::ParseDate { format } => Box::new(ParseDate::new(format.as_str())?),
            ProcessorConfig::FmtNumber {
                pattern,
                decimal_separator,
                grouping_separator,
            } => {
                let defaults = DecimalSymbols::default();
                let symbols = DecimalSymbols {
                    decimal_separator: decimal_separator.unwrap_or(defaults.decimal_separator),
                    grouping_separator: grouping_separator.unwrap_or(defaults.grouping_separator),
                    ..defaults
                };
                let pattern = NumberPattern::parse(pattern)
                    .map_err(|e| ChainError::invalid("FmtNumber", e.to_string()))?
                    .with_symbols(symbols);
                Box::new(FmtNumber::from_pattern(pattern))
            }
            ProcessorConfig::FmtDate { format } => Box::new(FmtDate::new(format.as_str())?),
            ProcessorConfig::FmtBool {
                true_value,
                false_value,
            } => Box::new(FmtBool::new(true_value.as_str(), false_value.as_str())),
            ProcessorConfig::StrNotNullOrEmpty => Box::new(StrNotNullOrEmpty::new()),
            ProcessorConfig::ForbidSubStr { substrings } => {
                Box::new(ForbidSubStr::new(substrings.iter().cloned()))
            }
            ProcessorConfig::RequireSubStr { substrings } => {
                Box::new(RequireSubStr::new(substrings.iter().cloned()))
            }
            ProcessorConfig::StrMinMax { min, max } => Box::new(StrMinMax::new(*min, *max)?),
            ProcessorConfig::LMinMax { min, max } => Box::new(LMinMax::new(*min, *max)?),
            ProcessorConfig::DMinMax { min, max } => Box::new(DMinMax::new(*min, *max)?),
            ProcessorConfig::IsIncludedIn { values } => {
                let values = values
                    .iter()
                    .map(|v| scalar("IsIncludedIn", v))
                    .collect::<ChainResult<Vec<_>>>()?;
                Box::new(IsIncludedIn::new(values)?)
            }
            ProcessorConfig::Unique => Box::new(Unique::new()),
        })
    }
}

fn scalar(processor: &'static str, json: &serde_json::Value) -> ChainResult<Value> {
    match json {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::String(s) => Ok(Value::Utf8(s.clone())),
        serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(Value::Int64(i)),
            (None, Some(f)) => Ok(Value::Float64(f)),
            (None, None) => Err(ChainError::invalid(
                processor,
                format!("number {n} is out of range"),
            )),
        },
        other => Err(ChainError::invalid(
            processor,
            format!("expected a scalar value but got {other}"),
        )),
    }
}

/// Build a chain from configuration, in list order.
pub fn build_chain(configs: &[ProcessorConfig]) -> ChainResult<Chain> {
    let mut builder = Chain::builder();
    for config in configs {
        builder = builder.then_boxed(config.build()?);
    }
    builder.build()
}

/// Per-column chain configuration for a whole row. `None` leaves a column unprocessed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowConfig {
    pub columns: Vec<Option<Vec<ProcessorConfig>>>,
}

impl RowConfig {
    pub fn from_json(json: &str) -> ChainResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> ChainResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Build one chain per configured column.
    pub fn build(&self) -> ChainResult<RowProcessor> {
        let columns = self
            .columns
            .iter()
            .map(|column| column.as_deref().map(build_chain).transpose())
            .collect::<ChainResult<Vec<_>>>()?;
        Ok(RowProcessor::new(columns))
    }
}
