//! Core value types flowing through processor chains.
//!
//! Cells are dynamically typed: a [`Value`] carries its own [`DataType`] tag (or is
//! [`Value::Null`]). The same tags double as the capability tags processors declare, see
//! [`crate::processing::CapabilitySet`].

use std::fmt;

use chrono::NaiveDate;

/// Logical data type of a non-null [`Value`].
///
/// Also used as the capability tag a processor declares for its input and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
    /// Calendar date without time zone.
    Date,
}

impl DataType {
    /// All data types, in declaration order.
    pub const ALL: [DataType; 5] = [
        DataType::Int64,
        DataType::Float64,
        DataType::Bool,
        DataType::Utf8,
        DataType::Date,
    ];

    /// Short lowercase name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            DataType::Int64 => "int64",
            DataType::Float64 => "float64",
            DataType::Bool => "bool",
            DataType::Utf8 => "utf8",
            DataType::Date => "date",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Missing/absent value.
    #[default]
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
    /// Calendar date.
    Date(NaiveDate),
}

impl Value {
    /// Convert a raw tokenizer cell into a value.
    ///
    /// Empty cells read as [`Value::Null`]; everything else is kept verbatim as [`Value::Utf8`]
    /// (no trimming, use [`crate::processing::Trim`] for that).
    pub fn from_raw(raw: &str) -> Self {
        if raw.is_empty() {
            Value::Null
        } else {
            Value::Utf8(raw.to_owned())
        }
    }

    /// Data type of the value, or `None` for [`Value::Null`].
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Int64(_) => Some(DataType::Int64),
            Value::Float64(_) => Some(DataType::Float64),
            Value::Bool(_) => Some(DataType::Bool),
            Value::Utf8(_) => Some(DataType::Utf8),
            Value::Date(_) => Some(DataType::Date),
        }
    }

    /// Type name for diagnostics (`"null"` for [`Value::Null`]).
    pub fn type_name(&self) -> &'static str {
        self.data_type().map_or("null", DataType::name)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Borrow the string payload, if this is a [`Value::Utf8`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Utf8(s) => Some(s),
            _ => None,
        }
    }
}

/// Renders the cell text: strings verbatim, `Null` as the empty string, dates as ISO 8601.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Utf8(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Utf8(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Utf8(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::{DataType, Value};
    use chrono::NaiveDate;

    #[test]
    fn raw_empty_cell_reads_as_null() {
        assert_eq!(Value::from_raw(""), Value::Null);
        assert_eq!(Value::from_raw(" "), Value::Utf8(" ".to_string()));
        assert_eq!(Value::from_raw("abc"), Value::Utf8("abc".to_string()));
    }

    #[test]
    fn data_type_matches_variant() {
        assert_eq!(Value::Null.data_type(), None);
        assert_eq!(Value::Int64(1).data_type(), Some(DataType::Int64));
        assert_eq!(Value::Float64(1.5).data_type(), Some(DataType::Float64));
        assert_eq!(Value::Bool(true).data_type(), Some(DataType::Bool));
        assert_eq!(Value::from("x").data_type(), Some(DataType::Utf8));
        assert_eq!(Value::Null.type_name(), "null");
    }

    #[test]
    fn display_renders_cell_text() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Int64(-3).to_string(), "-3");
        assert_eq!(Value::Float64(98.5).to_string(), "98.5");
        assert_eq!(Value::Date(d).to_string(), "2024-02-29");
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Utf8("a".to_string()));
    }
}
