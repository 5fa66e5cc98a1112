//! Per-cell diagnostic context.

use std::fmt;

use crate::types::Value;

/// Position and source row of the cell being processed.
///
/// Built by the caller for every cell and passed unchanged to every link of the chain. Row and
/// column numbers are 1-based.
#[derive(Debug, Clone, Copy)]
pub struct CellContext<'a> {
    row: usize,
    column: usize,
    row_source: &'a [Value],
}

impl<'a> CellContext<'a> {
    /// Context for a cell with no source row attached.
    pub fn new(row: usize, column: usize) -> Self {
        Self {
            row,
            column,
            row_source: &[],
        }
    }

    /// Attach the full raw row the cell belongs to.
    pub fn with_row_source(self, row_source: &'a [Value]) -> Self {
        Self { row_source, ..self }
    }

    pub fn row(&self) -> usize {
        self.row
    }

    pub fn column(&self) -> usize {
        self.column
    }

    /// The full raw row, empty if the caller did not attach one.
    pub fn row_source(&self) -> &'a [Value] {
        self.row_source
    }

    /// The raw (unprocessed) value of this cell, if a source row is attached.
    pub fn raw_value(&self) -> Option<&'a Value> {
        self.column
            .checked_sub(1)
            .and_then(|idx| self.row_source.get(idx))
    }

    /// Owned snapshot for error reporting.
    pub fn location(&self) -> CellLocation {
        CellLocation {
            row: self.row,
            column: self.column,
            row_source: self.row_source.to_vec(),
        }
    }
}

/// Owned copy of a [`CellContext`], carried by errors.
#[derive(Debug, Clone, PartialEq)]
pub struct CellLocation {
    /// 1-based row number.
    pub row: usize,
    /// 1-based column number.
    pub column: usize,
    /// Raw values of the whole row (may be empty).
    pub row_source: Vec<Value>,
}

impl CellLocation {
    /// The raw (unprocessed) value of the failing cell, if known.
    pub fn raw_value(&self) -> Option<&Value> {
        self.column
            .checked_sub(1)
            .and_then(|idx| self.row_source.get(idx))
    }
}

impl fmt::Display for CellLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} column {}", self.row, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::CellContext;
    use crate::types::Value;

    #[test]
    fn raw_value_uses_one_based_column() {
        let row = vec![Value::from("a"), Value::Null, Value::from("c")];
        let ctx = CellContext::new(4, 3).with_row_source(&row);
        assert_eq!(ctx.raw_value(), Some(&Value::from("c")));
        assert_eq!(CellContext::new(4, 0).with_row_source(&row).raw_value(), None);
        assert_eq!(CellContext::new(4, 1).raw_value(), None);
    }

    #[test]
    fn location_snapshots_context() {
        let row = vec![Value::from("a"), Value::from("b")];
        let loc = CellContext::new(7, 2).with_row_source(&row).location();
        assert_eq!(loc.to_string(), "row 7 column 2");
        assert_eq!(loc.raw_value(), Some(&Value::from("b")));
        assert_eq!(loc.row_source.len(), 2);
    }
}
