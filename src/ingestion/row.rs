//! Row-level driver: one optional chain per column.

use std::fmt;

use crate::context::CellContext;
use crate::error::{PipelineError, PipelineResult, ProcessorResult};
use crate::processing::Chain;
use crate::types::Value;

/// Routes every cell of a row through the chain configured for its column.
///
/// Columns without a chain are copied through unchanged. A `RowProcessor` is immutable after
/// construction and can be shared between threads.
pub struct RowProcessor {
    columns: Vec<Option<Chain>>,
}

impl RowProcessor {
    pub fn new(columns: Vec<Option<Chain>>) -> Self {
        Self { columns }
    }

    /// Every column has a chain.
    pub fn from_chains(chains: impl IntoIterator<Item = Chain>) -> Self {
        Self::new(chains.into_iter().map(Some).collect())
    }

    /// Number of columns a row must have.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Chain for a 1-based column, if any.
    pub fn chain(&self, column: usize) -> Option<&Chain> {
        column
            .checked_sub(1)
            .and_then(|idx| self.columns.get(idx))
            .and_then(Option::as_ref)
    }

    /// Process one row. `row` is the 1-based row number used in diagnostics.
    ///
    /// Fails with [`PipelineError::ColumnCountMismatch`] when the row width differs from the
    /// configured column count, otherwise with the first failing cell.
    pub fn process_row(&self, row: usize, raw: &[Value]) -> PipelineResult<Vec<Value>> {
        if raw.len() != self.columns.len() {
            return Err(PipelineError::ColumnCountMismatch {
                row,
                expected: self.columns.len(),
                actual: raw.len(),
            });
        }
        Ok(self.process_cells(row, raw)?)
    }

    fn process_cells(&self, row: usize, raw: &[Value]) -> ProcessorResult<Vec<Value>> {
        self.columns
            .iter()
            .zip(raw)
            .enumerate()
            .map(|(idx, (chain, value))| match chain {
                Some(chain) => {
                    let ctx = CellContext::new(row, idx + 1).with_row_source(raw);
                    chain.execute(value.clone(), &ctx)
                }
                None => Ok(value.clone()),
            })
            .collect()
    }

    pub fn is_stateful(&self) -> bool {
        self.columns.iter().flatten().any(Chain::is_stateful)
    }

    /// Reset stateful processors in every column.
    pub fn reset(&self) {
        for chain in self.columns.iter().flatten() {
            chain.reset();
        }
    }
}

impl fmt::Debug for RowProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowProcessor")
            .field("columns", &self.columns)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::RowProcessor;
    use crate::error::{ErrorKind, PipelineError};
    use crate::processing::{Chain, Optional, ParseLong, StrNotNullOrEmpty, Unique};
    use crate::types::Value;

    fn processor() -> RowProcessor {
        RowProcessor::new(vec![
            Some(
                Chain::builder()
                    .then(Unique::new())
                    .then(ParseLong::new())
                    .build()
                    .unwrap(),
            ),
            None,
            Some(
                Chain::builder()
                    .then(Optional::new())
                    .then(StrNotNullOrEmpty::new())
                    .build()
                    .unwrap(),
            ),
        ])
    }

    #[test]
    fn processes_each_column_with_its_chain() {
        let rows = processor();
        let out = rows
            .process_row(2, &[Value::from("7"), Value::from("raw"), Value::Null])
            .unwrap();
        assert_eq!(out, vec![Value::Int64(7), Value::from("raw"), Value::Null]);
        assert!(rows.chain(2).is_none());
        assert!(rows.chain(1).is_some());
        assert!(rows.chain(0).is_none());
    }

    #[test]
    fn errors_carry_row_column_and_raw_row() {
        let rows = processor();
        let raw = [Value::from("x"), Value::from("raw"), Value::from("ok")];
        let err = rows.process_row(5, &raw).unwrap_err();
        let PipelineError::Processing(err) = err else {
            panic!("expected a processing error, got {err:?}");
        };
        assert_eq!(err.kind(), ErrorKind::Constraint);
        assert_eq!(err.location().row, 5);
        assert_eq!(err.location().column, 1);
        assert_eq!(err.location().row_source, raw.to_vec());
        assert_eq!(err.processor().name, "ParseLong");
    }

    #[test]
    fn wrong_width_is_rejected() {
        let err = processor().process_row(3, &[Value::from("1")]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ColumnCountMismatch {
                row: 3,
                expected: 3,
                actual: 1
            }
        ));
    }

    #[test]
    fn reset_forgets_unique_values() {
        let rows = processor();
        let raw = [Value::from("1"), Value::from("a"), Value::from("b")];
        assert!(rows.is_stateful());
        rows.process_row(2, &raw).unwrap();
        assert!(rows.process_row(3, &raw).is_err());
        rows.reset();
        assert!(rows.process_row(4, &raw).is_ok());
    }
}
