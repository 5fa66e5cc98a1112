//! CSV write path: typed values are processed column by column and written as text.

use std::io::Write;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::ingestion::RowProcessor;
use crate::types::Value;

/// Process `rows` and write them to `path`, creating or truncating the file.
pub fn write_csv_to_path(
    path: impl AsRef<Path>,
    headers: Option<&[String]>,
    rows: &[Vec<Value>],
    processor: &RowProcessor,
) -> PipelineResult<usize> {
    let mut wtr = csv::Writer::from_path(path)?;
    write_csv_to_writer(&mut wtr, headers, rows, processor)
}

/// Process `rows` through `processor` and write the results.
///
/// Every processed cell is written in its display form, with [`Value::Null`] as an empty field.
/// Row numbers in errors are 1-based and count the header when one is written. Stateful
/// processors are not reset. Returns the number of data rows written.
///
/// ```rust
/// use cell_processors::ingestion::RowProcessor;
/// use cell_processors::output::write_csv_to_writer;
/// use cell_processors::processing::{Chain, FmtNumber, Optional};
/// use cell_processors::types::Value;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let processor = RowProcessor::new(vec![
///     None,
///     Some(Chain::builder().then(Optional::new()).then(FmtNumber::new("0.00")?).build()?),
/// ]);
/// let rows = vec![
///     vec![Value::from("a"), Value::from(1.5)],
///     vec![Value::from("b"), Value::Null],
/// ];
///
/// let headers = ["name".to_string(), "price".to_string()];
/// let mut out = Vec::new();
/// {
///     let mut wtr = csv::Writer::from_writer(&mut out);
///     write_csv_to_writer(&mut wtr, Some(&headers), &rows, &processor)?;
/// }
/// assert_eq!(String::from_utf8(out)?, "name,price\na,1.50\nb,\n");
/// # Ok(())
/// # }
/// ```
pub fn write_csv_to_writer<W: Write>(
    wtr: &mut csv::Writer<W>,
    headers: Option<&[String]>,
    rows: &[Vec<Value>],
    processor: &RowProcessor,
) -> PipelineResult<usize> {
    let first_data_row = match headers {
        Some(headers) => {
            if headers.len() != processor.len() {
                return Err(PipelineError::ColumnCountMismatch {
                    row: 1,
                    expected: processor.len(),
                    actual: headers.len(),
                });
            }
            wtr.write_record(headers)?;
            2
        }
        None => 1,
    };

    let mut record: Vec<String> = Vec::with_capacity(processor.len());
    for (idx, row) in rows.iter().enumerate() {
        let processed = processor.process_row(idx + first_data_row, row)?;
        record.clear();
        record.extend(processed.iter().map(Value::to_string));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;

    tracing::debug!(rows = rows.len(), "csv rows written");
    Ok(rows.len())
}
