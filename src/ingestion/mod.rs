//! Driving chains over whole rows and CSV sources.
//!
//! - [`RowProcessor`] pairs each column with an optional [`crate::processing::Chain`].
//! - [`read_csv_from_path`] / [`read_csv_from_reader`] tokenize with the `csv` crate and
//!   process every record, failing fast or collecting rejected rows per [`ErrorPolicy`].
//! - Outcomes can be reported to a [`ProcessingObserver`].

pub mod csv;
pub mod observability;
mod row;

pub use self::csv::{
    read_csv_from_path, read_csv_from_reader, ErrorPolicy, ProcessedRows, ReadOptions, RejectedRow,
};
pub use observability::{
    CompositeObserver, ProcessingObserver, ProcessingSeverity, ProcessingStats, ReadContext,
    TracingObserver,
};
pub use row::RowProcessor;
