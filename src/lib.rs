//! `cell-processors` runs every cell of a tabular row through a chain of small, independent
//! processors (converters, formatters, constraints) before the value is accepted or written out.
//!
//! The core is the chain itself ([`processing`]):
//!
//! - each [`processing::CellProcessor`] declares which value kinds it accepts and produces, and
//!   [`processing::ChainBuilder`] refuses to link processors with nothing in common;
//! - a chain is a singly-linked list of [`processing::Link`]s, each owning the rest of the chain;
//! - every invocation gets a [`context::CellContext`] (row, column, raw row) and every failure is
//!   a [`error::ProcessorError`] that says where it happened and which link raised it.
//!
//! Around that core:
//!
//! - [`processing::config`]: chains described as JSON ([`processing::RowConfig`])
//! - [`ingestion`]: [`ingestion::RowProcessor`] and the CSV read path with observers
//! - [`output`]: the CSV write path
//! - [`execution`]: chunked parallel processing with throttling and metrics
//!
//! ## Example
//!
//! ```rust
//! use cell_processors::ingestion::{read_csv_from_reader, ErrorPolicy, ReadOptions, RowProcessor};
//! use cell_processors::processing::{
//!     Chain, FmtNumber, ForbidSubStr, Optional, ParseDouble, StrNotNullOrEmpty,
//! };
//! use cell_processors::types::Value;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let processor = RowProcessor::from_chains([
//!     Chain::builder()
//!         .then(StrNotNullOrEmpty::new())
//!         .then(ForbidSubStr::new(["<script"]))
//!         .build()?,
//!     Chain::builder()
//!         .then(Optional::new())
//!         .then(ParseDouble::new())
//!         .then(FmtNumber::new("#,##0.00")?)
//!         .build()?,
//! ]);
//!
//! let input = "name,amount\nwidget,1234.5\n<script>,1\ngadget,\n";
//! let mut rdr = csv::Reader::from_reader(input.as_bytes());
//! let options = ReadOptions {
//!     error_policy: ErrorPolicy::Collect,
//!     ..ReadOptions::default()
//! };
//! let out = read_csv_from_reader(&mut rdr, &processor, &options)?;
//!
//! assert_eq!(out.rows[0], vec![Value::from("widget"), Value::from("1,234.50")]);
//! assert_eq!(out.rows[1], vec![Value::from("gadget"), Value::Null]);
//! assert_eq!(out.rejected[0].row, 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`types`]: [`types::Value`] and the [`types::DataType`] capability tags
//! - [`context`]: per-cell diagnostic context
//! - [`error`]: error types for processing, chain construction and pipelines
//! - [`processing`]: the chain and the processors

pub mod context;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod output;
pub mod processing;
pub mod types;

pub use error::{ChainError, PipelineError, PipelineResult, ProcessorError, ProcessorResult};
