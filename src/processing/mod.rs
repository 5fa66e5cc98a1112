//! Cell processor chains.
//!
//! A [`Chain`] is a singly-linked list of [`Link`]s, each wrapping one [`CellProcessor`] and
//! exclusively owning the next link. A cell value enters at the head; every link checks or
//! transforms it and hands the result to its successor together with the same
//! [`CellContext`]. The last link's output is the chain's result. The first failure stops the
//! chain and is returned to the caller untouched.
//!
//! Chains are built once with [`ChainBuilder`], which rejects adjacent processors whose
//! [`CapabilitySet`]s do not intersect, and then reused for every row.
//!
//! ## Example
//!
//! ```rust
//! use cell_processors::context::CellContext;
//! use cell_processors::processing::{Chain, FmtNumber, ParseDouble, StrNotNullOrEmpty};
//! use cell_processors::types::Value;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let chain = Chain::builder()
//!     .then(ParseDouble::new())
//!     .then(FmtNumber::new("#,##0.00")?)
//!     .then(StrNotNullOrEmpty::new())
//!     .build()?;
//!
//! let ctx = CellContext::new(2, 1);
//! assert_eq!(chain.execute("1234.5", &ctx)?, Value::from("1,234.50"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Processors
//!
//! - conversion: [`ParseLong`], [`ParseDouble`], [`ParseBool`], [`ParseDate`], [`Trim`],
//!   [`ConvertNullTo`], [`Optional`]
//! - formatting: [`FmtNumber`], [`FmtDate`], [`FmtBool`]
//! - constraints: [`NotNull`], [`StrNotNullOrEmpty`], [`ForbidSubStr`], [`RequireSubStr`],
//!   [`StrMinMax`], [`LMinMax`], [`DMinMax`], [`IsIncludedIn`], [`Unique`]

pub mod capability;
pub mod config;
pub mod constraint;
pub mod convert;
pub mod format;

use std::fmt;

use crate::context::CellContext;
use crate::error::{ChainError, ChainResult, ProcessorError, ProcessorId, ProcessorResult, Violation};
use crate::types::Value;

pub use capability::CapabilitySet;
pub use config::{build_chain, ProcessorConfig, RowConfig};
#[allow(deprecated)]
pub use constraint::StrForbidden;
pub use constraint::{
    DMinMax, ForbidSubStr, IsIncludedIn, LMinMax, NotNull, RequireSubStr, StrMinMax,
    StrNotNullOrEmpty, Unique,
};
pub use convert::{ConvertNullTo, Optional, ParseBool, ParseDate, ParseDouble, ParseLong, Trim};
pub use format::{DecimalFormatter, DecimalSymbols, FmtBool, FmtDate, FmtNumber, NumberPattern};

/// Outcome of a single processor: the value to hand on, or why it was rejected.
pub type CellResult<T> = Result<T, Violation>;

/// One step of a cell processing chain.
///
/// Implementors only see non-null values in [`process`](Self::process); null handling is done
/// by the owning [`Link`] according to [`on_null`](Self::on_null). Processors must be
/// `Send + Sync` so whole chains can be shared between threads. Processors with internal
/// mutable state synchronize it themselves and report it through
/// [`is_stateful`](Self::is_stateful).
pub trait CellProcessor: Send + Sync + fmt::Debug {
    /// Processor name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Value kinds this processor accepts as well-formed input.
    fn accepts(&self) -> CapabilitySet {
        CapabilitySet::ANY
    }

    /// Value kinds this processor can produce, given the kinds that reach it.
    ///
    /// `accepted` is already intersected with [`accepts`](Self::accepts). The default is a
    /// pass-through.
    fn produces(&self, accepted: CapabilitySet) -> CapabilitySet {
        accepted
    }

    /// Null tolerance.
    ///
    /// `None` (the default) makes the link reject null input with
    /// [`ProcessorError::NullInput`]. `Some(value)` ends the chain with `value` without
    /// invoking any further link.
    fn on_null(&self, _ctx: &CellContext<'_>) -> Option<Value> {
        None
    }

    /// Check and/or transform a non-null value.
    fn process(&self, value: Value, ctx: &CellContext<'_>) -> CellResult<Value>;

    /// Whether the processor keeps state across invocations.
    fn is_stateful(&self) -> bool {
        false
    }

    /// Forget state accumulated across invocations. No-op for stateless processors.
    fn reset(&self) {}
}

/// A chain link: one processor plus the exclusively owned remainder of the chain.
#[derive(Debug)]
pub struct Link {
    processor: Box<dyn CellProcessor>,
    position: usize,
    next: Option<Box<Link>>,
}

impl Link {
    pub fn id(&self) -> ProcessorId {
        ProcessorId {
            name: self.processor.name(),
            position: self.position,
        }
    }

    pub fn processor(&self) -> &dyn CellProcessor {
        self.processor.as_ref()
    }

    pub fn next(&self) -> Option<&Link> {
        self.next.as_deref()
    }

    /// Run this link and, on success, everything downstream of it.
    pub fn execute(&self, value: Value, ctx: &CellContext<'_>) -> ProcessorResult<Value> {
        if value.is_null() {
            return match self.processor.on_null(ctx) {
                Some(replacement) => Ok(replacement),
                None => {
                    tracing::trace!(row = ctx.row(), column = ctx.column(), processor = self.processor.name(), "null input rejected");
                    Err(ProcessorError::NullInput {
                        location: ctx.location(),
                        processor: self.id(),
                    })
                }
            };
        }

        let out = self.processor.process(value, ctx).map_err(|violation| {
            tracing::trace!(row = ctx.row(), column = ctx.column(), processor = self.processor.name(), ?violation, "cell rejected");
            violation.at(ctx.location(), self.id())
        })?;

        match &self.next {
            Some(next) => next.execute(out, ctx),
            None => Ok(out),
        }
    }
}

/// A validated, immutable chain of processors for one column.
pub struct Chain {
    head: Box<Link>,
    len: usize,
    input: CapabilitySet,
    output: CapabilitySet,
}

impl Chain {
    pub fn builder() -> ChainBuilder {
        ChainBuilder::new()
    }

    /// Process one cell value.
    pub fn execute(&self, value: impl Into<Value>, ctx: &CellContext<'_>) -> ProcessorResult<Value> {
        self.head.execute(value.into(), ctx)
    }

    pub fn head(&self) -> &Link {
        &self.head
    }

    /// Iterate links from head to tail.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        std::iter::successors(Some(self.head.as_ref()), |link| link.next())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Always `false`; a chain has at least one link.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Kinds the chain was declared to accept at its head.
    pub fn input_capabilities(&self) -> CapabilitySet {
        self.input
    }

    /// Kinds the tail link can produce for non-null input.
    pub fn output_capabilities(&self) -> CapabilitySet {
        self.output
    }

    pub fn is_stateful(&self) -> bool {
        self.links().any(|link| link.processor.is_stateful())
    }

    /// Reset every stateful link, e.g. before processing an unrelated dataset.
    pub fn reset(&self) {
        for link in self.links() {
            link.processor.reset();
        }
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("links", &self.links().map(|l| l.processor.name()).collect::<Vec<_>>())
            .field("input", &self.input)
            .field("output", &self.output)
            .finish()
    }
}

/// Collects processors in order and validates their compatibility on [`build`](Self::build).
pub struct ChainBuilder {
    input: CapabilitySet,
    processors: Vec<Box<dyn CellProcessor>>,
}

impl ChainBuilder {
    /// A builder whose chain input may be of any kind.
    pub fn new() -> Self {
        Self {
            input: CapabilitySet::ANY,
            processors: Vec::new(),
        }
    }

    /// Declare the kinds the caller will feed into the chain head (e.g. `TEXT` for raw CSV).
    pub fn accepting(mut self, input: CapabilitySet) -> Self {
        self.input = input;
        self
    }

    /// Append a processor.
    pub fn then(self, processor: impl CellProcessor + 'static) -> Self {
        self.then_boxed(Box::new(processor))
    }

    pub fn then_boxed(mut self, processor: Box<dyn CellProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Validate capabilities link by link and assemble the chain.
    pub fn build(self) -> ChainResult<Chain> {
        if self.processors.is_empty() {
            return Err(ChainError::Empty);
        }

        let mut flowing = self.input;
        let mut upstream = "chain input";
        for (idx, processor) in self.processors.iter().enumerate() {
            let accepted = flowing & processor.accepts();
            if accepted.is_empty() {
                return Err(ChainError::Incompatible {
                    position: idx + 1,
                    upstream,
                    downstream: processor.name(),
                    produced: flowing,
                    accepted: processor.accepts(),
                });
            }
            flowing = processor.produces(accepted);
            upstream = processor.name();
        }

        let len = self.processors.len();
        let mut next: Option<Box<Link>> = None;
        for (idx, processor) in self.processors.into_iter().enumerate().rev() {
            next = Some(Box::new(Link {
                processor,
                position: idx + 1,
                next,
            }));
        }
        let Some(head) = next else {
            return Err(ChainError::Empty);
        };

        tracing::debug!(links = len, input = %self.input, output = %flowing, "built cell processor chain");

        Ok(Chain {
            head,
            len,
            input: self.input,
            output: flowing,
        })
    }
}

impl Default for ChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChainBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainBuilder")
            .field("input", &self.input)
            .field("processors", &self.processors.iter().map(|p| p.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// Require a string value.
pub fn expect_text(value: Value) -> CellResult<String> {
    match value {
        Value::Utf8(s) => Ok(s),
        other => Err(Violation::type_mismatch(CapabilitySet::TEXT, other)),
    }
}

/// Require a numeric value, widened to `f64`.
pub fn expect_numeric(value: &Value) -> CellResult<f64> {
    match value {
        Value::Int64(v) => Ok(*v as f64),
        Value::Float64(v) => Ok(*v),
        other => Err(Violation::type_mismatch(CapabilitySet::NUMERIC, other.clone())),
    }
}

/// Require a value whose kind is in `expected`.
pub fn expect_kind(value: Value, expected: CapabilitySet) -> CellResult<Value> {
    if expected.admits(&value) {
        Ok(value)
    } else {
        Err(Violation::type_mismatch(expected, value))
    }
}
