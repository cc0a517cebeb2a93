//! The pull-based operator contract.
//!
//! Every operator is an [`OpIterator`]: opened once, pulled with
//! `has_next`/`next` until end-of-stream, optionally rewound, and closed on
//! every exit path. `next` past end-of-stream keeps returning `None` rather
//! than failing, so drains compose without sentinel checks.

use crate::errors::ExecutionError;
use strata::tuple::{Tuple, TupleDesc};

pub mod dml;
pub mod join;
pub mod pipeline;
pub mod scan;

pub use dml::{Delete, Insert};
pub use join::Join;
pub use pipeline::{Filter, OrderBy};
pub use scan::SeqScan;

pub trait OpIterator {
    /// Acquires child resources and positions the stream before its first
    /// tuple.
    fn open(&mut self) -> Result<(), ExecutionError>;

    /// True when another tuple is available.
    fn has_next(&mut self) -> Result<bool, ExecutionError>;

    /// The next output tuple, or `None` at (and after) end-of-stream.
    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError>;

    /// Restarts the stream from its first output tuple. Operators that
    /// materialized their output just reset their cursor.
    fn rewind(&mut self) -> Result<(), ExecutionError>;

    /// Releases child resources. Safe to call more than once.
    fn close(&mut self);

    /// The schema of the tuples this operator emits.
    fn tuple_desc(&self) -> &TupleDesc;

    /// The operator's inputs, left to right; empty for leaves.
    fn children(&self) -> Vec<&dyn OpIterator>;
}

/// Drains an operator into a vector. The operator must already be open.
pub fn drain(op: &mut dyn OpIterator) -> Result<Vec<Tuple>, ExecutionError> {
    let mut out = Vec::new();
    while let Some(tuple) = op.next()? {
        out.push(tuple);
    }
    Ok(out)
}

pub(crate) fn not_open() -> ExecutionError {
    ExecutionError::GenericError("iterator is not open".to_string())
}

/// A rewindable iterator over an in-memory tuple list. Aggregates use it for
/// their materialized results, and tests use it as a static child.
pub struct TupleIterator {
    td: TupleDesc,
    tuples: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl TupleIterator {
    pub fn new(td: TupleDesc, tuples: Vec<Tuple>) -> Self {
        Self {
            td,
            tuples,
            cursor: 0,
            opened: false,
        }
    }
}

impl OpIterator for TupleIterator {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, ExecutionError> {
        if !self.opened {
            return Err(not_open());
        }
        Ok(self.cursor < self.tuples.len())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        if !self.opened {
            return Err(not_open());
        }
        let tuple = self.tuples.get(self.cursor).cloned();
        if tuple.is_some() {
            self.cursor += 1;
        }
        Ok(tuple)
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        if !self.opened {
            return Err(not_open());
        }
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    fn children(&self) -> Vec<&dyn OpIterator> {
        Vec::new()
    }
}
