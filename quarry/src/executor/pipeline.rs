//! Tuple-at-a-time pipeline operators: Filter and OrderBy.

use super::{not_open, OpIterator};
use crate::errors::ExecutionError;
use crate::predicate::Predicate;
use strata::tuple::{Tuple, TupleDesc};

/// Emits exactly the child tuples that satisfy a predicate.
pub struct Filter {
    predicate: Predicate,
    child: Box<dyn OpIterator>,
    lookahead: Option<Tuple>,
    opened: bool,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator>) -> Self {
        Self {
            predicate,
            child,
            lookahead: None,
            opened: false,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        while let Some(tuple) = self.child.next()? {
            if self.predicate.matches(&tuple) {
                return Ok(Some(tuple));
            }
        }
        Ok(None)
    }
}

impl OpIterator for Filter {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.child.open()?;
        self.lookahead = None;
        self.opened = true;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, ExecutionError> {
        if !self.opened {
            return Err(not_open());
        }
        if self.lookahead.is_none() {
            self.lookahead = self.fetch_next()?;
        }
        Ok(self.lookahead.is_some())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        if !self.opened {
            return Err(not_open());
        }
        if self.lookahead.is_none() {
            self.lookahead = self.fetch_next()?;
        }
        Ok(self.lookahead.take())
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        if !self.opened {
            return Err(not_open());
        }
        self.child.rewind()?;
        self.lookahead = None;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.lookahead = None;
        self.opened = false;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        self.child.tuple_desc()
    }

    fn children(&self) -> Vec<&dyn OpIterator> {
        vec![self.child.as_ref()]
    }
}

/// Materializes the child and emits its tuples ordered by one field.
pub struct OrderBy {
    child: Box<dyn OpIterator>,
    field: usize,
    ascending: bool,
    rows: Vec<Tuple>,
    cursor: usize,
    opened: bool,
}

impl OrderBy {
    pub fn new(field: usize, ascending: bool, child: Box<dyn OpIterator>) -> Self {
        Self {
            child,
            field,
            ascending,
            rows: Vec::new(),
            cursor: 0,
            opened: false,
        }
    }

    pub fn order_by_field(&self) -> usize {
        self.field
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }
}

impl OpIterator for OrderBy {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.child.open()?;
        let mut rows = Vec::new();
        while let Some(tuple) = self.child.next()? {
            if tuple.field(self.field).is_none() {
                self.child.close();
                return Err(ExecutionError::FieldNotFound(format!(
                    "sort field {} out of range",
                    self.field
                )));
            }
            rows.push(tuple);
        }

        let field = self.field;
        rows.sort_by(|a, b| {
            let ordering = a.field(field).cmp(&b.field(field));
            if self.ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });

        self.rows = rows;
        self.cursor = 0;
        self.opened = true;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, ExecutionError> {
        if !self.opened {
            return Err(not_open());
        }
        Ok(self.cursor < self.rows.len())
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        if !self.opened {
            return Err(not_open());
        }
        let tuple = self.rows.get(self.cursor).cloned();
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
        self.child.close();
        self.rows.clear();
        self.cursor = 0;
        self.opened = false;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        self.child.tuple_desc()
    }

    fn children(&self) -> Vec<&dyn OpIterator> {
        vec![self.child.as_ref()]
    }
}
