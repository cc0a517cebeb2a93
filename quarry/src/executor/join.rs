//! Nested-loop join.

use super::{not_open, OpIterator};
use crate::errors::ExecutionError;
use crate::predicate::JoinPredicate;
use strata::tuple::{Tuple, TupleDesc};

/// Joins two children on a [`JoinPredicate`] with the classic nested loop:
/// for every left tuple the right child is rewound and fully re-scanned, and
/// each matching pair is emitted as the concatenation left-then-right.
pub struct Join {
    predicate: JoinPredicate,
    left: Box<dyn OpIterator>,
    right: Box<dyn OpIterator>,
    td: TupleDesc,
    current_left: Option<Tuple>,
    lookahead: Option<Tuple>,
    opened: bool,
}

impl Join {
    pub fn new(
        predicate: JoinPredicate,
        left: Box<dyn OpIterator>,
        right: Box<dyn OpIterator>,
    ) -> Self {
        let td = TupleDesc::merge(left.tuple_desc(), right.tuple_desc());
        Self {
            predicate,
            left,
            right,
            td,
            current_left: None,
            lookahead: None,
            opened: false,
        }
    }

    pub fn predicate(&self) -> &JoinPredicate {
        &self.predicate
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        loop {
            if self.current_left.is_none() {
                match self.left.next()? {
                    Some(tuple) => {
                        self.current_left = Some(tuple);
                        self.right.rewind()?;
                    }
                    None => return Ok(None),
                }
            }

            let left = self.current_left.as_ref().expect("left tuple present");
            while let Some(right) = self.right.next()? {
                if self.predicate.matches(left, &right) {
                    return Ok(Some(concat(&self.td, left, &right)));
                }
            }
            self.current_left = None;
        }
    }
}

fn concat(td: &TupleDesc, left: &Tuple, right: &Tuple) -> Tuple {
    let mut fields = Vec::with_capacity(td.num_fields());
    fields.extend(left.fields().iter().cloned());
    fields.extend(right.fields().iter().cloned());
    Tuple::new(td.clone(), fields)
}

impl OpIterator for Join {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.left.open()?;
        if let Err(e) = self.right.open() {
            self.left.close();
            return Err(e);
        }
        self.current_left = None;
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
        self.left.rewind()?;
        self.right.rewind()?;
        self.current_left = None;
        self.lookahead = None;
        Ok(())
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.current_left = None;
        self.lookahead = None;
        self.opened = false;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    fn children(&self) -> Vec<&dyn OpIterator> {
        vec![self.left.as_ref(), self.right.as_ref()]
    }
}
