//! Tuple insertion and deletion operators.
//!
//! Both drain their child on the first `next`, apply the mutation through
//! the buffer pool, and emit a single one-field tuple carrying the affected
//! row count. Later `next` calls are end-of-stream until a rewind.

use super::{not_open, OpIterator};
use crate::errors::ExecutionError;
use crate::Database;
use std::sync::Arc;
use strata::buffer_pool::BufferPool;
use strata::transaction::TransactionId;
use strata::tuple::{Field, FieldType, Tuple, TupleDesc};

fn count_desc() -> TupleDesc {
    TupleDesc::from_types(vec![FieldType::Int])
}

fn count_tuple(td: &TupleDesc, count: i32) -> Tuple {
    Tuple::new(td.clone(), vec![Field::Int(count)])
}

/// Inserts the child's tuples into a table.
pub struct Insert {
    pool: Arc<BufferPool>,
    tid: TransactionId,
    child: Box<dyn OpIterator>,
    table_id: u32,
    td: TupleDesc,
    done: bool,
    opened: bool,
}

impl Insert {
    pub fn new(
        db: &Database,
        tid: TransactionId,
        child: Box<dyn OpIterator>,
        table_id: u32,
    ) -> Self {
        Self {
            pool: db.buffer_pool().clone(),
            tid,
            child,
            table_id,
            td: count_desc(),
            done: false,
            opened: false,
        }
    }
}

impl OpIterator for Insert {
    fn open(&mut self) -> Result<(), ExecutionError> {
        let table_td = self
            .pool
            .catalog()
            .tuple_desc(self.table_id)
            .ok_or_else(|| ExecutionError::TableNotFound(format!("table id {}", self.table_id)))?;
        if !self.child.tuple_desc().compatible_with(&table_td) {
            return Err(ExecutionError::SchemaMismatch(format!(
                "child schema does not match table {}",
                self.table_id
            )));
        }

        self.child.open()?;
        self.done = false;
        self.opened = true;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, ExecutionError> {
        if !self.opened {
            return Err(not_open());
        }
        Ok(!self.done)
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        if !self.opened {
            return Err(not_open());
        }
        if self.done {
            return Ok(None);
        }

        let mut count = 0;
        loop {
            let tuple = match self.child.next() {
                Ok(Some(tuple)) => tuple,
                Ok(None) => break,
                Err(e) => {
                    self.child.close();
                    return Err(e);
                }
            };
            if let Err(e) = self.pool.insert_tuple(self.tid, self.table_id, tuple) {
                self.child.close();
                return Err(e.into());
            }
            count += 1;
        }

        self.done = true;
        Ok(Some(count_tuple(&self.td, count)))
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        if !self.opened {
            return Err(not_open());
        }
        self.child.rewind()?;
        self.done = false;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    fn children(&self) -> Vec<&dyn OpIterator> {
        vec![self.child.as_ref()]
    }
}

/// Deletes the child's tuples; each tuple's record id names the page and
/// table it is removed from.
pub struct Delete {
    pool: Arc<BufferPool>,
    tid: TransactionId,
    child: Box<dyn OpIterator>,
    td: TupleDesc,
    done: bool,
    opened: bool,
}

impl Delete {
    pub fn new(db: &Database, tid: TransactionId, child: Box<dyn OpIterator>) -> Self {
        Self {
            pool: db.buffer_pool().clone(),
            tid,
            child,
            td: count_desc(),
            done: false,
            opened: false,
        }
    }
}

impl OpIterator for Delete {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.child.open()?;
        self.done = false;
        self.opened = true;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, ExecutionError> {
        if !self.opened {
            return Err(not_open());
        }
        Ok(!self.done)
    }

    fn next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        if !self.opened {
            return Err(not_open());
        }
        if self.done {
            return Ok(None);
        }

        let mut count = 0;
        loop {
            let tuple = match self.child.next() {
                Ok(Some(tuple)) => tuple,
                Ok(None) => break,
                Err(e) => {
                    self.child.close();
                    return Err(e);
                }
            };
            if let Err(e) = self.pool.delete_tuple(self.tid, &tuple) {
                self.child.close();
                return Err(e.into());
            }
            count += 1;
        }

        self.done = true;
        Ok(Some(count_tuple(&self.td, count)))
    }

    fn rewind(&mut self) -> Result<(), ExecutionError> {
        if !self.opened {
            return Err(not_open());
        }
        self.child.rewind()?;
        self.done = false;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.opened = false;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    fn children(&self) -> Vec<&dyn OpIterator> {
        vec![self.child.as_ref()]
    }
}
