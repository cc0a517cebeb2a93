//! Sequential scan over a heap table.

use super::{not_open, OpIterator};
use crate::errors::ExecutionError;
use crate::Database;
use std::sync::Arc;
use strata::buffer_pool::{BufferPool, Permissions};
use strata::heap_file::HeapFile;
use strata::transaction::TransactionId;
use strata::tuple::{Tuple, TupleDesc};
use strata::PageId;

/// Reads every tuple of a table in page order, pulling each page through the
/// buffer pool with shared permission. The emitted schema carries the scan's
/// alias as an `alias.field` prefix so self-joins stay unambiguous.
pub struct SeqScan {
    pool: Arc<BufferPool>,
    file: Arc<HeapFile>,
    tid: TransactionId,
    table_id: u32,
    table_name: String,
    alias: String,
    td: TupleDesc,
    next_page: u32,
    page_rows: std::vec::IntoIter<Tuple>,
    lookahead: Option<Tuple>,
    opened: bool,
}

impl SeqScan {
    pub fn new(
        db: &Database,
        tid: TransactionId,
        table_id: u32,
        alias: &str,
    ) -> Result<Self, ExecutionError> {
        let file = db
            .catalog()
            .file(table_id)
            .ok_or_else(|| ExecutionError::TableNotFound(format!("table id {table_id}")))?;
        let table_name = db
            .catalog()
            .table_name(table_id)
            .unwrap_or_else(|| table_id.to_string());
        let td = aliased_desc(file.tuple_desc(), alias);

        Ok(Self {
            pool: db.buffer_pool().clone(),
            file,
            tid,
            table_id,
            table_name,
            alias: alias.to_string(),
            td,
            next_page: 0,
            page_rows: Vec::new().into_iter(),
            lookahead: None,
            opened: false,
        })
    }

    /// The name of the scanned table in the catalog, not its alias.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    fn fetch_next(&mut self) -> Result<Option<Tuple>, ExecutionError> {
        loop {
            if let Some(tuple) = self.page_rows.next() {
                return Ok(Some(tuple));
            }
            if self.next_page >= self.file.num_pages()? {
                return Ok(None);
            }

            let pid = PageId::new(self.table_id, self.next_page);
            self.next_page += 1;
            let handle = self.pool.get_page(self.tid, pid, Permissions::ReadOnly)?;
            let rows: Vec<Tuple> = handle.read().iter().cloned().collect();
            self.page_rows = rows.into_iter();
        }
    }
}

impl OpIterator for SeqScan {
    fn open(&mut self) -> Result<(), ExecutionError> {
        self.next_page = 0;
        self.page_rows = Vec::new().into_iter();
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
        self.next_page = 0;
        self.page_rows = Vec::new().into_iter();
        self.lookahead = None;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
        self.page_rows = Vec::new().into_iter();
        self.lookahead = None;
    }

    fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    fn children(&self) -> Vec<&dyn OpIterator> {
        Vec::new()
    }
}

/// Prefixes each named field with `alias.`; unnamed fields stay unnamed.
fn aliased_desc(td: &TupleDesc, alias: &str) -> TupleDesc {
    let types = (0..td.num_fields())
        .map(|i| td.field_type(i).expect("index in range"))
        .collect();
    let names = (0..td.num_fields())
        .map(|i| td.field_name(i).map(|name| format!("{alias}.{name}")))
        .collect();
    TupleDesc::new(types, names)
}
