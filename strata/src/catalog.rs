//! The table registry.
//!
//! Maps table ids to their heap files, names, and primary-key fields. Each
//! database context owns its own catalog instance; there is no process-global
//! registry.

use crate::heap_file::HeapFile;
use crate::tuple::TupleDesc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct TableInfo {
    file: Arc<HeapFile>,
    name: String,
    primary_key: String,
}

#[derive(Debug, Default)]
struct CatalogState {
    tables: HashMap<u32, TableInfo>,
    by_name: HashMap<String, u32>,
}

/// The registry of known tables.
#[derive(Debug, Default)]
pub struct Catalog {
    state: Mutex<CatalogState>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table under the given name and returns its id (the heap
    /// file's id). Re-using an existing name rebinds it and drops the older
    /// table, matching the newest-wins behavior callers expect of DDL.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str, primary_key: &str) -> u32 {
        let id = file.id();
        let mut state = self.state.lock().unwrap();
        if let Some(old_id) = state.by_name.insert(name.to_string(), id) {
            if old_id != id {
                state.tables.remove(&old_id);
            }
        }
        state.tables.insert(
            id,
            TableInfo {
                file,
                name: name.to_string(),
                primary_key: primary_key.to_string(),
            },
        );
        id
    }

    pub fn table_id_by_name(&self, name: &str) -> Option<u32> {
        self.state.lock().unwrap().by_name.get(name).copied()
    }

    pub fn table_name(&self, table_id: u32) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.tables.get(&table_id).map(|info| info.name.clone())
    }

    pub fn primary_key(&self, table_id: u32) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .tables
            .get(&table_id)
            .map(|info| info.primary_key.clone())
    }

    /// The heap file backing a table.
    pub fn file(&self, table_id: u32) -> Option<Arc<HeapFile>> {
        let state = self.state.lock().unwrap();
        state.tables.get(&table_id).map(|info| info.file.clone())
    }

    /// The schema of a table.
    pub fn tuple_desc(&self, table_id: u32) -> Option<TupleDesc> {
        let state = self.state.lock().unwrap();
        state
            .tables
            .get(&table_id)
            .map(|info| info.file.tuple_desc().clone())
    }

    /// The ids of every registered table, in no particular order.
    pub fn table_ids(&self) -> Vec<u32> {
        self.state.lock().unwrap().tables.keys().copied().collect()
    }

    /// Forgets every table. Tests only.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.tables.clear();
        state.by_name.clear();
    }
}
