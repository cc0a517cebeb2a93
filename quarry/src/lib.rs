//! # Quarry Query Engine
//! The query layer of the Quarry database: pull-based operators over heap
//! tables, grouped aggregation, and histogram-backed table statistics.
//!
//! Everything runs against an explicit [`Database`] context; there are no
//! process-wide singletons, so tests and embedders can stand up as many
//! isolated databases as they like.

pub mod aggregate_executor;
pub mod errors;
pub mod executor;
pub mod optimizer;
pub mod predicate;

use std::io;
use std::path::Path;
use std::sync::Arc;
use strata::buffer_pool::BufferPool;
use strata::catalog::Catalog;
use strata::heap_file::HeapFile;
use strata::log::LogManager;

pub fn debug_logs_enabled() -> bool {
    std::env::var_os("QUARRY_DEBUG_LOG").is_some()
}

#[macro_export]
macro_rules! quarry_debug_log {
    ($($arg:tt)*) => {
        if $crate::debug_logs_enabled() {
            println!($($arg)*);
        }
    };
}

/// One database instance: a catalog of tables and the buffer pool (with its
/// lock manager and log) that all access flows through.
pub struct Database {
    catalog: Arc<Catalog>,
    buffer_pool: Arc<BufferPool>,
}

impl Database {
    /// Stands up a database whose log lives at `log_path`, with a buffer
    /// pool of `pool_pages` pages.
    pub fn open<P: AsRef<Path>>(log_path: P, pool_pages: usize) -> io::Result<Self> {
        let catalog = Arc::new(Catalog::new());
        let log = LogManager::open(log_path)?;
        let buffer_pool = Arc::new(BufferPool::new(pool_pages, catalog.clone(), log));
        Ok(Self {
            catalog,
            buffer_pool,
        })
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    /// Registers a heap file as a table and returns its id.
    pub fn add_table(&self, file: Arc<HeapFile>, name: &str, primary_key: &str) -> u32 {
        let id = self.catalog.add_table(file, name, primary_key);
        crate::quarry_debug_log!("[Database::add_table] registered '{name}' as table {id}");
        id
    }
}
