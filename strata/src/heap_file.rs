//! The on-disk heap file.
//!
//! A heap file is an ordered sequence of fixed-size pages holding one table's
//! tuples in no particular order. Reads and writes of raw pages go straight
//! to the file; tuple-level mutation goes through the buffer pool so that
//! locking and dirty tracking stay correct.

use crate::buffer_pool::{BufferPool, Permissions, PoolError};
use crate::heap_page::{empty_page_data, HeapPage};
use crate::transaction::TransactionId;
use crate::tuple::{Tuple, TupleDesc};
use crate::{page_size, PageId};
use std::collections::hash_map::DefaultHasher;
use std::fs::{create_dir_all, File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug)]
pub struct HeapFile {
    id: u32,
    path: PathBuf,
    td: TupleDesc,
    file: Mutex<File>,
}

impl HeapFile {
    /// Opens (or creates) the heap file at `path` with the given schema.
    pub fn open<P: AsRef<Path>>(path: P, td: TupleDesc) -> io::Result<Self> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path_ref)?;

        let absolute = std::path::absolute(path_ref)?;
        let mut hasher = DefaultHasher::new();
        absolute.hash(&mut hasher);
        let id = hasher.finish() as u32;

        crate::strata_debug_log!("[HeapFile::open] {absolute:?} -> table id {id}");
        Ok(Self {
            id,
            path: absolute,
            td,
            file: Mutex::new(file),
        })
    }

    /// The table id: a deterministic hash of the absolute path, so reopening
    /// the same file always yields the same id.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tuple_desc(&self) -> &TupleDesc {
        &self.td
    }

    /// The number of pages currently on disk.
    pub fn num_pages(&self) -> io::Result<u32> {
        let file = self.file.lock().unwrap();
        Ok((file.metadata()?.len() / page_size() as u64) as u32)
    }

    /// Reads one page from disk. Reading past the end of the file fails.
    pub fn read_page(&self, pid: PageId) -> io::Result<HeapPage> {
        if pid.table_id != self.id {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("page {pid:?} does not belong to table {}", self.id),
            ));
        }

        let mut file = self.file.lock().unwrap();
        let offset = pid.page_no as u64 * page_size() as u64;
        if offset + page_size() as u64 > file.metadata()?.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("page {} is past the end of the file", pid.page_no),
            ));
        }

        let mut data = vec![0u8; page_size()];
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut data)?;
        drop(file);

        HeapPage::new(pid, &data, self.td.clone())
    }

    /// Writes one page's image back to disk, extending the file by exactly
    /// one page when the page is the next ordinal.
    pub fn write_page(&self, page: &HeapPage) -> io::Result<()> {
        let pid = page.id();
        if pid.table_id != self.id {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("page {pid:?} does not belong to table {}", self.id),
            ));
        }

        let mut file = self.file.lock().unwrap();
        let offset = pid.page_no as u64 * page_size() as u64;
        if offset > file.metadata()?.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("writing page {} would leave a hole", pid.page_no),
            ));
        }
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(&page.page_data())?;
        file.sync_all()?;
        Ok(())
    }

    /// Appends an all-empty page and returns its id.
    pub fn append_page(&self) -> io::Result<PageId> {
        let mut file = self.file.lock().unwrap();
        let page_no = (file.metadata()?.len() / page_size() as u64) as u32;
        file.seek(SeekFrom::End(0))?;
        file.write_all(&empty_page_data())?;
        file.sync_all()?;
        crate::strata_debug_log!("[HeapFile::append_page] table {} grew to page {}", self.id, page_no);
        Ok(PageId::new(self.id, page_no))
    }

    /// Inserts a tuple into the first page with a free slot, growing the file
    /// when every page is full. Returns the pages dirtied by the insert.
    ///
    /// Pages probed and found full are released right away when this
    /// transaction did not already hold them; a full page we never touched
    /// carries no 2PL obligation.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        pool: &BufferPool,
        tuple: Tuple,
    ) -> Result<Vec<PageId>, PoolError> {
        let num_pages = self.num_pages()?;
        for page_no in 0..num_pages {
            let pid = PageId::new(self.id, page_no);
            let already_held = pool.holds_lock(tid, pid);
            let handle = pool.get_page(tid, pid, Permissions::ReadWrite)?;
            if handle.read().empty_slot_count() > 0 {
                handle.write(tid).insert_tuple(tuple)?;
                return Ok(vec![pid]);
            }
            drop(handle);
            if !already_held {
                pool.release_page(tid, pid);
            }
        }

        let pid = self.append_page()?;
        let handle = pool.get_page(tid, pid, Permissions::ReadWrite)?;
        handle.write(tid).insert_tuple(tuple)?;
        Ok(vec![pid])
    }

    /// Deletes the tuple named by its record id. Returns the dirtied page.
    pub fn delete_tuple(
        &self,
        tid: TransactionId,
        pool: &BufferPool,
        tuple: &Tuple,
    ) -> Result<Vec<PageId>, PoolError> {
        let rid = tuple.record_id().ok_or_else(|| {
            PoolError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "tuple has no record id",
            ))
        })?;
        if rid.page_id.table_id != self.id {
            return Err(PoolError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("record id {rid:?} does not belong to table {}", self.id),
            )));
        }

        let handle = pool.get_page(tid, rid.page_id, Permissions::ReadWrite)?;
        handle.write(tid).delete_tuple(rid)?;
        Ok(vec![rid.page_id])
    }
}
