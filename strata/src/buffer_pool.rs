//! The buffer pool: a bounded cache of heap pages shared by every
//! transaction in a database.
//!
//! All page access flows through [`BufferPool::get_page`], which takes the
//! page lock *before* touching the cache, demand-loads misses, and evicts
//! only clean pages (NO STEAL). Commit appends before/after images to the
//! log, forces it, and then writes the pages to the data file (FORCE), so a
//! clean cached page always equals its on-disk image; abort throws the dirty
//! copies away and reloads the on-disk versions.

use crate::catalog::Catalog;
use crate::heap_page::HeapPage;
use crate::lock_manager::{LockError, LockManager, LockMode};
use crate::log::LogManager;
use crate::transaction::TransactionId;
use crate::tuple::Tuple;
use crate::PageId;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Default number of cached pages.
pub const DEFAULT_PAGES: usize = 50;

/// The access level a transaction requests for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}

/// Failures surfaced by the buffer pool.
#[derive(Debug)]
pub enum PoolError {
    /// The requesting transaction was chosen as a deadlock victim and must
    /// abort.
    Aborted,
    /// Every cached page is dirty (or in use), so nothing can be evicted.
    Exhausted,
    /// An underlying file operation failed.
    Io(io::Error),
}

impl From<LockError> for PoolError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Deadlock => PoolError::Aborted,
        }
    }
}

impl From<io::Error> for PoolError {
    fn from(err: io::Error) -> Self {
        PoolError::Io(err)
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::Aborted => write!(f, "transaction aborted by deadlock detection"),
            PoolError::Exhausted => write!(f, "buffer pool full of dirty pages"),
            PoolError::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

/// A cached page plus its transactional bookkeeping. The page itself stays
/// pure data; the pool owns the dirty marker and the before-image snapshot
/// taken at the last commit boundary.
#[derive(Debug)]
struct Frame {
    page: RwLock<HeapPage>,
    before_image: Mutex<Vec<u8>>,
    dirty_by: Mutex<Option<TransactionId>>,
}

impl Frame {
    fn clean(page: HeapPage) -> Self {
        let before_image = page.page_data();
        Self {
            page: RwLock::new(page),
            before_image: Mutex::new(before_image),
            dirty_by: Mutex::new(None),
        }
    }
}

/// A handle to a cached page. Holding one keeps the frame out of eviction;
/// drop it as soon as the page has been read or changed.
#[derive(Debug)]
pub struct PageHandle {
    frame: Arc<Frame>,
    pid: PageId,
}

impl PageHandle {
    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn read(&self) -> RwLockReadGuard<'_, HeapPage> {
        self.frame.page.read().unwrap()
    }

    /// Marks the page dirty on behalf of `tid` and returns mutable access.
    pub fn write(&self, tid: TransactionId) -> RwLockWriteGuard<'_, HeapPage> {
        *self.frame.dirty_by.lock().unwrap() = Some(tid);
        self.frame.page.write().unwrap()
    }

    /// The transaction that dirtied this page, if any.
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        *self.frame.dirty_by.lock().unwrap()
    }
}

/// The buffer pool manager.
pub struct BufferPool {
    capacity: usize,
    catalog: Arc<Catalog>,
    lock_manager: LockManager,
    log: LogManager,
    frames: Mutex<HashMap<PageId, Arc<Frame>>>,
}

impl BufferPool {
    pub fn new(capacity: usize, catalog: Arc<Catalog>, log: LogManager) -> Self {
        Self {
            capacity,
            catalog,
            lock_manager: LockManager::new(),
            log,
            frames: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn log(&self) -> &LogManager {
        &self.log
    }

    /// The number of pages currently cached.
    pub fn cached_page_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    /// Retrieves the page with the appropriate lock held: shared for
    /// read-only, exclusive for read-write. Blocks while another transaction
    /// holds a conflicting lock; fails with [`PoolError::Aborted`] when
    /// waiting would deadlock.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> Result<PageHandle, PoolError> {
        let mode = match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        };
        self.lock_manager.acquire(tid, pid, mode)?;

        let mut frames = self.frames.lock().unwrap();
        if let Some(frame) = frames.get(&pid) {
            return Ok(PageHandle {
                frame: frame.clone(),
                pid,
            });
        }

        if frames.len() >= self.capacity {
            self.evict_one(&mut frames)?;
        }

        crate::strata_debug_log!("[BufferPool::get_page] demand load of {pid:?} for {tid}");
        let file = self
            .catalog
            .file(pid.table_id)
            .ok_or_else(|| PoolError::Io(unknown_table(pid.table_id)))?;
        let frame = Arc::new(Frame::clean(file.read_page(pid)?));
        frames.insert(pid, frame.clone());
        Ok(PageHandle { frame, pid })
    }

    /// Evicts one clean, unreferenced page. A clean page always equals its
    /// on-disk image (commit and flush both write through), so discarding it
    /// loses nothing. Dirty pages are never victims.
    fn evict_one(&self, frames: &mut HashMap<PageId, Arc<Frame>>) -> Result<(), PoolError> {
        let victim = frames
            .iter()
            .find(|(_, frame)| {
                frame.dirty_by.lock().unwrap().is_none() && Arc::strong_count(frame) == 1
            })
            .map(|(pid, _)| *pid);

        let Some(pid) = victim else {
            return Err(PoolError::Exhausted);
        };
        frames.remove(&pid);
        crate::strata_debug_log!("[BufferPool::evict_one] evicted {pid:?}");
        Ok(())
    }

    /// Adds a tuple to the named table on behalf of `tid`, taking exclusive
    /// locks on every page touched. Returns the dirtied pages.
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: u32,
        tuple: Tuple,
    ) -> Result<Vec<PageId>, PoolError> {
        let file = self
            .catalog
            .file(table_id)
            .ok_or_else(|| PoolError::Io(unknown_table(table_id)))?;
        file.insert_tuple(tid, self, tuple)
    }

    /// Removes a tuple on behalf of `tid`; the table is implied by the
    /// tuple's record id. Returns the dirtied pages.
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<Vec<PageId>, PoolError> {
        let rid = tuple.record_id().ok_or_else(|| {
            PoolError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "tuple has no record id",
            ))
        })?;
        let table_id = rid.page_id.table_id;
        let file = self
            .catalog
            .file(table_id)
            .ok_or_else(|| PoolError::Io(unknown_table(table_id)))?;
        file.delete_tuple(tid, self, tuple)
    }

    /// Releases the lock on a single page.
    ///
    /// Calling this is very risky: it breaks strict 2PL for any page the
    /// transaction has read or written. The legitimate users are recovery
    /// and the insert path's walk over full pages it never touched.
    pub fn release_page(&self, tid: TransactionId, pid: PageId) {
        self.lock_manager.release(tid, pid);
    }

    /// True if `tid` holds a lock of any kind on `pid`.
    pub fn holds_lock(&self, tid: TransactionId, pid: PageId) -> bool {
        self.lock_manager.holds_lock(tid, pid)
    }

    /// Commits or aborts `tid`, then releases all of its locks.
    ///
    /// On commit every page dirtied by `tid` has its before/after images
    /// appended to the log, the log is forced, and the page is written to
    /// the data file and becomes the new clean baseline. On abort the dirty
    /// copies are replaced by fresh reads of the on-disk versions. Lock
    /// release happens in every case, even when logging fails; log errors
    /// propagate unchanged so the caller can decide what a failed commit
    /// means.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> io::Result<()> {
        let outcome = if commit {
            self.commit_pages(tid)
        } else {
            self.rollback_pages(tid)
        };
        self.lock_manager.release_all(tid);
        crate::strata_debug_log!(
            "[BufferPool::transaction_complete] {tid} {}",
            if commit { "committed" } else { "aborted" }
        );
        outcome
    }

    fn commit_pages(&self, tid: TransactionId) -> io::Result<()> {
        let dirty = self.pages_dirtied_by(tid);

        let mut images = Vec::with_capacity(dirty.len());
        for (pid, frame) in &dirty {
            let after = frame.page.read().unwrap().page_data();
            let before = frame.before_image.lock().unwrap().clone();
            self.log.log_write(tid, *pid, &before, &after)?;
            images.push(after);
        }
        self.log.log_commit(tid)?;
        self.log.force()?;

        for ((pid, frame), after) in dirty.iter().zip(images) {
            let file = self
                .catalog
                .file(pid.table_id)
                .ok_or_else(|| unknown_table(pid.table_id))?;
            file.write_page(&frame.page.read().unwrap())?;
            *frame.before_image.lock().unwrap() = after;
            *frame.dirty_by.lock().unwrap() = None;
        }
        Ok(())
    }

    fn rollback_pages(&self, tid: TransactionId) -> io::Result<()> {
        let mut frames = self.frames.lock().unwrap();
        let dirty: Vec<PageId> = frames
            .iter()
            .filter(|(_, frame)| *frame.dirty_by.lock().unwrap() == Some(tid))
            .map(|(pid, _)| *pid)
            .collect();

        for pid in dirty {
            let file = self
                .catalog
                .file(pid.table_id)
                .ok_or_else(|| unknown_table(pid.table_id))?;
            let page = file.read_page(pid)?;
            frames.insert(pid, Arc::new(Frame::clean(page)));
        }
        Ok(())
    }

    fn pages_dirtied_by(&self, tid: TransactionId) -> Vec<(PageId, Arc<Frame>)> {
        let frames = self.frames.lock().unwrap();
        frames
            .iter()
            .filter(|(_, frame)| *frame.dirty_by.lock().unwrap() == Some(tid))
            .map(|(pid, frame)| (*pid, frame.clone()))
            .collect()
    }

    /// Writes one page to the data file, logging it first when dirty, and
    /// marks it clean.
    ///
    /// Flushing a page an active transaction dirtied puts uncommitted bytes
    /// on disk, which the NO STEAL eviction policy otherwise never does;
    /// only recovery-style callers should reach for this.
    pub fn flush_page(&self, pid: PageId) -> io::Result<()> {
        let frame = {
            let frames = self.frames.lock().unwrap();
            match frames.get(&pid) {
                Some(frame) => frame.clone(),
                None => return Ok(()),
            }
        };

        let after = frame.page.read().unwrap().page_data();
        if let Some(dirtier) = *frame.dirty_by.lock().unwrap() {
            let before = frame.before_image.lock().unwrap().clone();
            self.log.log_write(dirtier, pid, &before, &after)?;
            self.log.force()?;
        }

        let file = self
            .catalog
            .file(pid.table_id)
            .ok_or_else(|| unknown_table(pid.table_id))?;
        file.write_page(&frame.page.read().unwrap())?;

        *frame.before_image.lock().unwrap() = after;
        *frame.dirty_by.lock().unwrap() = None;
        Ok(())
    }

    /// Flushes every cached page. See [`BufferPool::flush_page`].
    pub fn flush_all_pages(&self) -> io::Result<()> {
        let pids: Vec<PageId> = self.frames.lock().unwrap().keys().copied().collect();
        for pid in pids {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Flushes the pages dirtied by one transaction.
    pub fn flush_pages(&self, tid: TransactionId) -> io::Result<()> {
        for (pid, _) in self.pages_dirtied_by(tid) {
            self.flush_page(pid)?;
        }
        Ok(())
    }

    /// Drops a page from the cache without writing it anywhere.
    pub fn discard_page(&self, pid: PageId) {
        self.frames.lock().unwrap().remove(&pid);
    }
}

fn unknown_table(table_id: u32) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no table with id {table_id}"),
    )
}
