//! The undo/redo log.
//!
//! The buffer pool appends a before/after image pair for every page a
//! committing transaction dirtied, then forces the log before the commit is
//! acknowledged. Records are bincode-encoded and guarded by a CRC so a torn
//! tail is detected rather than replayed. Replay itself is a consumer
//! concern; this module only defines the record format and the append path.

use crate::transaction::TransactionId;
use crate::PageId;
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// A log sequence number: the byte offset of a record in the log file.
pub type Lsn = u64;

const HEADER_LEN: usize = 8; // total_len: u32, crc: u32

/// A single record in the log.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum LogRecord {
    /// A page image pair captured at commit: `before` is the image at the
    /// previous commit boundary, `after` the image being committed.
    Update {
        tx_id: u64,
        table_id: u32,
        page_no: u32,
        before: Vec<u8>,
        after: Vec<u8>,
    },
    /// The commit of a transaction.
    Commit { tx_id: u64 },
    /// The abort of a transaction.
    Abort { tx_id: u64 },
}

impl LogRecord {
    pub fn tx_id(&self) -> u64 {
        match self {
            LogRecord::Update { tx_id, .. } => *tx_id,
            LogRecord::Commit { tx_id } => *tx_id,
            LogRecord::Abort { tx_id } => *tx_id,
        }
    }
}

/// The log manager: an append-only file plus the next free LSN.
pub struct LogManager {
    file: Mutex<File>,
    next_lsn: AtomicU64,
}

impl LogManager {
    /// Opens (or creates) the log file and positions the append cursor at
    /// its end.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let next_lsn = AtomicU64::new(file.metadata()?.len());
        Ok(Self {
            file: Mutex::new(file),
            next_lsn,
        })
    }

    /// Appends an update record carrying a page's before and after images.
    pub fn log_write(
        &self,
        tid: TransactionId,
        pid: PageId,
        before: &[u8],
        after: &[u8],
    ) -> io::Result<Lsn> {
        self.append(&LogRecord::Update {
            tx_id: tid.id(),
            table_id: pid.table_id,
            page_no: pid.page_no,
            before: before.to_vec(),
            after: after.to_vec(),
        })
    }

    /// Appends a commit record.
    pub fn log_commit(&self, tid: TransactionId) -> io::Result<Lsn> {
        self.append(&LogRecord::Commit { tx_id: tid.id() })
    }

    /// Appends an abort record.
    pub fn log_abort(&self, tid: TransactionId) -> io::Result<Lsn> {
        self.append(&LogRecord::Abort { tx_id: tid.id() })
    }

    /// Durably persists everything appended so far.
    pub fn force(&self) -> io::Result<()> {
        self.file.lock().unwrap().sync_all()
    }

    fn append(&self, record: &LogRecord) -> io::Result<Lsn> {
        let body = bincode::serialize(record)
            .map_err(|e| io::Error::other(format!("log record encoding failed: {e}")))?;

        let total_len = (HEADER_LEN + body.len()) as u32;
        let mut hasher = Hasher::new();
        hasher.update(&body);
        let crc = hasher.finalize();

        let lsn = self.next_lsn.fetch_add(total_len as u64, Ordering::SeqCst);

        let mut file = self.file.lock().unwrap();
        file.seek(SeekFrom::Start(lsn))?;
        file.write_all(&total_len.to_be_bytes())?;
        file.write_all(&crc.to_be_bytes())?;
        file.write_all(&body)?;
        Ok(lsn)
    }

    /// Reads the record at `lsn`, returning it and the LSN that follows it.
    /// Returns `None` at or past the end of the log.
    pub fn read_record(&self, lsn: Lsn) -> io::Result<Option<(LogRecord, Lsn)>> {
        let mut file = self.file.lock().unwrap();
        if lsn >= file.metadata()?.len() {
            return Ok(None);
        }

        file.seek(SeekFrom::Start(lsn))?;
        let mut header = [0u8; HEADER_LEN];
        file.read_exact(&mut header)?;
        let total_len = u32::from_be_bytes(header[0..4].try_into().unwrap());
        let crc = u32::from_be_bytes(header[4..8].try_into().unwrap());

        let body_len = (total_len as usize)
            .checked_sub(HEADER_LEN)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "log record length underflow"))?;
        let mut body = vec![0u8; body_len];
        file.read_exact(&mut body)?;

        let mut hasher = Hasher::new();
        hasher.update(&body);
        if hasher.finalize() != crc {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "log record CRC mismatch",
            ));
        }

        let record = bincode::deserialize(&body)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("bad log record: {e}")))?;
        Ok(Some((record, lsn + total_len as u64)))
    }
}
