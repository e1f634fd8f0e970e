//! File-based storage backend for persistent storage.
//!
//! The backend keeps its working set in memory and makes every batch
//! durable by appending one checksummed frame to a log before applying
//! it. On open the log is replayed; a torn frame at the tail (from a
//! crash mid-append) is discarded and the file is truncated back to the
//! last complete frame.
//!
//! ```text
//! <dir>/
//! ├─ LOCK          # Advisory lock, one process per directory
//! └─ sysdb.log     # Frames: magic | len u32 LE | crc32 u32 LE | CBOR payload
//! ```

use crate::backend::KvBackend;
use crate::batch::{BatchOp, WriteBatch};
use crate::crc::compute_crc32;
use crate::error::{StorageError, StorageResult};
use crate::memory::{apply_ops, scan};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// Magic bytes opening every log frame.
pub const LOG_MAGIC: [u8; 4] = *b"SDBL";

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "sysdb.log";
const LOG_TEMP: &str = "sysdb.log.tmp";
const HEADER_LEN: usize = 12;

#[derive(Debug, Serialize, Deserialize)]
enum LogEntry {
    Batch(Vec<BatchOp>),
}

/// A file-based keyed storage backend.
///
/// # Durability
///
/// With `sync_writes` enabled (the default) every batch is followed by
/// `File::sync_data()`, so an acknowledged batch survives power loss.
///
/// # Thread Safety
///
/// Appends are serialized by an internal mutex; readers only take the
/// in-memory map's read lock and never touch the file.
///
/// # Failed appends
///
/// A failed append is rolled back by truncating the log to its previous
/// length. If that truncate fails too, the backend refuses further writes
/// with [`StorageError::Corrupted`] until it is reopened, compacted or
/// cleared, so no batch is ever appended after a torn frame.
///
/// # Example
///
/// ```no_run
/// use sysdb_storage::{FileBackend, KvBackend, WriteBatch};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("sysdb-data")).unwrap();
/// let mut batch = WriteBatch::new();
/// batch.put("tenant/default", b"...".to_vec());
/// backend.write_batch(batch).unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    log: Mutex<File>,
    data: RwLock<BTreeMap<String, Vec<u8>>>,
    sync_writes: bool,
    /// Set when a torn frame could not be rolled back.
    poisoned: AtomicBool,
    _lock_file: File,
}

impl FileBackend {
    /// Opens or creates a backend in `dir` with synchronous writes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another process holds the
    /// directory, or an I/O error if the log cannot be read.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        Self::open_with_options(dir, true)
    }

    /// Opens or creates a backend, choosing whether each batch is fsynced.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Locked`] if another process holds the
    /// directory, or an I/O error if the log cannot be read.
    pub fn open_with_options(dir: &Path, sync_writes: bool) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        let mut log = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOG_FILE))?;

        let mut bytes = Vec::new();
        log.seek(SeekFrom::Start(0))?;
        log.read_to_end(&mut bytes)?;

        let mut data = BTreeMap::new();
        let valid_len = replay(&bytes, &mut data);
        if valid_len < bytes.len() {
            warn!(
                path = %dir.display(),
                discarded = bytes.len() - valid_len,
                "discarding torn tail of storage log"
            );
            log.set_len(valid_len as u64)?;
            log.sync_all()?;
        }
        debug!(path = %dir.display(), keys = data.len(), "opened file backend");

        Ok(Self {
            dir: dir.to_path_buf(),
            log: Mutex::new(log),
            data: RwLock::new(data),
            sync_writes,
            poisoned: AtomicBool::new(false),
            _lock_file: lock_file,
        })
    }

    /// Returns the data directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Returns the current size of the log file in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn log_size(&self) -> StorageResult<u64> {
        Ok(self.log.lock().metadata()?.len())
    }

    /// Rewrites the log as a single snapshot frame.
    ///
    /// Superseded puts and deleted keys stop taking space. The snapshot is
    /// written to a temporary file and atomically renamed over the log.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be written or renamed.
    pub fn compact(&self) -> StorageResult<()> {
        let mut log = self.log.lock();
        let data = self.data.read();

        let ops = data
            .iter()
            .map(|(key, value)| BatchOp::Put {
                key: key.clone(),
                value: value.clone(),
            })
            .collect();
        let frame = encode_frame(&LogEntry::Batch(ops))?;

        let temp_path = self.dir.join(LOG_TEMP);
        let mut temp = File::create(&temp_path)?;
        temp.write_all(&frame)?;
        temp.sync_all()?;
        drop(temp);

        fs::rename(&temp_path, self.dir.join(LOG_FILE))?;
        *log = OpenOptions::new()
            .read(true)
            .write(true)
            .open(self.dir.join(LOG_FILE))?;
        self.poisoned.store(false, Ordering::SeqCst);
        debug!(keys = data.len(), bytes = frame.len(), "compacted storage log");
        Ok(())
    }
}

fn encode_frame(entry: &LogEntry) -> StorageResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(entry, &mut payload)
        .map_err(|e| StorageError::Encoding(e.to_string()))?;

    let len = u32::try_from(payload.len())
        .map_err(|_| StorageError::Encoding("batch exceeds 4 GiB".into()))?;
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&LOG_MAGIC);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&compute_crc32(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// What an append needs from the log file.
trait LogWriter {
    fn append(&mut self, frame: &[u8], sync: bool) -> std::io::Result<()>;
    fn truncate(&mut self, len: u64) -> std::io::Result<()>;
}

impl LogWriter for File {
    fn append(&mut self, frame: &[u8], sync: bool) -> std::io::Result<()> {
        self.write_all(frame)?;
        self.flush()?;
        if sync {
            self.sync_data()?;
        }
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> std::io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len))?;
        Ok(())
    }
}

/// Appends `frame` at offset `before`, truncating back on failure.
///
/// Returns the append error when the rollback succeeds, and a
/// non-transient `Corrupted` error when it does not.
fn append_or_rollback<L: LogWriter>(
    log: &mut L,
    before: u64,
    frame: &[u8],
    sync: bool,
) -> StorageResult<()> {
    let Err(append) = log.append(frame, sync) else {
        return Ok(());
    };
    match log.truncate(before) {
        Ok(()) => Err(append.into()),
        Err(truncate) => Err(StorageError::corrupted(format!(
            "append failed ({append}) and rollback to offset {before} failed ({truncate})"
        ))),
    }
}

/// Replays complete frames into `data`, returning the length of the valid prefix.
fn replay(bytes: &[u8], data: &mut BTreeMap<String, Vec<u8>>) -> usize {
    let mut offset = 0;
    while offset + HEADER_LEN <= bytes.len() {
        let header = &bytes[offset..offset + HEADER_LEN];
        if header[0..4] != LOG_MAGIC {
            break;
        }
        let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let crc = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);

        let start = offset + HEADER_LEN;
        let Some(end) = start.checked_add(len).filter(|&end| end <= bytes.len()) else {
            break;
        };
        let payload = &bytes[start..end];
        if compute_crc32(payload) != crc {
            break;
        }
        match ciborium::from_reader::<LogEntry, _>(payload) {
            Ok(LogEntry::Batch(ops)) => apply_ops(data, ops),
            Err(_) => break,
        }
        offset = end;
    }
    offset
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        Ok(scan(&self.data.read(), prefix))
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let ops = batch.into_ops();
        let entry = LogEntry::Batch(ops);
        let frame = encode_frame(&entry)?;

        let mut log = self.log.lock();
        if self.poisoned.load(Ordering::SeqCst) {
            return Err(StorageError::corrupted(
                "log holds a torn frame; reopen to recover",
            ));
        }
        let before = log.seek(SeekFrom::End(0))?;
        if let Err(e) = append_or_rollback(&mut *log, before, &frame, self.sync_writes) {
            if matches!(e, StorageError::Corrupted(_)) {
                self.poisoned.store(true, Ordering::SeqCst);
                warn!(path = %self.dir.display(), error = %e, "storage log poisoned");
            }
            return Err(e);
        }

        let LogEntry::Batch(ops) = entry;
        apply_ops(&mut self.data.write(), ops);
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        let mut log = self.log.lock();
        log.truncate(0)?;
        log.sync_all()?;
        self.poisoned.store(false, Ordering::SeqCst);
        self.data.write().clear();
        Ok(())
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.data.read().len())
    }

    fn sync(&self) -> StorageResult<()> {
        self.log.lock().sync_all()?;
        Ok(())
    }
}
