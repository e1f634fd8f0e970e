//! Fault injection for storage backends.
//!
//! [`FlakyBackend`] wraps an [`InMemoryBackend`] and reports transient
//! `Unavailable` errors for a configured number of calls before letting
//! them through.

use std::sync::atomic::{AtomicUsize, Ordering};
use sysdb_storage::{InMemoryBackend, KvBackend, StorageError, StorageResult, WriteBatch};

/// An in-memory backend that fails on demand.
#[derive(Debug, Default)]
pub struct FlakyBackend {
    inner: InMemoryBackend,
    read_failures: AtomicUsize,
    write_failures: AtomicUsize,
    injected: AtomicUsize,
}

impl FlakyBackend {
    /// Creates a backend that never fails until told to.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `n` reads and scans.
    pub fn fail_reads(&self, n: usize) {
        self.read_failures.store(n, Ordering::SeqCst);
    }

    /// Fails the next `n` batch writes and clears.
    pub fn fail_writes(&self, n: usize) {
        self.write_failures.store(n, Ordering::SeqCst);
    }

    /// Returns how many failures have been reported so far.
    pub fn injected(&self) -> usize {
        self.injected.load(Ordering::SeqCst)
    }

    /// Returns the wrapped backend.
    pub fn inner(&self) -> &InMemoryBackend {
        &self.inner
    }

    fn trip(&self, budget: &AtomicUsize, op: &str) -> StorageResult<()> {
        let tripped = budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            self.injected.fetch_add(1, Ordering::SeqCst);
            return Err(StorageError::unavailable(format!("injected {op} failure")));
        }
        Ok(())
    }
}

impl KvBackend for FlakyBackend {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.trip(&self.read_failures, "read")?;
        self.inner.get(key)
    }

    fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        self.trip(&self.read_failures, "scan")?;
        self.inner.scan_prefix(prefix)
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        self.trip(&self.write_failures, "write")?;
        self.inner.write_batch(batch)
    }

    fn clear(&self) -> StorageResult<()> {
        self.trip(&self.write_failures, "clear")?;
        self.inner.clear()
    }

    fn len(&self) -> StorageResult<usize> {
        self.inner.len()
    }

    fn sync(&self) -> StorageResult<()> {
        self.inner.sync()
    }
}
