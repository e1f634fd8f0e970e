//! Keyed storage backend trait definition.

use crate::batch::WriteBatch;
use crate::error::StorageResult;

/// A durable keyed storage backend for SysDB.
///
/// Backends are **opaque keyed byte stores**. They provide point reads,
/// ordered prefix scans and atomic batch writes. The entity store owns
/// record envelopes, versions and tombstones; backends never interpret
/// the values they hold.
///
/// # Invariants
///
/// - `write_batch` applies every operation of the batch or none of them
/// - A read issued after `write_batch` returns observes the whole batch
/// - `scan_prefix` returns entries in ascending key order
/// - Backends must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait KvBackend: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Returns every entry whose key starts with `prefix`, ordered by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>>;

    /// Applies `batch` atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch could not be made durable. On error
    /// none of the batch is visible.
    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()>;

    /// Removes every key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend could not be cleared durably.
    fn clear(&self) -> StorageResult<()>;

    /// Returns the number of stored keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn len(&self) -> StorageResult<usize>;

    /// Returns true if no keys are stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Forces all written data to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&self) -> StorageResult<()>;
}
