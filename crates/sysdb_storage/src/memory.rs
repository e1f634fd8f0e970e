//! In-memory storage backend for testing.

use crate::backend::KvBackend;
use crate::batch::{BatchOp, WriteBatch};
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory keyed storage backend.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral coordinators that don't need persistence
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
/// A batch is applied while holding the write lock, so readers never
/// observe half of it.
///
/// # Example
///
/// ```rust
/// use sysdb_storage::{InMemoryBackend, KvBackend, WriteBatch};
///
/// let backend = InMemoryBackend::new();
/// let mut batch = WriteBatch::new();
/// batch.put("a/1", vec![1]).put("a/2", vec![2]).put("b/1", vec![3]);
/// backend.write_batch(batch).unwrap();
/// assert_eq!(backend.scan_prefix("a/").unwrap().len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with pre-existing entries.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_entries(entries: impl IntoIterator<Item = (String, Vec<u8>)>) -> Self {
        Self {
            data: RwLock::new(entries.into_iter().collect()),
        }
    }

    /// Returns a copy of every entry in the backend.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Vec<u8>)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

pub(crate) fn apply_ops(map: &mut BTreeMap<String, Vec<u8>>, ops: Vec<BatchOp>) {
    for op in ops {
        match op {
            BatchOp::Put { key, value } => {
                map.insert(key, value);
            }
            BatchOp::Delete { key } => {
                map.remove(&key);
            }
        }
    }
}

pub(crate) fn scan(map: &BTreeMap<String, Vec<u8>>, prefix: &str) -> Vec<(String, Vec<u8>)> {
    map.range(prefix.to_string()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl KvBackend for InMemoryBackend {
    fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &str) -> StorageResult<Vec<(String, Vec<u8>)>> {
        Ok(scan(&self.data.read(), prefix))
    }

    fn write_batch(&self, batch: WriteBatch) -> StorageResult<()> {
        apply_ops(&mut self.data.write(), batch.into_ops());
        Ok(())
    }

    fn clear(&self) -> StorageResult<()> {
        self.data.write().clear();
        Ok(())
    }

    fn len(&self) -> StorageResult<usize> {
        Ok(self.data.read().len())
    }

    fn sync(&self) -> StorageResult<()> {
        // Nothing to make durable
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.len().unwrap(), 0);
        assert!(backend.is_empty().unwrap());
    }

    #[test]
    fn memory_get_missing_is_none() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.get("nope").unwrap(), None);
    }

    #[test]
    fn memory_batch_put_and_delete() {
        let backend = InMemoryBackend::new();
        let mut batch = WriteBatch::new();
        batch.put("k1", vec![1]).put("k2", vec![2]);
        backend.write_batch(batch).unwrap();

        let mut batch = WriteBatch::new();
        batch.delete("k1").put("k2", vec![3]);
        backend.write_batch(batch).unwrap();

        assert_eq!(backend.get("k1").unwrap(), None);
        assert_eq!(backend.get("k2").unwrap(), Some(vec![3]));
    }

    #[test]
    fn memory_scan_prefix_is_ordered_and_bounded() {
        let backend = InMemoryBackend::with_entries(vec![
            ("segment/b".to_string(), vec![2]),
            ("segment/a".to_string(), vec![1]),
            ("segments".to_string(), vec![9]),
            ("tenant/a".to_string(), vec![3]),
        ]);

        let keys: Vec<_> = backend
            .scan_prefix("segment/")
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["segment/a", "segment/b"]);
    }

    #[test]
    fn memory_clear() {
        let backend = InMemoryBackend::with_entries(vec![("a".to_string(), vec![1])]);
        backend.clear().unwrap();
        assert!(backend.is_empty().unwrap());
    }

    #[test]
    fn memory_sync_succeeds() {
        let backend = InMemoryBackend::new();
        assert!(backend.sync().is_ok());
    }
}
