//! Versioned entity store.
//!
//! Every record is persisted as an envelope `{version, deleted_at_ms, body}`
//! encoded as CBOR under the key `"{kind}/{id}"`. Writers race on the
//! version, never on the data:
//!
//! - a write names what it expects to find ([`Expected`]) and fails with
//!   `AlreadyExists`, `NotFound` or `VersionConflict` when the stored
//!   record disagrees
//! - a successful write stores the next version
//! - deletes leave a tombstone carrying the clock time; tombstones are
//!   invisible to reads and are removed later by
//!   [`EntityStore::purge_tombstones`]
//! - identifiers are never handed out twice: unless a kind opts in with
//!   [`Entity::REUSABLE_ID`], a `Vacant` write fails on a tombstone, and
//!   purging leaves a bodiless retired marker behind instead of freeing
//!   the key
//!
//! Multi-record changes go through [`EntityStore::transact`]. The closure
//! stages writes while the commit lock is held, and the staged writes are
//! applied as one backend batch: all of them or none.

use crate::clock::Clock;
use crate::config::RetryPolicy;
use crate::error::{CoreError, CoreResult};
use crate::retry::with_retry;
use crate::types::Version;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use sysdb_storage::{KvBackend, WriteBatch};
use tracing::debug;

/// A record type managed by the [`EntityStore`].
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Key prefix and error label for this record type.
    const KIND: &'static str;

    /// Whether a deleted key may be written again by a `Vacant` put.
    const REUSABLE_ID: bool = false;

    /// Returns the identifier the record is stored under.
    fn key_id(&self) -> String;

    /// Called when an existing live record is about to be overwritten or
    /// tombstoned.
    fn on_commit(&mut self) {}
}

/// Precondition for a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    /// No live record may exist. For kinds without
    /// [`Entity::REUSABLE_ID`], no tombstone or retired marker either.
    Vacant,
    /// The live record must be at exactly this version.
    Version(Version),
    /// No precondition.
    Any,
}

/// A decoded record together with its store version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// Version the record was read at.
    pub version: Version,
    /// The record.
    #[serde(flatten)]
    pub record: T,
}

impl<T> Versioned<T> {
    /// Returns the record, dropping the version.
    pub fn into_inner(self) -> T {
        self.record
    }
}

impl<T> Deref for Versioned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.record
    }
}

/// Counters describing the store contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Live records of every kind.
    pub live_records: usize,
    /// Tombstones awaiting purge.
    pub tombstones: usize,
    /// Purged keys kept so their ids are not reused.
    pub retired: usize,
    /// Batches committed since open.
    pub commits: u64,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    version: u64,
    deleted_at_ms: Option<u64>,
    #[serde(skip_serializing_if = "is_false")]
    keep_id: bool,
    #[serde(skip_serializing_if = "is_false")]
    retired: bool,
    body: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    version: u64,
    body: T,
}

/// Envelope fields without the body.
#[derive(Deserialize)]
struct Header {
    version: u64,
    deleted_at_ms: Option<u64>,
    /// The key must survive purging as a retired marker.
    #[serde(default)]
    keep_id: bool,
    /// The body was dropped by a purge.
    #[serde(default)]
    retired: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn record_key(kind: &str, id: &str) -> String {
    format!("{kind}/{id}")
}

fn encode<T: Entity>(version: u64, deleted_at_ms: Option<u64>, body: &T) -> CoreResult<Vec<u8>> {
    encode_envelope(&EnvelopeRef {
        version,
        deleted_at_ms,
        keep_id: !T::REUSABLE_ID,
        retired: false,
        body,
    })
}

/// Encodes the marker a purge leaves in place of a tombstone.
fn encode_retired(header: &Header) -> CoreResult<Vec<u8>> {
    encode_envelope(&EnvelopeRef {
        version: header.version,
        deleted_at_ms: header.deleted_at_ms,
        keep_id: true,
        retired: true,
        body: &(),
    })
}

fn encode_envelope<T: Serialize>(envelope: &EnvelopeRef<'_, T>) -> CoreResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(&envelope, &mut buf).map_err(|e| CoreError::codec(e.to_string()))?;
    Ok(buf)
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> CoreResult<T> {
    ciborium::from_reader(bytes).map_err(|e| CoreError::codec(format!("{key}: {e}")))
}

/// Versioned, tombstoning record store over a [`KvBackend`].
pub struct EntityStore {
    backend: Arc<dyn KvBackend>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    /// Held while a transaction stages and applies its writes.
    commit_lock: Mutex<()>,
    commits: AtomicU64,
}

impl EntityStore {
    /// Creates a store over `backend`.
    pub fn new(backend: Arc<dyn KvBackend>, clock: Arc<dyn Clock>, retry: RetryPolicy) -> Self {
        Self {
            backend,
            clock,
            retry,
            commit_lock: Mutex::new(()),
            commits: AtomicU64::new(0),
        }
    }

    /// Returns the clock used for tombstone stamps.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the retry policy for storage access.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn read_raw(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        with_retry(&self.retry, "read", || self.backend.get(key))
    }

    fn scan_raw(&self, prefix: &str) -> CoreResult<Vec<(String, Vec<u8>)>> {
        with_retry(&self.retry, "scan", || self.backend.scan_prefix(prefix))
    }

    /// Reads a live record, or `None` when absent or tombstoned.
    pub fn find<T: Entity>(&self, id: &str) -> CoreResult<Option<Versioned<T>>> {
        let key = record_key(T::KIND, id);
        match self.read_raw(&key)? {
            Some(bytes) => live::<T>(&key, &bytes),
            None => Ok(None),
        }
    }

    /// Reads a live record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the record is absent or tombstoned.
    pub fn get<T: Entity>(&self, id: &str) -> CoreResult<Versioned<T>> {
        self.find::<T>(id)?
            .ok_or_else(|| CoreError::not_found(T::KIND, id))
    }

    /// Returns every live record of kind `T` accepted by `filter`, in key order.
    pub fn list<T: Entity>(&self, filter: impl Fn(&T) -> bool) -> CoreResult<Vec<Versioned<T>>> {
        let prefix = record_key(T::KIND, "");
        let mut out = Vec::new();
        for (key, bytes) in self.scan_raw(&prefix)? {
            if let Some(record) = live::<T>(&key, &bytes)? {
                if filter(&record.record) {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }

    /// Writes a single record. Returns the stored version.
    pub fn put<T: Entity>(&self, record: T, expected: Expected) -> CoreResult<Version> {
        self.transact(|txn| txn.put(record, expected))
    }

    /// Tombstones a single record.
    pub fn delete<T: Entity>(&self, id: &str, expected: Expected) -> CoreResult<()> {
        self.transact(|txn| txn.delete::<T>(id, expected).map(|_| ()))
    }

    /// Runs `f` against a transaction and commits its writes atomically.
    ///
    /// Nothing is written if `f` fails. The commit lock is held for the
    /// whole call, so preconditions checked while staging still hold when
    /// the batch is applied.
    pub fn transact<R>(&self, f: impl FnOnce(&mut StoreTxn<'_>) -> CoreResult<R>) -> CoreResult<R> {
        let _guard = self.commit_lock.lock();
        let mut txn = StoreTxn {
            store: self,
            staged: BTreeMap::new(),
            now_ms: self.clock.now_ms(),
        };
        let result = f(&mut txn)?;
        if txn.staged.is_empty() {
            return Ok(result);
        }

        let ops = txn.staged.len();
        let mut batch = WriteBatch::new();
        for (key, staged) in txn.staged {
            batch.put(key, staged.bytes);
        }
        with_retry(&self.retry, "commit", || self.backend.write_batch(batch.clone()))?;
        let commit = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(commit, ops, "committed batch");
        Ok(result)
    }

    /// Purges tombstones older than `retention`.
    ///
    /// Tombstones of reusable kinds are removed. All others are replaced
    /// by a retired marker that keeps the key without its body. Returns the
    /// number of tombstones purged either way.
    pub fn purge_tombstones(&self, retention: Duration) -> CoreResult<usize> {
        let _guard = self.commit_lock.lock();
        let now = self.clock.now_ms();
        let retention_ms = u64::try_from(retention.as_millis()).unwrap_or(u64::MAX);

        let mut batch = WriteBatch::new();
        for (key, bytes) in self.scan_raw("")? {
            let header: Header = decode(&key, &bytes)?;
            let Some(deleted_at) = header.deleted_at_ms else {
                continue;
            };
            if header.retired || now.saturating_sub(deleted_at) < retention_ms {
                continue;
            }
            if header.keep_id {
                batch.put(key, encode_retired(&header)?);
            } else {
                batch.delete(key);
            }
        }
        let purged = batch.len();
        if purged > 0 {
            with_retry(&self.retry, "purge", || self.backend.write_batch(batch.clone()))?;
            self.commits.fetch_add(1, Ordering::SeqCst);
        }
        debug!(purged, "purged tombstones");
        Ok(purged)
    }

    /// Drops every record, live or tombstoned.
    pub fn clear(&self) -> CoreResult<()> {
        let _guard = self.commit_lock.lock();
        with_retry(&self.retry, "clear", || self.backend.clear())?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Counts live records and tombstones.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        let mut stats = StoreStats {
            commits: self.commits.load(Ordering::SeqCst),
            ..StoreStats::default()
        };
        for (key, bytes) in self.scan_raw("")? {
            let header: Header = decode(&key, &bytes)?;
            if header.retired {
                stats.retired += 1;
            } else if header.deleted_at_ms.is_some() {
                stats.tombstones += 1;
            } else {
                stats.live_records += 1;
            }
        }
        Ok(stats)
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("retry", &self.retry)
            .field("commits", &self.commits.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn live<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> CoreResult<Option<Versioned<T>>> {
    let header: Header = decode(key, bytes)?;
    if header.deleted_at_ms.is_some() {
        return Ok(None);
    }
    let envelope: Envelope<T> = decode(key, bytes)?;
    Ok(Some(Versioned {
        version: Version::new(envelope.version),
        record: envelope.body,
    }))
}

struct Staged {
    bytes: Vec<u8>,
}

/// Writes staged inside [`EntityStore::transact`].
///
/// Reads through a transaction observe its own staged writes.
pub struct StoreTxn<'a> {
    store: &'a EntityStore,
    staged: BTreeMap<String, Staged>,
    now_ms: u64,
}

impl StoreTxn<'_> {
    /// Returns the time the transaction started, in unix milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn raw(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        match self.staged.get(key) {
            Some(staged) => Ok(Some(staged.bytes.clone())),
            None => self.store.read_raw(key),
        }
    }

    fn header(&self, key: &str) -> CoreResult<Option<Header>> {
        self.raw(key)?
            .map(|bytes| decode::<Header>(key, &bytes))
            .transpose()
    }

    /// Reads a live record, or `None` when absent or tombstoned.
    pub fn find<T: Entity>(&self, id: &str) -> CoreResult<Option<Versioned<T>>> {
        let key = record_key(T::KIND, id);
        match self.raw(&key)? {
            Some(bytes) => live::<T>(&key, &bytes),
            None => Ok(None),
        }
    }

    /// Reads a live record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the record is absent or tombstoned.
    pub fn get<T: Entity>(&self, id: &str) -> CoreResult<Versioned<T>> {
        self.find::<T>(id)?
            .ok_or_else(|| CoreError::not_found(T::KIND, id))
    }

    /// Returns every live record of kind `T` accepted by `filter`, in key order.
    pub fn list<T: Entity>(&self, filter: impl Fn(&T) -> bool) -> CoreResult<Vec<Versioned<T>>> {
        let prefix = record_key(T::KIND, "");
        let mut merged: BTreeMap<String, Vec<u8>> =
            self.store.scan_raw(&prefix)?.into_iter().collect();
        for (key, staged) in self.staged.range(prefix.clone()..) {
            if !key.starts_with(&prefix) {
                break;
            }
            merged.insert(key.clone(), staged.bytes.clone());
        }

        let mut out = Vec::new();
        for (key, bytes) in merged {
            if let Some(record) = live::<T>(&key, &bytes)? {
                if filter(&record.record) {
                    out.push(record);
                }
            }
        }
        Ok(out)
    }

    /// Stages a write of `record`. Returns the version it will be stored at.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if `expected` is [`Expected::Vacant`] and a live
    ///   record exists, or the key was ever used by a non-reusable kind
    /// - `NotFound` if `expected` names a version and no live record exists
    /// - `VersionConflict` if the live record is at another version
    pub fn put<T: Entity>(&mut self, mut record: T, expected: Expected) -> CoreResult<Version> {
        let id = record.key_id();
        let key = record_key(T::KIND, &id);
        let current = self.header(&key)?;
        let live_version = current
            .as_ref()
            .filter(|h| h.deleted_at_ms.is_none())
            .map(|h| h.version);

        match (expected, live_version) {
            (Expected::Vacant, Some(_)) => return Err(CoreError::already_exists(T::KIND, id)),
            (Expected::Vacant, None) if current.is_some() && !T::REUSABLE_ID => {
                return Err(CoreError::already_exists(T::KIND, id));
            }
            (Expected::Version(_), None) => return Err(CoreError::not_found(T::KIND, id)),
            (Expected::Version(want), Some(actual)) if want.as_u64() != actual => {
                return Err(CoreError::VersionConflict {
                    kind: T::KIND,
                    id,
                    expected: want.as_u64(),
                    actual,
                });
            }
            _ => {}
        }

        if live_version.is_some() {
            record.on_commit();
        }
        let version = current.map_or(0, |h| h.version) + 1;
        let bytes = encode(version, None, &record)?;
        self.staged.insert(key, Staged { bytes });
        Ok(Version::new(version))
    }

    /// Stages a tombstone for the live record `id`. Returns the tombstone's version.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the record is absent or already tombstoned
    /// - `VersionConflict` if `expected` names another version
    /// - `InvalidArgument` for [`Expected::Vacant`]
    pub fn delete<T: Entity>(&mut self, id: &str, expected: Expected) -> CoreResult<Version> {
        if expected == Expected::Vacant {
            return Err(CoreError::invalid_argument(
                "a delete cannot expect a vacant record",
            ));
        }
        let key = record_key(T::KIND, id);
        let current = self
            .raw(&key)?
            .map(|bytes| live::<T>(&key, &bytes))
            .transpose()?
            .flatten()
            .ok_or_else(|| CoreError::not_found(T::KIND, id))?;

        if let Expected::Version(want) = expected {
            if want != current.version {
                return Err(CoreError::VersionConflict {
                    kind: T::KIND,
                    id: id.to_string(),
                    expected: want.as_u64(),
                    actual: current.version.as_u64(),
                });
            }
        }

        let mut body = current.record;
        body.on_commit();
        let version = current.version.as_u64() + 1;
        let bytes = encode(version, Some(self.now_ms), &body)?;
        self.staged.insert(key, Staged { bytes });
        Ok(Version::new(version))
    }

    /// Number of writes staged so far.
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::ErrorCode;
    use sysdb_storage::InMemoryBackend;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        text: String,
        touched: u32,
    }

    impl Entity for Note {
        const KIND: &'static str = "note";

        fn key_id(&self) -> String {
            self.id.clone()
        }

        fn on_commit(&mut self) {
            self.touched += 1;
        }
    }

    fn note(id: &str, text: &str) -> Note {
        Note {
            id: id.into(),
            text: text.into(),
            touched: 0,
        }
    }

    fn store() -> (EntityStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = EntityStore::new(
            Arc::new(InMemoryBackend::new()),
            clock.clone(),
            RetryPolicy::no_retry(),
        );
        (store, clock)
    }

    #[test]
    fn put_vacant_then_get() {
        let (store, _) = store();
        let v = store.put(note("a", "hello"), Expected::Vacant).unwrap();
        assert_eq!(v, Version::new(1));

        let got = store.get::<Note>("a").unwrap();
        assert_eq!(got.version, Version::new(1));
        assert_eq!(got.text, "hello");
        assert_eq!(got.touched, 0);
    }

    #[test]
    fn vacant_conflict_is_already_exists() {
        let (store, _) = store();
        store.put(note("a", "x"), Expected::Vacant).unwrap();
        let err = store.put(note("a", "y"), Expected::Vacant).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);
        assert_eq!(store.get::<Note>("a").unwrap().text, "x");
    }

    #[test]
    fn stale_version_is_rejected() {
        let (store, _) = store();
        store.put(note("a", "x"), Expected::Vacant).unwrap();
        let v2 = store
            .put(note("a", "y"), Expected::Version(Version::new(1)))
            .unwrap();
        assert_eq!(v2, Version::new(2));

        let err = store
            .put(note("a", "z"), Expected::Version(Version::new(1)))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        let got = store.get::<Note>("a").unwrap();
        assert_eq!(got.text, "y");
        assert_eq!(got.touched, 1);
    }

    #[test]
    fn versioned_write_to_missing_record_is_not_found() {
        let (store, _) = store();
        let err = store
            .put(note("a", "x"), Expected::Version(Version::new(1)))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn delete_tombstones_and_hides() {
        let (store, _) = store();
        store.put(note("a", "x"), Expected::Vacant).unwrap();
        store.delete::<Note>("a", Expected::Any).unwrap();

        assert!(store.find::<Note>("a").unwrap().is_none());
        assert!(store.list::<Note>(|_| true).unwrap().is_empty());
        assert_eq!(
            store.delete::<Note>("a", Expected::Any).unwrap_err().code(),
            ErrorCode::NotFound
        );
        assert_eq!(store.stats().unwrap().tombstones, 1);
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Label {
        name: String,
    }

    impl Entity for Label {
        const KIND: &'static str = "label";
        const REUSABLE_ID: bool = true;

        fn key_id(&self) -> String {
            self.name.clone()
        }
    }

    fn label(name: &str) -> Label {
        Label { name: name.into() }
    }

    #[test]
    fn tombstoned_id_is_not_reused() {
        let (store, _) = store();
        store.put(note("a", "x"), Expected::Vacant).unwrap();
        store.delete::<Note>("a", Expected::Any).unwrap();

        let err = store.put(note("a", "again"), Expected::Vacant).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);
        assert!(store.find::<Note>("a").unwrap().is_none());
    }

    #[test]
    fn purged_id_is_retired_not_freed() {
        let (store, clock) = store();
        store.put(note("a", "x"), Expected::Vacant).unwrap();
        store.delete::<Note>("a", Expected::Any).unwrap();
        clock.advance(Duration::from_secs(10));

        assert_eq!(store.purge_tombstones(Duration::from_secs(1)).unwrap(), 1);
        let stats = store.stats().unwrap();
        assert_eq!((stats.tombstones, stats.retired), (0, 1));
        assert!(store.find::<Note>("a").unwrap().is_none());
        assert!(store.list::<Note>(|_| true).unwrap().is_empty());

        let err = store.put(note("a", "again"), Expected::Vacant).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);
        assert_eq!(
            store.delete::<Note>("a", Expected::Any).unwrap_err().code(),
            ErrorCode::NotFound
        );
        assert_eq!(store.purge_tombstones(Duration::ZERO).unwrap(), 0);
    }

    #[test]
    fn reusable_key_can_be_reclaimed_with_higher_version() {
        let (store, clock) = store();
        store.put(label("prod"), Expected::Vacant).unwrap();
        store.delete::<Label>("prod", Expected::Any).unwrap();
        let v = store.put(label("prod"), Expected::Vacant).unwrap();
        assert_eq!(v, Version::new(3));

        store.delete::<Label>("prod", Expected::Any).unwrap();
        clock.advance(Duration::from_secs(10));
        assert_eq!(store.purge_tombstones(Duration::from_secs(1)).unwrap(), 1);
        assert_eq!(store.stats().unwrap().retired, 0);
        assert_eq!(store.put(label("prod"), Expected::Vacant).unwrap(), Version::new(1));
    }

    #[test]
    fn failed_transaction_writes_nothing() {
        let (store, _) = store();
        store.put(note("taken", "x"), Expected::Vacant).unwrap();

        let err = store
            .transact(|txn| {
                txn.put(note("fresh", "1"), Expected::Vacant)?;
                txn.put(note("taken", "2"), Expected::Vacant)?;
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);
        assert!(store.find::<Note>("fresh").unwrap().is_none());
    }

    #[test]
    fn transaction_reads_its_own_writes() {
        let (store, _) = store();
        store.put(note("a", "x"), Expected::Vacant).unwrap();
        store
            .transact(|txn| {
                txn.put(note("b", "y"), Expected::Vacant)?;
                txn.delete::<Note>("a", Expected::Any)?;
                let visible: Vec<_> = txn
                    .list::<Note>(|_| true)?
                    .into_iter()
                    .map(|n| n.record.id)
                    .collect();
                assert_eq!(visible, vec!["b".to_string()]);
                assert_eq!(txn.staged_len(), 2);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn list_filters_by_predicate() {
        let (store, _) = store();
        for (id, text) in [("a", "keep"), ("b", "drop"), ("c", "keep")] {
            store.put(note(id, text), Expected::Vacant).unwrap();
        }
        let kept = store.list::<Note>(|n| n.text == "keep").unwrap();
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].id, "a");
        assert_eq!(kept[1].id, "c");
    }

    #[test]
    fn purge_respects_retention() {
        let (store, clock) = store();
        store.put(note("old", "x"), Expected::Vacant).unwrap();
        store.put(note("new", "y"), Expected::Vacant).unwrap();
        store.put(note("live", "z"), Expected::Vacant).unwrap();

        store.delete::<Note>("old", Expected::Any).unwrap();
        clock.advance(Duration::from_secs(50));
        store.delete::<Note>("new", Expected::Any).unwrap();
        clock.advance(Duration::from_secs(20));

        let purged = store.purge_tombstones(Duration::from_secs(60)).unwrap();
        assert_eq!(purged, 1);

        let stats = store.stats().unwrap();
        assert_eq!(stats.tombstones, 1);
        assert_eq!(stats.retired, 1);
        assert_eq!(stats.live_records, 1);
    }

    #[test]
    fn clear_drops_everything() {
        let (store, _) = store();
        store.put(note("a", "x"), Expected::Vacant).unwrap();
        store.clear().unwrap();
        assert!(store.find::<Note>("a").unwrap().is_none());
        assert_eq!(store.stats().unwrap().live_records, 0);
    }
}
