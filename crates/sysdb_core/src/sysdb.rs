//! The coordinator's composition root.

use crate::capability::AdminCapability;
use crate::clock::{Clock, SystemClock};
use crate::collections::CollectionManager;
use crate::config::SysDbConfig;
use crate::error::{CoreError, CoreResult, ErrorCode};
use crate::namespace::NamespaceManager;
use crate::segments::SegmentRegistry;
use crate::store::{EntityStore, StoreStats};
use crate::types::{TenantId, DEFAULT_DATABASE, DEFAULT_TENANT};
use crate::watermark::WatermarkTracker;
use std::path::Path;
use std::sync::Arc;
use sysdb_storage::{FileBackend, InMemoryBackend, KvBackend};
use tracing::{info, warn};

/// Metadata coordinator state.
///
/// `SysDb` wires the entity store to the namespace manager, segment
/// registry, collection manager and watermark tracker. It is cheap to share
/// behind an `Arc`; every component holds the same store and no component
/// caches records between calls.
///
/// # Example
///
/// ```rust
/// use sysdb_core::{NewCollection, SysDb, SysDbConfig, TenantId};
///
/// let db = SysDb::open_in_memory(SysDbConfig::default())?;
/// let t1 = TenantId::new("t1")?;
/// db.namespace().create_tenant(&t1, None)?;
/// db.namespace().create_database(&t1, "prod", None)?;
/// let created = db
///     .collections()
///     .create_collection(NewCollection::new(t1, "prod", "docs").with_dimension(768))?;
/// assert_eq!(created.segments.len(), 2);
/// # Ok::<(), sysdb_core::CoreError>(())
/// ```
#[derive(Debug)]
pub struct SysDb {
    store: Arc<EntityStore>,
    config: Arc<SysDbConfig>,
    namespace: NamespaceManager,
    segments: SegmentRegistry,
    collections: CollectionManager,
    watermarks: WatermarkTracker,
}

impl SysDb {
    /// Opens a coordinator over `backend` using the system clock.
    pub fn open(backend: Arc<dyn KvBackend>, config: SysDbConfig) -> CoreResult<Self> {
        Self::open_with_clock(backend, config, Arc::new(SystemClock))
    }

    /// Opens a coordinator over `backend` with an explicit clock.
    pub fn open_with_clock(
        backend: Arc<dyn KvBackend>,
        config: SysDbConfig,
        clock: Arc<dyn Clock>,
    ) -> CoreResult<Self> {
        let config = Arc::new(config);
        let store = Arc::new(EntityStore::new(backend, clock, config.retry.clone()));
        let db = Self {
            namespace: NamespaceManager::new(store.clone(), config.clone()),
            segments: SegmentRegistry::new(store.clone()),
            collections: CollectionManager::new(store.clone(), config.clone()),
            watermarks: WatermarkTracker::new(store.clone(), config.clone()),
            store,
            config,
        };
        if db.config.bootstrap_defaults {
            db.bootstrap_defaults()?;
        }
        Ok(db)
    }

    /// Opens an ephemeral coordinator.
    pub fn open_in_memory(config: SysDbConfig) -> CoreResult<Self> {
        Self::open(Arc::new(InMemoryBackend::new()), config)
    }

    /// Opens a coordinator persisted in the directory `path`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the directory is locked by another
    /// process or its log is unreadable.
    pub fn open_path(path: &Path, config: SysDbConfig) -> CoreResult<Self> {
        let backend = FileBackend::open(path)?;
        Self::open(Arc::new(backend), config)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SysDbConfig {
        &self.config
    }

    /// Returns the entity store.
    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    /// Tenants and databases.
    pub fn namespace(&self) -> &NamespaceManager {
        &self.namespace
    }

    /// Segments.
    pub fn segments(&self) -> &SegmentRegistry {
        &self.segments
    }

    /// Collections.
    pub fn collections(&self) -> &CollectionManager {
        &self.collections
    }

    /// Compaction watermarks.
    pub fn watermarks(&self) -> &WatermarkTracker {
        &self.watermarks
    }

    /// Creates the default tenant and database if they are missing.
    pub fn bootstrap_defaults(&self) -> CoreResult<()> {
        let tenant = TenantId::new(DEFAULT_TENANT)?;
        ignore_existing(self.namespace.create_tenant(&tenant, None))?;
        ignore_existing(self.namespace.create_database(&tenant, DEFAULT_DATABASE, None))?;
        Ok(())
    }

    /// Drops every tenant, database, collection, segment and watermark.
    ///
    /// # Errors
    ///
    /// Returns `Unimplemented` without an admin capability, or when resets
    /// are disabled in the configuration.
    pub fn reset_state(&self, cap: Option<&AdminCapability>) -> CoreResult<()> {
        let cap = cap.ok_or_else(|| {
            CoreError::unimplemented("reset_state requires an admin capability")
        })?;
        if !self.config.allow_reset {
            warn!(principal = cap.principal(), "refused reset: disabled by configuration");
            return Err(CoreError::unimplemented(
                "reset disabled: start the coordinator with resets allowed",
            ));
        }
        self.store.clear()?;
        warn!(principal = cap.principal(), "coordinator state reset");
        if self.config.bootstrap_defaults {
            self.bootstrap_defaults()?;
        }
        Ok(())
    }

    /// Removes tombstones older than the configured retention.
    pub fn purge_tombstones(&self) -> CoreResult<usize> {
        let purged = self.store.purge_tombstones(self.config.tombstone_retention)?;
        if purged > 0 {
            info!(purged, "purged tombstones");
        }
        Ok(purged)
    }

    /// Returns store counters.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        self.store.stats()
    }
}

fn ignore_existing<T>(result: CoreResult<T>) -> CoreResult<()> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.code() == ErrorCode::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::collections::{CollectionFilter, NewCollection};
    use crate::segments::SegmentFilter;
    use std::time::Duration;

    #[test]
    fn bootstrap_is_idempotent() {
        let db = SysDb::open_in_memory(SysDbConfig::new().bootstrap_defaults(true)).unwrap();
        db.bootstrap_defaults().unwrap();
        let tenant = TenantId::new(DEFAULT_TENANT).unwrap();
        assert!(db.namespace().get_database(&tenant, DEFAULT_DATABASE).is_ok());
    }

    #[test]
    fn reset_requires_capability_and_permission() {
        let db = SysDb::open_in_memory(SysDbConfig::default()).unwrap();
        let err = db.reset_state(None).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unimplemented);

        let cap = AdminCapability::grant("ops");
        let err = db.reset_state(Some(&cap)).unwrap_err();
        assert!(err.to_string().contains("reset disabled"));
    }

    #[test]
    fn reset_clears_everything() {
        let db = SysDb::open_in_memory(SysDbConfig::new().allow_reset(true)).unwrap();
        let t1 = TenantId::new("t1").unwrap();
        db.namespace().create_tenant(&t1, None).unwrap();
        db.namespace().create_database(&t1, "prod", None).unwrap();
        let created = db
            .collections()
            .create_collection(NewCollection::new(t1.clone(), "prod", "docs"))
            .unwrap();

        db.reset_state(Some(&AdminCapability::grant("ops"))).unwrap();

        assert_eq!(
            db.namespace().get_tenant(&t1).unwrap_err().code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            db.namespace().get_database(&t1, "prod").unwrap_err().code(),
            ErrorCode::NotFound
        );
        assert!(db
            .collections()
            .get_collections(&CollectionFilter::new())
            .unwrap()
            .is_empty());
        assert!(db
            .segments()
            .get_segments(&SegmentFilter::new().collection(created.collection.id))
            .unwrap()
            .is_empty());
        assert_eq!(db.watermarks().get_last_compaction_time(&t1).unwrap(), 0);
    }

    #[test]
    fn purge_uses_configured_retention() {
        let clock = Arc::new(ManualClock::new(0));
        let db = SysDb::open_with_clock(
            Arc::new(InMemoryBackend::new()),
            SysDbConfig::new().tombstone_retention(Duration::from_secs(10)),
            clock.clone(),
        )
        .unwrap();
        let t1 = TenantId::new("t1").unwrap();
        db.namespace().create_tenant(&t1, None).unwrap();
        db.namespace().create_database(&t1, "prod", None).unwrap();
        let created = db
            .collections()
            .create_collection(NewCollection::new(t1, "prod", "docs"))
            .unwrap();
        db.collections().delete_collection(created.collection.id).unwrap();

        assert_eq!(db.purge_tombstones().unwrap(), 0);
        clock.advance(Duration::from_secs(11));
        // collection, its name claim and two segments
        assert_eq!(db.purge_tombstones().unwrap(), 4);
        let stats = db.stats().unwrap();
        assert_eq!(stats.tombstones, 0);
        // the name claim is freed, the collection and segment ids are retired
        assert_eq!(stats.retired, 3);
    }

    fn clocked() -> (SysDb, Arc<ManualClock>, TenantId) {
        let clock = Arc::new(ManualClock::new(0));
        let db = SysDb::open_with_clock(
            Arc::new(InMemoryBackend::new()),
            SysDbConfig::new().tombstone_retention(Duration::from_secs(10)),
            clock.clone(),
        )
        .unwrap();
        let t1 = TenantId::new("t1").unwrap();
        db.namespace().create_tenant(&t1, None).unwrap();
        (db, clock, t1)
    }

    #[test]
    fn deleted_database_id_is_never_reused() {
        let (db, clock, t1) = clocked();
        let cap = AdminCapability::grant("ops");
        let id = crate::types::DatabaseId::new();
        db.namespace().create_database(&t1, "prod", Some(id)).unwrap();
        db.namespace().delete_database(Some(&cap), &t1, "prod").unwrap();

        let err = db.namespace().create_database(&t1, "other", Some(id)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);

        clock.advance(Duration::from_secs(11));
        db.purge_tombstones().unwrap();
        let err = db.namespace().create_database(&t1, "other", Some(id)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);

        // the name itself is free again under a fresh id
        let again = db.namespace().create_database(&t1, "prod", None).unwrap();
        assert_ne!(again.id, id);
    }

    #[test]
    fn deleted_collection_id_is_never_reused() {
        let (db, clock, t1) = clocked();
        db.namespace().create_database(&t1, "prod", None).unwrap();
        let id = crate::types::CollectionId::new();
        db.collections()
            .create_collection(NewCollection::new(t1.clone(), "prod", "docs").with_id(id))
            .unwrap();
        db.collections().delete_collection(id).unwrap();

        let recreate = || {
            db.collections()
                .create_collection(NewCollection::new(t1.clone(), "prod", "other").with_id(id))
        };
        assert_eq!(recreate().unwrap_err().code(), ErrorCode::AlreadyExists);

        clock.advance(Duration::from_secs(11));
        db.purge_tombstones().unwrap();
        assert_eq!(recreate().unwrap_err().code(), ErrorCode::AlreadyExists);
        assert!(db
            .collections()
            .get_collections(&CollectionFilter::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn deleted_segment_id_is_never_reused() {
        use crate::model::SegmentScope;
        use crate::segments::NewSegment;
        use crate::types::SegmentId;

        let (db, clock, t1) = clocked();
        db.namespace().create_database(&t1, "prod", None).unwrap();
        let created = db
            .collections()
            .create_collection(NewCollection::new(t1, "prod", "docs"))
            .unwrap();
        let id = SegmentId::new();
        let new = || NewSegment {
            id: Some(id),
            segment_type: "urn:segment:record".into(),
            scope: SegmentScope::Record,
            collection: created.collection.id,
            metadata: Default::default(),
        };
        db.segments().create_segment(new()).unwrap();
        db.segments().delete_segment(id).unwrap();
        assert_eq!(
            db.segments().create_segment(new()).unwrap_err().code(),
            ErrorCode::AlreadyExists
        );

        clock.advance(Duration::from_secs(11));
        db.purge_tombstones().unwrap();
        assert_eq!(
            db.segments().create_segment(new()).unwrap_err().code(),
            ErrorCode::AlreadyExists
        );
        let filter = SegmentFilter {
            id: Some(id),
            ..SegmentFilter::default()
        };
        assert!(db.segments().get_segments(&filter).unwrap().is_empty());
    }
}
