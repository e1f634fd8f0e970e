//! Collection lifecycle.
//!
//! A collection is created together with its name claim and its initial
//! segments in one commit, and deleted together with them in one commit.
//! Readers therefore never see a collection without segments or a segment
//! whose collection is gone.

use crate::config::SysDbConfig;
use crate::error::{CoreError, CoreResult};
use crate::model::{
    apply_metadata_patch, validate_collection_metadata, Collection, Database, Metadata,
    MetadataPatch, NameClaim, Segment,
};
use crate::segments::{default_topology, segments_of, stage_cascade, stage_topology, validate_topology, SegmentSpec};
use crate::store::{EntityStore, Expected, StoreTxn, Versioned};
use crate::types::{validate_name, CollectionId, DatabaseId, TenantId, Version};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Request to create a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCollection {
    /// Caller-chosen id; generated when absent.
    #[serde(default)]
    pub id: Option<CollectionId>,
    /// Collection name.
    pub name: String,
    /// Owning tenant.
    pub tenant: TenantId,
    /// Owning database's name.
    pub database: String,
    /// Vector dimensionality, if already known.
    #[serde(default)]
    pub dimension: Option<u32>,
    /// Opaque configuration.
    #[serde(default)]
    pub metadata: Metadata,
    /// Initial segments; the configured default topology when absent.
    #[serde(default)]
    pub segments: Option<Vec<SegmentSpec>>,
    /// Return an existing live collection of this name instead of failing.
    #[serde(default)]
    pub get_or_create: bool,
}

impl NewCollection {
    /// Creates a request with default topology and no metadata.
    pub fn new(tenant: TenantId, database: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            tenant,
            database: database.into(),
            dimension: None,
            metadata: Metadata::new(),
            segments: None,
            get_or_create: false,
        }
    }

    /// Sets the collection id.
    #[must_use]
    pub fn with_id(mut self, id: CollectionId) -> Self {
        self.id = Some(id);
        self
    }

    /// Sets the dimensionality.
    #[must_use]
    pub fn with_dimension(mut self, dimension: u32) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Sets the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the initial segments.
    #[must_use]
    pub fn with_segments(mut self, segments: Vec<SegmentSpec>) -> Self {
        self.segments = Some(segments);
        self
    }

    /// Sets get-or-create behaviour.
    #[must_use]
    pub fn get_or_create(mut self, value: bool) -> Self {
        self.get_or_create = value;
        self
    }
}

/// Result of [`CollectionManager::create_collection`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedCollection {
    /// The collection.
    pub collection: Versioned<Collection>,
    /// Its live segments.
    pub segments: Vec<Versioned<Segment>>,
    /// False when an existing collection was returned.
    pub created: bool,
}

/// Collection query. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionFilter {
    /// Exact id.
    #[serde(default)]
    pub id: Option<CollectionId>,
    /// Exact name.
    #[serde(default)]
    pub name: Option<String>,
    /// Owning tenant.
    #[serde(default)]
    pub tenant: Option<TenantId>,
    /// Owning database's name.
    #[serde(default)]
    pub database: Option<String>,
    /// Maximum number of results.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Results to skip.
    #[serde(default)]
    pub offset: usize,
}

impl CollectionFilter {
    /// Matches every collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one id.
    #[must_use]
    pub fn id(mut self, id: CollectionId) -> Self {
        self.id = Some(id);
        self
    }

    /// Restricts to one name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restricts to one tenant and database.
    #[must_use]
    pub fn database(mut self, tenant: TenantId, database: impl Into<String>) -> Self {
        self.tenant = Some(tenant);
        self.database = Some(database.into());
        self
    }

    /// Sets paging.
    #[must_use]
    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    fn matches(&self, collection: &Collection) -> bool {
        self.id.map_or(true, |id| collection.id == id)
            && self.name.as_ref().map_or(true, |n| &collection.name == n)
            && self.tenant.as_ref().map_or(true, |t| &collection.tenant == t)
            && self
                .database
                .as_ref()
                .map_or(true, |d| &collection.database == d)
    }
}

/// Partial collection update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionPatch {
    /// New name.
    #[serde(default)]
    pub name: Option<String>,
    /// New dimensionality.
    #[serde(default)]
    pub dimension: Option<u32>,
    /// Keys to set, or remove when `None`.
    #[serde(default)]
    pub metadata: Option<MetadataPatch>,
    /// Drop all metadata before applying `metadata`.
    #[serde(default)]
    pub reset_metadata: bool,
}

/// Creates, queries, updates and deletes collections.
#[derive(Debug, Clone)]
pub struct CollectionManager {
    store: Arc<EntityStore>,
    config: Arc<SysDbConfig>,
}

impl CollectionManager {
    pub(crate) fn new(store: Arc<EntityStore>, config: Arc<SysDbConfig>) -> Self {
        Self { store, config }
    }

    /// Creates a collection with its initial segments.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a malformed name, metadata, dimension or topology
    /// - `NotFound` if the database does not exist
    /// - `AlreadyExists` if a live collection has this name in the database
    ///   (unless `get_or_create`), or the supplied id is taken
    pub fn create_collection(&self, new: NewCollection) -> CoreResult<CreatedCollection> {
        validate_name("collection", &new.name)?;
        validate_collection_metadata(&new.metadata)?;
        validate_dimension(new.dimension)?;
        let specs = new
            .segments
            .clone()
            .unwrap_or_else(|| default_topology(&self.config));
        validate_topology(&specs)?;

        let created = self.store.transact(|txn| {
            let database = resolve_database(txn, &new.tenant, &new.database)?;
            let claim_id =
                NameClaim::claim_id(&NameClaim::collection_scope(database.id), &new.name);

            if new.get_or_create {
                if let Some(claim) = txn.find::<NameClaim>(&claim_id)? {
                    let existing = txn.get::<Collection>(&claim.owner.to_string())?;
                    let segments = segments_of(txn, existing.id)?;
                    return Ok(CreatedCollection {
                        collection: existing,
                        segments,
                        created: false,
                    });
                }
            }

            let collection = Collection {
                id: new.id.unwrap_or_default(),
                name: new.name.clone(),
                tenant: new.tenant.clone(),
                database: database.name.clone(),
                database_id: database.id,
                dimension: new.dimension,
                metadata: new.metadata.clone(),
                log_position: 0,
            };
            txn.put(NameClaim::for_collection(&collection), Expected::Vacant)
                .map_err(|e| e.rename_conflict("collection", &new.name))?;
            let version = txn.put(collection.clone(), Expected::Vacant)?;
            let segments = stage_topology(txn, collection.id, specs)?;
            Ok(CreatedCollection {
                collection: Versioned {
                    version,
                    record: collection,
                },
                segments,
                created: true,
            })
        })?;

        if created.created {
            info!(
                collection = %created.collection.id,
                name = %new.name,
                database = %new.database,
                segments = created.segments.len(),
                "created collection"
            );
        } else {
            debug!(collection = %created.collection.id, "returned existing collection");
        }
        Ok(created)
    }

    /// Returns live collections matching `filter`, ordered by name.
    ///
    /// An unknown tenant or database yields an empty result.
    pub fn get_collections(&self, filter: &CollectionFilter) -> CoreResult<Vec<Versioned<Collection>>> {
        let mut collections = match filter.id {
            Some(id) => self
                .store
                .find::<Collection>(&id.to_string())?
                .into_iter()
                .filter(|c| filter.matches(c))
                .collect(),
            None => self.store.list::<Collection>(|c| filter.matches(c))?,
        };
        collections.sort_by(|a, b| {
            (a.tenant.as_str(), a.database.as_str(), a.name.as_str())
                .cmp(&(b.tenant.as_str(), b.database.as_str(), b.name.as_str()))
        });
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(collections
            .into_iter()
            .skip(filter.offset)
            .take(limit)
            .collect())
    }

    /// Applies `patch` to a collection and returns the stored result.
    ///
    /// A rename moves the name claim in the same commit.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a malformed name, metadata or dimension
    /// - `NotFound` if the collection is absent or deleted
    /// - `AlreadyExists` if the new name is taken
    /// - `VersionConflict` if `expected` is stale
    pub fn update_collection(
        &self,
        id: CollectionId,
        patch: CollectionPatch,
        expected: Option<Version>,
    ) -> CoreResult<Versioned<Collection>> {
        if let Some(name) = &patch.name {
            validate_name("collection", name)?;
        }
        validate_dimension(patch.dimension)?;

        let updated = self.store.transact(|txn| {
            let key = id.to_string();
            let mut collection = txn.get::<Collection>(&key)?.into_inner();

            if let Some(name) = patch.name.filter(|n| n != &collection.name) {
                let scope = NameClaim::collection_scope(collection.database_id);
                txn.delete::<NameClaim>(&NameClaim::claim_id(&scope, &collection.name), Expected::Any)?;
                collection.name = name;
                txn.put(NameClaim::for_collection(&collection), Expected::Vacant)
                    .map_err(|e| e.rename_conflict("collection", &collection.name))?;
            }
            if let Some(dimension) = patch.dimension {
                collection.dimension = Some(dimension);
            }
            if patch.reset_metadata {
                collection.metadata.clear();
            }
            if let Some(metadata) = patch.metadata {
                apply_metadata_patch(&mut collection.metadata, metadata);
            }
            validate_collection_metadata(&collection.metadata)?;

            txn.put(collection, expected.map_or(Expected::Any, Expected::Version))?;
            txn.get::<Collection>(&key)
        })?;
        debug!(collection = %id, version = %updated.version, log_position = updated.log_position, "updated collection");
        Ok(updated)
    }

    /// Deletes a collection and all of its segments.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the collection is absent or already deleted.
    pub fn delete_collection(&self, id: CollectionId) -> CoreResult<()> {
        let segments = self.store.transact(|txn| {
            let collection = txn.get::<Collection>(&id.to_string())?;
            stage_delete(txn, &collection)
        })?;
        info!(collection = %id, segments, "deleted collection");
        Ok(())
    }
}

fn validate_dimension(dimension: Option<u32>) -> CoreResult<()> {
    if dimension == Some(0) {
        return Err(CoreError::invalid_argument("dimension must be positive"));
    }
    Ok(())
}

fn resolve_database(
    txn: &StoreTxn<'_>,
    tenant: &TenantId,
    name: &str,
) -> CoreResult<Versioned<Database>> {
    let claim_id = NameClaim::claim_id(&NameClaim::database_scope(tenant), name);
    let claim = txn
        .find::<NameClaim>(&claim_id)?
        .ok_or_else(|| CoreError::not_found("database", name))?;
    txn.find::<Database>(&DatabaseId::from_uuid(claim.owner).to_string())?
        .ok_or_else(|| CoreError::not_found("database", name))
}

/// Stages tombstones for a collection, its name claim and its segments.
///
/// Returns the number of segments tombstoned.
pub(crate) fn stage_delete(txn: &mut StoreTxn<'_>, collection: &Collection) -> CoreResult<usize> {
    let segments = stage_cascade(txn, collection.id)?;
    let claim_id = NameClaim::claim_id(
        &NameClaim::collection_scope(collection.database_id),
        &collection.name,
    );
    if txn.find::<NameClaim>(&claim_id)?.is_some() {
        txn.delete::<NameClaim>(&claim_id, Expected::Any)?;
    }
    txn.delete::<Collection>(&collection.id.to_string(), Expected::Any)?;
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::model::{SegmentScope, HNSW_SPACE_KEY};
    use crate::segments::SegmentFilter;
    use crate::SysDb;

    fn t1() -> TenantId {
        TenantId::new("t1").unwrap()
    }

    fn setup() -> SysDb {
        let db = SysDb::open_in_memory(SysDbConfig::default()).unwrap();
        db.namespace().create_tenant(&t1(), None).unwrap();
        db.namespace().create_database(&t1(), "prod", None).unwrap();
        db
    }

    #[test]
    fn create_with_default_topology() {
        let db = setup();
        let created = db
            .collections()
            .create_collection(NewCollection::new(t1(), "prod", "docs").with_dimension(768))
            .unwrap();
        assert!(created.created);
        assert_eq!(created.collection.dimension, Some(768));
        assert_eq!(created.collection.log_position, 0);

        let mut scopes: Vec<_> = created.segments.iter().map(|s| s.scope).collect();
        scopes.sort();
        assert_eq!(scopes, [SegmentScope::Vector, SegmentScope::Metadata]);
        assert!(created
            .segments
            .iter()
            .all(|s| s.collection == created.collection.id));
    }

    #[test]
    fn unknown_database_is_not_found() {
        let db = setup();
        let err = db
            .collections()
            .create_collection(NewCollection::new(t1(), "nope", "docs"))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn duplicate_name_and_get_or_create() {
        let db = setup();
        let first = db
            .collections()
            .create_collection(NewCollection::new(t1(), "prod", "docs"))
            .unwrap();
        let err = db
            .collections()
            .create_collection(NewCollection::new(t1(), "prod", "docs"))
            .unwrap_err();
        assert_eq!(err.to_string(), "collection already exists: docs");

        let again = db
            .collections()
            .create_collection(NewCollection::new(t1(), "prod", "docs").get_or_create(true))
            .unwrap();
        assert!(!again.created);
        assert_eq!(again.collection.id, first.collection.id);
        assert_eq!(again.segments.len(), 2);
    }

    #[test]
    fn invalid_distance_function() {
        let db = setup();
        let mut metadata = Metadata::new();
        metadata.insert(HNSW_SPACE_KEY.into(), "manhattan".into());
        let err = db
            .collections()
            .create_collection(NewCollection::new(t1(), "prod", "docs").with_metadata(metadata))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn zero_dimension_rejected() {
        let db = setup();
        let err = db
            .collections()
            .create_collection(NewCollection::new(t1(), "prod", "docs").with_dimension(0))
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn get_collections_orders_and_pages() {
        let db = setup();
        for name in ["c", "a", "b"] {
            db.collections()
                .create_collection(NewCollection::new(t1(), "prod", name))
                .unwrap();
        }
        let all = db
            .collections()
            .get_collections(&CollectionFilter::new().database(t1(), "prod"))
            .unwrap();
        let names: Vec<_> = all.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);

        let page = db
            .collections()
            .get_collections(&CollectionFilter::new().database(t1(), "prod").page(1, 1))
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "b");

        let unknown = db
            .collections()
            .get_collections(&CollectionFilter::new().database(t1(), "ghost"))
            .unwrap();
        assert!(unknown.is_empty());
    }

    #[test]
    fn update_advances_log_position_and_renames() {
        let db = setup();
        let created = db
            .collections()
            .create_collection(NewCollection::new(t1(), "prod", "docs"))
            .unwrap();
        db.collections()
            .create_collection(NewCollection::new(t1(), "prod", "taken"))
            .unwrap();
        let id = created.collection.id;

        let mut set = MetadataPatch::new();
        set.insert("owner".into(), Some("search".into()));
        let updated = db
            .collections()
            .update_collection(
                id,
                CollectionPatch {
                    metadata: Some(set),
                    dimension: Some(384),
                    ..CollectionPatch::default()
                },
                Some(created.collection.version),
            )
            .unwrap();
        assert_eq!(updated.log_position, 1);
        assert_eq!(updated.dimension, Some(384));
        assert_eq!(updated.version, created.collection.version.next());

        let err = db
            .collections()
            .update_collection(
                id,
                CollectionPatch {
                    name: Some("taken".into()),
                    ..CollectionPatch::default()
                },
                None,
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);

        let renamed = db
            .collections()
            .update_collection(
                id,
                CollectionPatch {
                    name: Some("articles".into()),
                    ..CollectionPatch::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(renamed.name, "articles");
        assert_eq!(renamed.log_position, 2);

        // The old name is free again.
        db.collections()
            .create_collection(NewCollection::new(t1(), "prod", "docs"))
            .unwrap();
    }

    #[test]
    fn stale_collection_update() {
        let db = setup();
        let created = db
            .collections()
            .create_collection(NewCollection::new(t1(), "prod", "docs"))
            .unwrap();
        db.collections()
            .update_collection(created.collection.id, CollectionPatch::default(), None)
            .unwrap();
        let err = db
            .collections()
            .update_collection(
                created.collection.id,
                CollectionPatch {
                    name: Some("renamed".into()),
                    ..CollectionPatch::default()
                },
                Some(created.collection.version),
            )
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::VersionConflict);
        // The rename staged before the conflict must not have been applied.
        let names: Vec<_> = db
            .collections()
            .get_collections(&CollectionFilter::new())
            .unwrap()
            .into_iter()
            .map(|c| c.record.name)
            .collect();
        assert_eq!(names, ["docs"]);
    }

    #[test]
    fn delete_cascades_to_segments() {
        let db = setup();
        let created = db
            .collections()
            .create_collection(NewCollection::new(t1(), "prod", "docs"))
            .unwrap();
        let id = created.collection.id;

        db.collections().delete_collection(id).unwrap();
        assert!(db
            .collections()
            .get_collections(&CollectionFilter::new().id(id))
            .unwrap()
            .is_empty());
        assert!(db
            .segments()
            .get_segments(&SegmentFilter::new().collection(id))
            .unwrap()
            .is_empty());
        assert_eq!(
            db.collections().delete_collection(id).unwrap_err().code(),
            ErrorCode::NotFound
        );
    }
}
