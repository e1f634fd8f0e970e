//! Segment registry.

use crate::config::SysDbConfig;
use crate::error::{CoreError, CoreResult};
use crate::model::{apply_metadata_patch, Collection, Metadata, MetadataPatch, Segment, SegmentScope};
use crate::store::{EntityStore, Expected, StoreTxn, Versioned};
use crate::types::{CollectionId, SegmentId, Version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Scopes every collection must have a segment for.
pub const REQUIRED_SCOPES: [SegmentScope; 2] = [SegmentScope::Metadata, SegmentScope::Vector];

/// Request to register a segment for an existing collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSegment {
    /// Caller-chosen id; generated when absent.
    #[serde(default)]
    pub id: Option<SegmentId>,
    /// Implementation type URN.
    pub segment_type: String,
    /// Scope within the collection.
    pub scope: SegmentScope,
    /// Owning collection.
    pub collection: CollectionId,
    /// Opaque configuration.
    #[serde(default)]
    pub metadata: Metadata,
}

/// Segment shape used when creating a collection together with its segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSpec {
    /// Implementation type URN.
    pub segment_type: String,
    /// Scope within the collection.
    pub scope: SegmentScope,
    /// Opaque configuration.
    #[serde(default)]
    pub metadata: Metadata,
}

impl SegmentSpec {
    /// Creates a spec with empty metadata.
    pub fn new(segment_type: impl Into<String>, scope: SegmentScope) -> Self {
        Self {
            segment_type: segment_type.into(),
            scope,
            metadata: Metadata::new(),
        }
    }
}

/// Conjunctive segment query. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentFilter {
    /// Exact id.
    #[serde(default)]
    pub id: Option<SegmentId>,
    /// Exact implementation type.
    #[serde(default)]
    pub segment_type: Option<String>,
    /// Exact scope.
    #[serde(default)]
    pub scope: Option<SegmentScope>,
    /// Owning collection.
    #[serde(default)]
    pub collection: Option<CollectionId>,
}

impl SegmentFilter {
    /// Matches every segment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one id.
    #[must_use]
    pub fn id(mut self, id: SegmentId) -> Self {
        self.id = Some(id);
        self
    }

    /// Restricts to one implementation type.
    #[must_use]
    pub fn segment_type(mut self, segment_type: impl Into<String>) -> Self {
        self.segment_type = Some(segment_type.into());
        self
    }

    /// Restricts to one scope.
    #[must_use]
    pub fn scope(mut self, scope: SegmentScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Restricts to one collection.
    #[must_use]
    pub fn collection(mut self, collection: CollectionId) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Returns true if `segment` satisfies every set field.
    pub fn matches(&self, segment: &Segment) -> bool {
        self.id.map_or(true, |id| segment.id == id)
            && self
                .segment_type
                .as_ref()
                .map_or(true, |t| &segment.segment_type == t)
            && self.scope.map_or(true, |s| segment.scope == s)
            && self.collection.map_or(true, |c| segment.collection == c)
    }
}

/// Partial segment update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentPatch {
    /// Keys to set, or remove when `None`.
    #[serde(default)]
    pub metadata: Option<MetadataPatch>,
    /// Drop all metadata before applying `metadata`.
    #[serde(default)]
    pub reset_metadata: bool,
    /// Replacement file paths.
    #[serde(default)]
    pub file_paths: Option<BTreeMap<String, Vec<String>>>,
}

impl SegmentPatch {
    fn apply(self, segment: &mut Segment) {
        if self.reset_metadata {
            segment.metadata.clear();
        }
        if let Some(patch) = self.metadata {
            apply_metadata_patch(&mut segment.metadata, patch);
        }
        if let Some(file_paths) = self.file_paths {
            segment.file_paths = file_paths;
        }
    }
}

/// Registers, queries and retires segments.
#[derive(Debug, Clone)]
pub struct SegmentRegistry {
    store: Arc<EntityStore>,
}

impl SegmentRegistry {
    pub(crate) fn new(store: Arc<EntityStore>) -> Self {
        Self { store }
    }

    /// Registers a segment.
    ///
    /// The collection is checked in the same commit that writes the
    /// segment, so a concurrent collection delete cannot orphan it.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the segment type is empty
    /// - `NotFound` if the collection is absent or deleted
    /// - `AlreadyExists` if the supplied id is taken
    pub fn create_segment(&self, new: NewSegment) -> CoreResult<Versioned<Segment>> {
        validate_segment_type(&new.segment_type)?;
        let segment = self.store.transact(|txn| {
            txn.get::<Collection>(&new.collection.to_string())?;
            let segment = Segment {
                id: new.id.unwrap_or_default(),
                segment_type: new.segment_type,
                scope: new.scope,
                collection: new.collection,
                metadata: new.metadata,
                file_paths: BTreeMap::new(),
            };
            let version = txn.put(segment.clone(), Expected::Vacant)?;
            Ok(Versioned {
                version,
                record: segment,
            })
        })?;
        info!(segment = %segment.id, collection = %segment.collection, scope = %segment.scope, "created segment");
        Ok(segment)
    }

    /// Returns the live segments matching `filter`. No match is not an error.
    pub fn get_segments(&self, filter: &SegmentFilter) -> CoreResult<Vec<Versioned<Segment>>> {
        if let Some(id) = filter.id {
            let found = self.store.find::<Segment>(&id.to_string())?;
            return Ok(found.into_iter().filter(|s| filter.matches(s)).collect());
        }
        self.store.list::<Segment>(|s| filter.matches(s))
    }

    /// Applies `patch` to a segment. Returns the new version.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the segment is absent or deleted
    /// - `VersionConflict` if `expected` is stale; nothing is written
    pub fn update_segment(
        &self,
        id: SegmentId,
        patch: SegmentPatch,
        expected: Option<Version>,
    ) -> CoreResult<Version> {
        let version = self.store.transact(|txn| {
            let mut segment = txn.get::<Segment>(&id.to_string())?.into_inner();
            patch.apply(&mut segment);
            txn.put(segment, expected.map_or(Expected::Any, Expected::Version))
        })?;
        debug!(segment = %id, %version, "updated segment");
        Ok(version)
    }

    /// Tombstones a segment.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the segment is absent or already deleted.
    pub fn delete_segment(&self, id: SegmentId) -> CoreResult<()> {
        self.store
            .delete::<Segment>(&id.to_string(), Expected::Any)?;
        info!(segment = %id, "deleted segment");
        Ok(())
    }
}

fn validate_segment_type(segment_type: &str) -> CoreResult<()> {
    if segment_type.trim().is_empty() {
        return Err(CoreError::invalid_argument("segment type must not be empty"));
    }
    Ok(())
}

/// One metadata and one vector segment of the configured default types.
pub(crate) fn default_topology(config: &SysDbConfig) -> Vec<SegmentSpec> {
    vec![
        SegmentSpec::new(config.metadata_segment_type.clone(), SegmentScope::Metadata),
        SegmentSpec::new(config.vector_segment_type.clone(), SegmentScope::Vector),
    ]
}

/// Checks that `specs` cover each required scope exactly once.
pub(crate) fn validate_topology(specs: &[SegmentSpec]) -> CoreResult<()> {
    for spec in specs {
        validate_segment_type(&spec.segment_type)?;
    }
    for scope in [SegmentScope::Metadata, SegmentScope::Vector, SegmentScope::Record] {
        let count = specs.iter().filter(|s| s.scope == scope).count();
        if count > 1 {
            return Err(CoreError::invalid_argument(format!(
                "collection may have at most one {scope} segment"
            )));
        }
        if count == 0 && REQUIRED_SCOPES.contains(&scope) {
            return Err(CoreError::invalid_argument(format!(
                "collection requires a {scope} segment"
            )));
        }
    }
    Ok(())
}

/// Stages a segment per spec for `collection`.
pub(crate) fn stage_topology(
    txn: &mut StoreTxn<'_>,
    collection: CollectionId,
    specs: Vec<SegmentSpec>,
) -> CoreResult<Vec<Versioned<Segment>>> {
    specs
        .into_iter()
        .map(|spec| {
            let segment = Segment {
                id: SegmentId::new(),
                segment_type: spec.segment_type,
                scope: spec.scope,
                collection,
                metadata: spec.metadata,
                file_paths: BTreeMap::new(),
            };
            let version = txn.put(segment.clone(), Expected::Vacant)?;
            Ok(Versioned {
                version,
                record: segment,
            })
        })
        .collect()
}

/// Stages tombstones for every live segment of `collection`.
pub(crate) fn stage_cascade(txn: &mut StoreTxn<'_>, collection: CollectionId) -> CoreResult<usize> {
    let segments = txn.list::<Segment>(|s| s.collection == collection)?;
    for segment in &segments {
        txn.delete::<Segment>(&segment.id.to_string(), Expected::Any)?;
    }
    Ok(segments.len())
}

/// Returns the live segments of `collection` as seen by `txn`.
pub(crate) fn segments_of(
    txn: &StoreTxn<'_>,
    collection: CollectionId,
) -> CoreResult<Vec<Versioned<Segment>>> {
    txn.list::<Segment>(|s| s.collection == collection)
}
