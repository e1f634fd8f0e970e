//! Entity records held by the coordinator.

use crate::error::{CoreError, CoreResult};
use crate::store::Entity;
use crate::types::{CollectionId, DatabaseId, SegmentId, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Metadata key selecting a collection's distance function.
pub const HNSW_SPACE_KEY: &str = "hnsw:space";

/// A single metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    /// UTF-8 string.
    Str(String),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Boolean flag.
    Bool(bool),
}

impl MetadataValue {
    /// Returns the string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Opaque key-value configuration attached to collections and segments.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Partial metadata update. A `None` value removes the key.
pub type MetadataPatch = BTreeMap<String, Option<MetadataValue>>;

/// Applies `patch` to `metadata` in place.
pub fn apply_metadata_patch(metadata: &mut Metadata, patch: MetadataPatch) {
    for (key, value) in patch {
        match value {
            Some(value) => {
                metadata.insert(key, value);
            }
            None => {
                metadata.remove(&key);
            }
        }
    }
}

/// Distance function used by a collection's vector index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceFunction {
    /// Euclidean (l2) distance.
    Euclidean,
    /// One minus cosine similarity.
    Cosine,
    /// One minus inner product.
    InnerProduct,
}

impl DistanceFunction {
    /// Returns the metadata spelling of the function.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Euclidean => "l2",
            Self::Cosine => "cosine",
            Self::InnerProduct => "ip",
        }
    }
}

impl TryFrom<&str> for DistanceFunction {
    type Error = CoreError;

    fn try_from(value: &str) -> CoreResult<Self> {
        match value {
            "l2" => Ok(Self::Euclidean),
            "cosine" => Ok(Self::Cosine),
            "ip" => Ok(Self::InnerProduct),
            other => Err(CoreError::invalid_argument(format!(
                "invalid distance function {other:?}, expected one of l2, cosine, ip"
            ))),
        }
    }
}

impl fmt::Display for DistanceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validates the keys of collection metadata that the coordinator understands.
pub fn validate_collection_metadata(metadata: &Metadata) -> CoreResult<()> {
    if let Some(space) = metadata.get(HNSW_SPACE_KEY) {
        let space = space.as_str().ok_or_else(|| {
            CoreError::invalid_argument(format!("{HNSW_SPACE_KEY} must be a string"))
        })?;
        DistanceFunction::try_from(space)?;
    }
    Ok(())
}

/// Top-level ownership boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    /// Tenant id.
    pub id: TenantId,
    /// Display name.
    pub name: String,
    /// Logical time up to which the tenant's data is durably compacted.
    pub last_compaction_time: i64,
    /// Creation time in unix milliseconds.
    pub created_at_ms: u64,
}

/// Named container of collections, scoped to one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    /// Database id.
    pub id: DatabaseId,
    /// Name, unique among live databases of the tenant.
    pub name: String,
    /// Owning tenant.
    pub tenant: TenantId,
}

/// Named, versioned grouping of vectors scoped to one database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    /// Collection id.
    pub id: CollectionId,
    /// Name, unique among live collections of the database.
    pub name: String,
    /// Owning tenant.
    pub tenant: TenantId,
    /// Owning database's name.
    pub database: String,
    /// Owning database's id.
    pub database_id: DatabaseId,
    /// Vector dimensionality, once known.
    pub dimension: Option<u32>,
    /// Opaque configuration.
    pub metadata: Metadata,
    /// Advances on every mutation after creation.
    pub log_position: i64,
}

impl Collection {
    /// Returns the distance function configured in metadata, if any.
    pub fn distance_function(&self) -> Option<DistanceFunction> {
        self.metadata
            .get(HNSW_SPACE_KEY)
            .and_then(MetadataValue::as_str)
            .and_then(|s| DistanceFunction::try_from(s).ok())
    }
}

/// Part of a collection's storage a segment implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SegmentScope {
    /// Vector index.
    Vector,
    /// Metadata index.
    Metadata,
    /// Raw record store.
    Record,
}

impl SegmentScope {
    /// Returns the wire spelling of the scope.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vector => "VECTOR",
            Self::Metadata => "METADATA",
            Self::Record => "RECORD",
        }
    }
}

impl fmt::Display for SegmentScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical storage unit belonging to one collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Segment id.
    pub id: SegmentId,
    /// Implementation type URN.
    pub segment_type: String,
    /// Scope within the collection.
    pub scope: SegmentScope,
    /// Owning collection.
    pub collection: CollectionId,
    /// Opaque configuration.
    pub metadata: Metadata,
    /// Materialized files, grouped by purpose. Empty until written.
    #[serde(default)]
    pub file_paths: BTreeMap<String, Vec<String>>,
}

/// Reservation of a name within its scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct NameClaim {
    pub scope: String,
    pub name: String,
    pub owner: Uuid,
}

impl NameClaim {
    pub(crate) fn database_scope(tenant: &TenantId) -> String {
        format!("database/{tenant}")
    }

    pub(crate) fn collection_scope(database: DatabaseId) -> String {
        format!("collection/{database}")
    }

    pub(crate) fn claim_id(scope: &str, name: &str) -> String {
        format!("{scope}/{name}")
    }

    pub(crate) fn for_database(db: &Database) -> Self {
        Self {
            scope: Self::database_scope(&db.tenant),
            name: db.name.clone(),
            owner: *db.id.as_uuid(),
        }
    }

    pub(crate) fn for_collection(collection: &Collection) -> Self {
        Self {
            scope: Self::collection_scope(collection.database_id),
            name: collection.name.clone(),
            owner: *collection.id.as_uuid(),
        }
    }
}

impl Entity for Tenant {
    const KIND: &'static str = "tenant";

    fn key_id(&self) -> String {
        self.id.to_string()
    }
}

impl Entity for Database {
    const KIND: &'static str = "database";

    fn key_id(&self) -> String {
        self.id.to_string()
    }
}

impl Entity for Collection {
    const KIND: &'static str = "collection";

    fn key_id(&self) -> String {
        self.id.to_string()
    }

    fn on_commit(&mut self) {
        self.log_position += 1;
    }
}

impl Entity for Segment {
    const KIND: &'static str = "segment";

    fn key_id(&self) -> String {
        self.id.to_string()
    }
}

impl Entity for NameClaim {
    const KIND: &'static str = "name_claim";
    const REUSABLE_ID: bool = true;

    fn key_id(&self) -> String {
        Self::claim_id(&self.scope, &self.name)
    }
}
