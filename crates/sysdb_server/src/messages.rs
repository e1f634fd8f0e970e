//! Request and response messages for the coordinator API.
//!
//! Every RPC has a request and a response type. Field names follow the
//! coordinator's JSON wire format; optional fields may be omitted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use sysdb_core::{
    Collection, CollectionFilter, CollectionId, CollectionPatch, Database, DatabaseId,
    NewCollection, NewSegment, Segment, SegmentFilter, SegmentId, SegmentPatch, Tenant,
    TenantId, TenantWatermark, Version, Versioned,
};

/// Coordinator RPC names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    /// Create a database.
    CreateDatabase,
    /// Resolve a database by name.
    GetDatabase,
    /// Create a tenant.
    CreateTenant,
    /// Read a tenant.
    GetTenant,
    /// Register a segment.
    CreateSegment,
    /// Tombstone a segment.
    DeleteSegment,
    /// Query segments.
    GetSegments,
    /// Patch a segment.
    UpdateSegment,
    /// Create a collection with its segments.
    CreateCollection,
    /// Delete a collection and its segments.
    DeleteCollection,
    /// Query collections.
    GetCollections,
    /// Patch a collection.
    UpdateCollection,
    /// Drop all coordinator state.
    ResetState,
    /// Read compaction watermarks.
    GetLastCompactionTimeForTenant,
    /// Advance a compaction watermark.
    SetLastCompactionTimeForTenant,
}

impl Method {
    /// Every method, in wire order.
    pub const ALL: [Method; 15] = [
        Method::CreateDatabase,
        Method::GetDatabase,
        Method::CreateTenant,
        Method::GetTenant,
        Method::CreateSegment,
        Method::DeleteSegment,
        Method::GetSegments,
        Method::UpdateSegment,
        Method::CreateCollection,
        Method::DeleteCollection,
        Method::GetCollections,
        Method::UpdateCollection,
        Method::ResetState,
        Method::GetLastCompactionTimeForTenant,
        Method::SetLastCompactionTimeForTenant,
    ];

    /// Returns the wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateDatabase => "CreateDatabase",
            Self::GetDatabase => "GetDatabase",
            Self::CreateTenant => "CreateTenant",
            Self::GetTenant => "GetTenant",
            Self::CreateSegment => "CreateSegment",
            Self::DeleteSegment => "DeleteSegment",
            Self::GetSegments => "GetSegments",
            Self::UpdateSegment => "UpdateSegment",
            Self::CreateCollection => "CreateCollection",
            Self::DeleteCollection => "DeleteCollection",
            Self::GetCollections => "GetCollections",
            Self::UpdateCollection => "UpdateCollection",
            Self::ResetState => "ResetState",
            Self::GetLastCompactionTimeForTenant => "GetLastCompactionTimeForTenant",
            Self::SetLastCompactionTimeForTenant => "SetLastCompactionTimeForTenant",
        }
    }

    /// Returns true if the method needs an admin capability.
    pub fn requires_admin(self) -> bool {
        matches!(self, Self::ResetState)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Empty message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// `CreateDatabase` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDatabaseRequest {
    /// Caller-chosen id.
    #[serde(default)]
    pub id: Option<DatabaseId>,
    /// Database name.
    pub name: String,
    /// Owning tenant.
    pub tenant: TenantId,
}

/// `CreateDatabase` and `GetDatabase` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseResponse {
    /// The database.
    pub database: Versioned<Database>,
}

/// `GetDatabase` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetDatabaseRequest {
    /// Database name.
    pub name: String,
    /// Owning tenant.
    pub tenant: TenantId,
}

/// `CreateTenant` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTenantRequest {
    /// Tenant id.
    pub id: TenantId,
    /// Display name; defaults to the id.
    #[serde(default)]
    pub name: Option<String>,
}

/// `GetTenant` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetTenantRequest {
    /// Tenant id.
    pub id: TenantId,
}

/// `CreateTenant` and `GetTenant` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantResponse {
    /// The tenant.
    pub tenant: Versioned<Tenant>,
}

/// `CreateSegment` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSegmentRequest {
    /// The segment to register.
    #[serde(flatten)]
    pub segment: NewSegment,
}

/// `CreateSegment` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentResponse {
    /// The segment.
    pub segment: Versioned<Segment>,
}

/// `DeleteSegment` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSegmentRequest {
    /// Segment id.
    pub id: SegmentId,
}

/// `GetSegments` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetSegmentsRequest {
    /// Filter; empty matches every segment.
    #[serde(flatten)]
    pub filter: SegmentFilter,
}

/// `GetSegments` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetSegmentsResponse {
    /// Matching segments.
    pub segments: Vec<Versioned<Segment>>,
}

/// `UpdateSegment` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSegmentRequest {
    /// Segment id.
    pub id: SegmentId,
    /// Version the caller read; unguarded when absent.
    #[serde(default)]
    pub version: Option<Version>,
    /// Changes to apply.
    #[serde(flatten)]
    pub patch: SegmentPatch,
}

/// `UpdateSegment` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSegmentResponse {
    /// New version.
    pub version: Version,
}

/// `CreateCollection` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCollectionRequest {
    /// The collection to create.
    #[serde(flatten)]
    pub collection: NewCollection,
}

/// `CreateCollection` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCollectionResponse {
    /// The collection.
    pub collection: Versioned<Collection>,
    /// Its segments.
    pub segments: Vec<Versioned<Segment>>,
    /// False when an existing collection was returned.
    pub created: bool,
}

/// `DeleteCollection` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteCollectionRequest {
    /// Collection id.
    pub id: CollectionId,
}

/// `GetCollections` request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetCollectionsRequest {
    /// Filter and paging.
    #[serde(flatten)]
    pub filter: CollectionFilter,
}

/// `GetCollections` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetCollectionsResponse {
    /// Matching collections, ordered by name.
    pub collections: Vec<Versioned<Collection>>,
}

/// `UpdateCollection` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateCollectionRequest {
    /// Collection id.
    pub id: CollectionId,
    /// Version the caller read; unguarded when absent.
    #[serde(default)]
    pub version: Option<Version>,
    /// Changes to apply.
    #[serde(flatten)]
    pub patch: CollectionPatch,
}

/// `UpdateCollection` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateCollectionResponse {
    /// The stored collection.
    pub collection: Versioned<Collection>,
}

/// `GetLastCompactionTimeForTenant` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLastCompactionTimeRequest {
    /// Tenants to read.
    pub tenant_ids: Vec<TenantId>,
}

/// `GetLastCompactionTimeForTenant` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetLastCompactionTimeResponse {
    /// Watermarks of the known tenants.
    pub tenant_last_compaction_time: Vec<TenantWatermark>,
}

/// `SetLastCompactionTimeForTenant` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetLastCompactionTimeRequest {
    /// Tenant id.
    pub tenant_id: TenantId,
    /// New watermark.
    pub last_compaction_time: i64,
}
