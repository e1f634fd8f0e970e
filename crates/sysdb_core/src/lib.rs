//! # SysDB Core
//!
//! Entity registry and compaction watermark logic for the SysDB metadata
//! coordinator.
//!
//! This crate provides:
//! - A versioned, tombstoning entity store with compare-and-swap writes
//! - Tenant and database management with name uniqueness
//! - Collection lifecycle and the segment registry
//! - Monotonic per-tenant compaction watermarks
//!
//! ## Consistency
//!
//! Every record carries a version. Writers state what they expect to find
//! and lose with `AlreadyExists`, `NotFound` or `VersionConflict` when the
//! stored record disagrees. Changes that touch several records (creating a
//! collection with its segments, cascading deletes) commit as one batch.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod capability;
mod clock;
mod collections;
mod config;
mod error;
mod model;
mod namespace;
mod retry;
mod segments;
mod store;
mod sysdb;
mod types;
mod watermark;

pub use capability::AdminCapability;
pub use clock::{Clock, ManualClock, SystemClock};
pub use collections::{
    CollectionFilter, CollectionManager, CollectionPatch, CreatedCollection, NewCollection,
};
pub use config::{
    RetryPolicy, SysDbConfig, DEFAULT_METADATA_SEGMENT_TYPE, DEFAULT_VECTOR_SEGMENT_TYPE,
};
pub use error::{CoreError, CoreResult, ErrorCode};
pub use model::{
    apply_metadata_patch, validate_collection_metadata, Collection, Database, DistanceFunction,
    Metadata, MetadataPatch, MetadataValue, Segment, SegmentScope, Tenant, HNSW_SPACE_KEY,
};
pub use namespace::NamespaceManager;
pub use segments::{
    NewSegment, SegmentFilter, SegmentPatch, SegmentRegistry, SegmentSpec, REQUIRED_SCOPES,
};
pub use store::{Entity, EntityStore, Expected, StoreStats, StoreTxn, Versioned};
pub use sysdb::SysDb;
pub use types::{
    validate_name, CollectionId, DatabaseId, SegmentId, TenantId, Version, DEFAULT_DATABASE,
    DEFAULT_TENANT, MAX_NAME_LEN,
};
pub use watermark::{TenantWatermark, WatermarkTracker};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
