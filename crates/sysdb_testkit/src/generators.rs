//! Property-based test generators using proptest.
//!
//! Provides strategies for generating names, ids and metadata that pass
//! coordinator validation, plus operation sequences for model checking.

use proptest::prelude::*;
use sysdb_core::{Metadata, MetadataValue, TenantId};

/// Strategy for generating valid tenant, database and collection names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_.-]{0,14}[a-z0-9]").expect("Invalid regex")
}

/// Strategy for generating strings that fail name validation.
pub fn invalid_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[a-z]{1,8} [a-z]{1,8}",
        "[_.-][a-z0-9]{1,8}",
        "[a-z0-9]{1,8}[_.-]",
        "[a-z]{64,80}",
    ]
}

/// Strategy for generating valid tenant ids.
pub fn tenant_id_strategy() -> impl Strategy<Value = TenantId> {
    name_strategy().prop_map(|name| TenantId::new(name).expect("Generated invalid tenant id"))
}

/// Strategy for generating a single metadata value.
pub fn metadata_value_strategy() -> impl Strategy<Value = MetadataValue> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,16}".prop_map(MetadataValue::Str),
        any::<i64>().prop_map(MetadataValue::Int),
        (-1.0e6f64..1.0e6).prop_map(MetadataValue::Float),
        any::<bool>().prop_map(MetadataValue::Bool),
    ]
}

/// Strategy for generating metadata maps.
///
/// Keys never collide with `hnsw:space`, so the result is always valid
/// collection metadata.
pub fn metadata_strategy() -> impl Strategy<Value = Metadata> {
    prop::collection::btree_map("[a-z]{1,8}", metadata_value_strategy(), 0..6)
}

/// Strategy for generating watermark proposals.
pub fn watermark_sequence_strategy(len: usize) -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..10_000, 1..=len)
}

/// A namespace operation for model-based testing.
#[derive(Debug, Clone)]
pub enum NamespaceOp {
    /// Create a tenant
    CreateTenant(String),
    /// Create a database
    CreateDatabase {
        /// Owning tenant
        tenant: String,
        /// Database name
        name: String,
    },
    /// Advance a watermark
    SetWatermark {
        /// Tenant
        tenant: String,
        /// Proposed time
        time: i64,
    },
}

/// Strategy for generating namespace operations over a small name pool,
/// so collisions happen often.
pub fn namespace_op_strategy() -> impl Strategy<Value = NamespaceOp> {
    let pool = || prop::sample::select(vec!["a", "b", "c"]).prop_map(str::to_string);
    prop_oneof![
        pool().prop_map(NamespaceOp::CreateTenant),
        (pool(), pool()).prop_map(|(tenant, name)| NamespaceOp::CreateDatabase { tenant, name }),
        (pool(), 0i64..100).prop_map(|(tenant, time)| NamespaceOp::SetWatermark { tenant, time }),
    ]
}

/// Strategy for generating sequences of namespace operations.
pub fn namespace_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<NamespaceOp>> {
    prop::collection::vec(namespace_op_strategy(), 1..=max_len)
}
