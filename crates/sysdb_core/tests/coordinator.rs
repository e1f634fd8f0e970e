//! End-to-end coordinator behaviour over the public API.

use std::sync::Arc;
use sysdb_core::{
    AdminCapability, CollectionFilter, ErrorCode, NewCollection, SegmentFilter, SegmentPatch,
    SegmentScope, SysDb, SysDbConfig, TenantId,
};

fn tenant(id: &str) -> TenantId {
    TenantId::new(id).unwrap()
}

#[test]
fn concrete_scenario() {
    let db = SysDb::open_in_memory(SysDbConfig::default()).unwrap();
    let t1 = tenant("t1");

    db.namespace().create_tenant(&t1, None).unwrap();
    db.namespace().create_database(&t1, "prod", None).unwrap();
    let err = db
        .namespace()
        .create_database(&t1, "prod", None)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyExists);
    db.namespace().create_database(&t1, "staging", None).unwrap();

    let created = db
        .collections()
        .create_collection(NewCollection::new(t1.clone(), "prod", "docs").with_dimension(768))
        .unwrap();
    assert_eq!(created.segments.len(), 2);
    assert!(created
        .segments
        .iter()
        .any(|s| s.scope == SegmentScope::Metadata));
    assert!(created
        .segments
        .iter()
        .any(|s| s.scope == SegmentScope::Vector));

    let wm = db.watermarks();
    wm.set_last_compaction_time(&t1, 100).unwrap();
    assert_eq!(
        wm.set_last_compaction_time(&t1, 50).unwrap_err().code(),
        ErrorCode::InvalidArgument
    );
    wm.set_last_compaction_time(&t1, 150).unwrap();
    assert_eq!(wm.get_last_compaction_time(&t1).unwrap(), 150);
}

#[test]
fn same_database_name_in_different_tenants() {
    let db = SysDb::open_in_memory(SysDbConfig::default()).unwrap();
    for id in ["a", "b"] {
        db.namespace().create_tenant(&tenant(id), None).unwrap();
        db.namespace()
            .create_database(&tenant(id), "shared", None)
            .unwrap();
    }
    let a = db.namespace().get_database(&tenant("a"), "shared").unwrap();
    let b = db.namespace().get_database(&tenant("b"), "shared").unwrap();
    assert_ne!(a.id, b.id);
}

#[test]
fn deleted_collection_leaves_no_segments() {
    let db = SysDb::open_in_memory(SysDbConfig::default()).unwrap();
    let t1 = tenant("t1");
    db.namespace().create_tenant(&t1, None).unwrap();
    db.namespace().create_database(&t1, "prod", None).unwrap();
    let created = db
        .collections()
        .create_collection(NewCollection::new(t1.clone(), "prod", "docs"))
        .unwrap();
    let id = created.collection.id;

    db.collections().delete_collection(id).unwrap();

    let listed = db
        .collections()
        .get_collections(&CollectionFilter::new().database(t1, "prod"))
        .unwrap();
    assert!(listed.iter().all(|c| c.id != id));
    let segments = db
        .segments()
        .get_segments(&SegmentFilter::new().collection(id))
        .unwrap();
    assert!(segments.is_empty());
}

#[test]
fn stale_segment_update_then_fresh_retry() {
    let db = SysDb::open_in_memory(SysDbConfig::default()).unwrap();
    let t1 = tenant("t1");
    db.namespace().create_tenant(&t1, None).unwrap();
    db.namespace().create_database(&t1, "prod", None).unwrap();
    let created = db
        .collections()
        .create_collection(NewCollection::new(t1, "prod", "docs"))
        .unwrap();
    let segment = created.segments[0].clone();

    let mut paths = std::collections::BTreeMap::new();
    paths.insert("data".to_string(), vec!["a.bin".to_string()]);
    let patch = SegmentPatch {
        file_paths: Some(paths),
        ..SegmentPatch::default()
    };

    db.segments()
        .update_segment(segment.id, SegmentPatch::default(), Some(segment.version))
        .unwrap();
    let err = db
        .segments()
        .update_segment(segment.id, patch.clone(), Some(segment.version))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::VersionConflict);

    let fresh = db
        .segments()
        .get_segments(&SegmentFilter::new().id(segment.id))
        .unwrap()
        .remove(0);
    assert!(fresh.file_paths.is_empty());
    db.segments()
        .update_segment(segment.id, patch, Some(fresh.version))
        .unwrap();
}

#[test]
fn reset_then_reads_are_empty() {
    let db = SysDb::open_in_memory(SysDbConfig::new().allow_reset(true)).unwrap();
    let t1 = tenant("t1");
    db.namespace().create_tenant(&t1, None).unwrap();
    db.namespace().create_database(&t1, "prod", None).unwrap();
    db.collections()
        .create_collection(NewCollection::new(t1.clone(), "prod", "docs"))
        .unwrap();

    db.reset_state(Some(&AdminCapability::grant("test")))
        .unwrap();

    assert_eq!(
        db.namespace().get_tenant(&t1).unwrap_err().code(),
        ErrorCode::NotFound
    );
    assert!(db.namespace().list_tenants().unwrap().is_empty());
    assert!(db
        .segments()
        .get_segments(&SegmentFilter::new())
        .unwrap()
        .is_empty());
    assert!(db
        .collections()
        .get_collections(&CollectionFilter::new())
        .unwrap()
        .is_empty());
}

#[test]
fn admin_database_delete_cascades() {
    let db = SysDb::open_in_memory(SysDbConfig::default()).unwrap();
    let t1 = tenant("t1");
    db.namespace().create_tenant(&t1, None).unwrap();
    db.namespace().create_database(&t1, "prod", None).unwrap();
    db.namespace().create_database(&t1, "staging", None).unwrap();
    for name in ["a", "b"] {
        db.collections()
            .create_collection(NewCollection::new(t1.clone(), "prod", name))
            .unwrap();
    }
    let kept = db
        .collections()
        .create_collection(NewCollection::new(t1.clone(), "staging", "a"))
        .unwrap();

    db.namespace()
        .delete_database(Some(&AdminCapability::grant("test")), &t1, "prod")
        .unwrap();

    let remaining = db
        .collections()
        .get_collections(&CollectionFilter::new())
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, kept.collection.id);
    let segments = db.segments().get_segments(&SegmentFilter::new()).unwrap();
    assert_eq!(segments.len(), 2);
    assert!(segments.iter().all(|s| s.collection == kept.collection.id));
}

#[test]
fn concurrent_tenant_creation_has_one_winner() {
    let db = Arc::new(SysDb::open_in_memory(SysDbConfig::default()).unwrap());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let db = db.clone();
            std::thread::spawn(move || db.namespace().create_tenant(&tenant("race"), None))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.code() == ErrorCode::AlreadyExists));
}

#[test]
fn concurrent_collection_create_and_segment_create() {
    let db = Arc::new(SysDb::open_in_memory(SysDbConfig::default()).unwrap());
    let t1 = tenant("t1");
    db.namespace().create_tenant(&t1, None).unwrap();
    db.namespace().create_database(&t1, "prod", None).unwrap();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let db = db.clone();
            let t1 = t1.clone();
            std::thread::spawn(move || {
                db.collections()
                    .create_collection(NewCollection::new(t1, "prod", "docs"))
            })
        })
        .collect();
    let ok = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(Result::is_ok)
        .count();
    assert_eq!(ok, 1);
    assert_eq!(
        db.segments().get_segments(&SegmentFilter::new()).unwrap().len(),
        2
    );
}
