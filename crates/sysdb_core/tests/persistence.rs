//! Coordinator state kept in a data directory.

use sysdb_core::{
    CollectionFilter, ErrorCode, NewCollection, SegmentFilter, SysDb, SysDbConfig, TenantId,
};
use tempfile::TempDir;

#[test]
fn state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let t1 = TenantId::new("t1").unwrap();

    let collection_id = {
        let db = SysDb::open_path(dir.path(), SysDbConfig::default()).unwrap();
        db.namespace().create_tenant(&t1, Some("Tenant One")).unwrap();
        db.namespace().create_database(&t1, "prod", None).unwrap();
        let created = db
            .collections()
            .create_collection(NewCollection::new(t1.clone(), "prod", "docs").with_dimension(3))
            .unwrap();
        db.watermarks().set_last_compaction_time(&t1, 42).unwrap();
        created.collection.id
    };

    let db = SysDb::open_path(dir.path(), SysDbConfig::default()).unwrap();
    assert_eq!(db.namespace().get_tenant(&t1).unwrap().name, "Tenant One");
    assert_eq!(db.watermarks().get_last_compaction_time(&t1).unwrap(), 42);

    let collections = db
        .collections()
        .get_collections(&CollectionFilter::new().id(collection_id))
        .unwrap();
    assert_eq!(collections.len(), 1);
    assert_eq!(collections[0].dimension, Some(3));
    assert_eq!(
        db.segments()
            .get_segments(&SegmentFilter::new().collection(collection_id))
            .unwrap()
            .len(),
        2
    );

    // Name uniqueness is durable too.
    let err = db.namespace().create_database(&t1, "prod", None).unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyExists);
}

#[test]
fn second_open_of_same_directory_fails() {
    let dir = TempDir::new().unwrap();
    let _first = SysDb::open_path(dir.path(), SysDbConfig::default()).unwrap();
    let err = SysDb::open_path(dir.path(), SysDbConfig::default()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Internal);
}

#[test]
fn bootstrap_on_reopen_is_harmless() {
    let dir = TempDir::new().unwrap();
    let config = || SysDbConfig::new().bootstrap_defaults(true);
    drop(SysDb::open_path(dir.path(), config()).unwrap());
    let db = SysDb::open_path(dir.path(), config()).unwrap();
    assert_eq!(db.namespace().list_tenants().unwrap().len(), 1);
}
