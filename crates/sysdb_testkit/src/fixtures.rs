//! Test fixtures and coordinator helpers.
//!
//! Provides convenience functions for setting up test coordinators
//! and common namespace layouts.

use std::path::{Path, PathBuf};
use sysdb_core::{SysDb, SysDbConfig, TenantId};
use tempfile::TempDir;

/// A test coordinator with automatic cleanup.
pub struct TestSysDb {
    /// The coordinator instance.
    pub db: SysDb,
    /// The temporary directory (kept alive to prevent cleanup).
    temp_dir: Option<TempDir>,
}

impl TestSysDb {
    /// Creates a new in-memory test coordinator.
    pub fn memory() -> Self {
        Self::memory_with(SysDbConfig::default())
    }

    /// Creates a new in-memory test coordinator with `config`.
    pub fn memory_with(config: SysDbConfig) -> Self {
        Self {
            db: SysDb::open_in_memory(config).expect("Failed to open in-memory coordinator"),
            temp_dir: None,
        }
    }

    /// Creates a new file-based test coordinator.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = SysDb::open_path(temp_dir.path(), SysDbConfig::default())
            .expect("Failed to open file coordinator");
        Self {
            db,
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the data directory if file-based, None if in-memory.
    pub fn path(&self) -> Option<PathBuf> {
        self.temp_dir.as_ref().map(|d| d.path().to_path_buf())
    }
}

impl std::ops::Deref for TestSysDb {
    type Target = SysDb;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs a test with a temporary in-memory coordinator.
///
/// # Example
///
/// ```rust
/// use sysdb_testkit::{tenant, with_temp_sysdb};
///
/// with_temp_sysdb(|db| {
///     db.namespace().create_tenant(&tenant("t1"), None).unwrap();
/// });
/// ```
pub fn with_temp_sysdb<F, R>(f: F) -> R
where
    F: FnOnce(&SysDb) -> R,
{
    let test_db = TestSysDb::memory();
    f(&test_db.db)
}

/// Runs a test with a temporary file-based coordinator.
pub fn with_file_sysdb<F, R>(f: F) -> R
where
    F: FnOnce(&SysDb, &Path) -> R,
{
    let test_db = TestSysDb::file();
    let path = test_db.path().expect("File coordinator should have a path");
    f(&test_db.db, &path)
}

/// Parses a tenant id, panicking on invalid input.
pub fn tenant(id: &str) -> TenantId {
    TenantId::new(id).expect("Invalid tenant id")
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates `tenants` tenants named `tenant_<i>`, each holding one
    /// database named `db`.
    pub fn populated(tenants: usize) -> (TestSysDb, Vec<TenantId>) {
        let test_db = TestSysDb::memory();
        let mut ids = Vec::with_capacity(tenants);

        for i in 0..tenants {
            let id = tenant(&format!("tenant_{i}"));
            test_db
                .namespace()
                .create_tenant(&id, None)
                .expect("Failed to create tenant");
            test_db
                .namespace()
                .create_database(&id, "db", None)
                .expect("Failed to create database");
            ids.push(id);
        }

        (test_db, ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sysdb() {
        let test_db = TestSysDb::memory();
        assert!(test_db.path().is_none());
        assert!(test_db.namespace().list_tenants().unwrap().is_empty());
    }

    #[test]
    fn test_file_sysdb_survives_reopen() {
        let test_db = TestSysDb::file();
        let path = test_db.path().unwrap();
        test_db.namespace().create_tenant(&tenant("t1"), None).unwrap();
        let TestSysDb { db, temp_dir } = test_db;
        drop(db);

        let reopened = SysDb::open_path(&path, SysDbConfig::default()).unwrap();
        assert!(reopened.namespace().get_tenant(&tenant("t1")).is_ok());
        drop(temp_dir);
    }

    #[test]
    fn test_populated_scenario() {
        let (db, tenants) = scenarios::populated(3);
        assert_eq!(tenants.len(), 3);
        for id in &tenants {
            assert_eq!(db.namespace().list_databases(id).unwrap().len(), 1);
        }
    }
}
