//! Purge command implementation.

use super::CliError;
use std::path::Path;
use std::time::Duration;
use sysdb_core::{SysDb, SysDbConfig};

/// Runs the purge command.
pub fn run(path: &Path, retention_secs: u64) -> Result<(), CliError> {
    let removed = purge(path, Duration::from_secs(retention_secs))?;
    println!("Purged {removed} tombstones older than {retention_secs}s from {}", path.display());
    Ok(())
}

fn purge(path: &Path, retention: Duration) -> Result<usize, CliError> {
    let config = SysDbConfig::new().tombstone_retention(retention);
    let db = SysDb::open_path(path, config)?;
    let before = db.stats()?;
    let removed = db.purge_tombstones()?;
    tracing::info!(removed, tombstones = before.tombstones, "purge finished");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sysdb_core::{NewCollection, TenantId};

    #[test]
    fn purges_deleted_collection() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = SysDb::open_path(dir.path(), SysDbConfig::default()).unwrap();
            let t1 = TenantId::new("t1").unwrap();
            db.namespace().create_tenant(&t1, None).unwrap();
            db.namespace().create_database(&t1, "prod", None).unwrap();
            let created = db
                .collections()
                .create_collection(NewCollection::new(t1, "prod", "docs"))
                .unwrap();
            db.collections()
                .delete_collection(created.collection.id)
                .unwrap();
        }

        let removed = purge(dir.path(), Duration::ZERO).unwrap();
        assert!(removed >= 3, "collection, claim and segments, got {removed}");
        assert_eq!(purge(dir.path(), Duration::ZERO).unwrap(), 0);

        let db = SysDb::open_path(dir.path(), SysDbConfig::default()).unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.tombstones, 0);
        assert!(stats.retired >= 3);
    }
}
