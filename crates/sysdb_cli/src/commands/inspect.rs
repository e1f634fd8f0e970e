//! Inspect command implementation.

use super::CliError;
use serde::Serialize;
use std::path::Path;
use sysdb_core::{CollectionFilter, StoreStats, SysDb, SysDbConfig};

/// Coordinator inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Data directory.
    pub path: String,
    /// Store counters.
    pub stats: StoreStats,
    /// Every live tenant.
    pub tenants: Vec<TenantSummary>,
}

/// One tenant and what it owns.
#[derive(Debug, Serialize)]
pub struct TenantSummary {
    /// Tenant id.
    pub id: String,
    /// Compaction watermark.
    pub last_compaction_time: i64,
    /// Its databases.
    pub databases: Vec<DatabaseSummary>,
}

/// One database and its collections.
#[derive(Debug, Serialize)]
pub struct DatabaseSummary {
    /// Database name.
    pub name: String,
    /// Database id.
    pub id: String,
    /// Its collections.
    pub collections: Vec<CollectionSummary>,
}

/// One collection.
#[derive(Debug, Serialize)]
pub struct CollectionSummary {
    /// Collection name.
    pub name: String,
    /// Collection id.
    pub id: String,
    /// Embedding dimension.
    pub dimension: Option<u32>,
    /// Write counter.
    pub log_position: i64,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), CliError> {
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no coordinator data at {}", path.display()),
        )
        .into());
    }
    let db = SysDb::open_path(path, SysDbConfig::default())?;
    let result = inspect(&db, path)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

/// Collects the namespace tree of `db`.
pub fn inspect(db: &SysDb, path: &Path) -> Result<InspectResult, CliError> {
    let mut tenants = Vec::new();
    for tenant in db.namespace().list_tenants()? {
        let mut databases = Vec::new();
        for database in db.namespace().list_databases(&tenant.id)? {
            let filter = CollectionFilter::new().database(tenant.id.clone(), database.name.clone());
            let collections = db
                .collections()
                .get_collections(&filter)?
                .into_iter()
                .map(|c| CollectionSummary {
                    name: c.name.clone(),
                    id: c.id.to_string(),
                    dimension: c.dimension,
                    log_position: c.log_position,
                })
                .collect();
            databases.push(DatabaseSummary {
                name: database.name.clone(),
                id: database.id.to_string(),
                collections,
            });
        }
        tenants.push(TenantSummary {
            id: tenant.id.to_string(),
            last_compaction_time: tenant.last_compaction_time,
            databases,
        });
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        stats: db.stats()?,
        tenants,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("SysDB Coordinator Inspection");
    println!("============================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Records:");
    println!("  Live records: {}", result.stats.live_records);
    println!("  Tombstones:   {}", result.stats.tombstones);
    println!("  Retired ids:  {}", result.stats.retired);

    println!();
    println!("Tenants:");
    for tenant in &result.tenants {
        println!(
            "  {} (last compaction {})",
            tenant.id, tenant.last_compaction_time
        );
        for database in &tenant.databases {
            println!("    {} [{}]", database.name, database.id);
            for col in &database.collections {
                let dimension = col
                    .dimension
                    .map_or_else(|| "-".to_string(), |d| d.to_string());
                println!(
                    "      {} [{}] dim={} log_position={}",
                    col.name, col.id, dimension, col.log_position
                );
            }
        }
    }
}
