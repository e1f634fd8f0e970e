//! Tenants and databases.

use crate::capability::AdminCapability;
use crate::collections::stage_delete;
use crate::config::SysDbConfig;
use crate::error::{CoreError, CoreResult};
use crate::model::{Collection, Database, NameClaim, Tenant};
use crate::store::{EntityStore, Expected, StoreTxn, Versioned};
use crate::types::{validate_name, DatabaseId, TenantId};
use std::sync::Arc;
use tracing::{debug, info};

/// Creates and resolves tenants and databases.
#[derive(Debug, Clone)]
pub struct NamespaceManager {
    store: Arc<EntityStore>,
    config: Arc<SysDbConfig>,
}

impl NamespaceManager {
    pub(crate) fn new(store: Arc<EntityStore>, config: Arc<SysDbConfig>) -> Self {
        Self { store, config }
    }

    /// Creates a tenant. `name` defaults to the id.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the tenant exists. Of several concurrent
    /// creates for the same id exactly one succeeds.
    pub fn create_tenant(&self, id: &TenantId, name: Option<&str>) -> CoreResult<Versioned<Tenant>> {
        let tenant = self
            .store
            .transact(|txn| stage_tenant(txn, id, name, 0))?;
        info!(tenant = %id, "created tenant");
        Ok(tenant)
    }

    /// Reads a tenant.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the tenant does not exist.
    pub fn get_tenant(&self, id: &TenantId) -> CoreResult<Versioned<Tenant>> {
        self.store.get::<Tenant>(id.as_str())
    }

    /// Lists every tenant ordered by id.
    pub fn list_tenants(&self) -> CoreResult<Vec<Versioned<Tenant>>> {
        self.store.list::<Tenant>(|_| true)
    }

    /// Creates a database under `tenant`.
    ///
    /// A caller-supplied `id` lets a retried request recognise its own
    /// earlier success.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if the name is malformed
    /// - `NotFound` if the tenant does not exist and implicit tenants are off
    /// - `AlreadyExists` if a live database has this name in the tenant, or
    ///   the supplied id is taken
    pub fn create_database(
        &self,
        tenant: &TenantId,
        name: &str,
        id: Option<DatabaseId>,
    ) -> CoreResult<Versioned<Database>> {
        validate_name("database", name)?;
        let implicit = self.config.implicit_tenants;

        let database = self.store.transact(|txn| {
            require_tenant(txn, tenant, implicit)?;
            let database = Database {
                id: id.unwrap_or_default(),
                name: name.to_string(),
                tenant: tenant.clone(),
            };
            txn.put(NameClaim::for_database(&database), Expected::Vacant)
                .map_err(|e| e.rename_conflict("database", name))?;
            let version = txn.put(database.clone(), Expected::Vacant)?;
            Ok(Versioned {
                version,
                record: database,
            })
        })?;
        info!(tenant = %tenant, database = %name, id = %database.id, "created database");
        Ok(database)
    }

    /// Resolves a live database by name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no live database has this name in the tenant.
    pub fn get_database(&self, tenant: &TenantId, name: &str) -> CoreResult<Versioned<Database>> {
        let claim_id = NameClaim::claim_id(&NameClaim::database_scope(tenant), name);
        let claim = self
            .store
            .find::<NameClaim>(&claim_id)?
            .ok_or_else(|| CoreError::not_found("database", name))?;
        self.store
            .find::<Database>(&claim.owner.to_string())?
            .ok_or_else(|| CoreError::not_found("database", name))
    }

    /// Lists the live databases of `tenant` ordered by name.
    pub fn list_databases(&self, tenant: &TenantId) -> CoreResult<Vec<Versioned<Database>>> {
        let mut databases = self.store.list::<Database>(|d| &d.tenant == tenant)?;
        databases.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(databases)
    }

    /// Deletes a database with all of its collections and segments.
    ///
    /// # Errors
    ///
    /// - `Unimplemented` without an admin capability
    /// - `NotFound` if the database does not exist
    pub fn delete_database(
        &self,
        cap: Option<&AdminCapability>,
        tenant: &TenantId,
        name: &str,
    ) -> CoreResult<()> {
        let cap = cap.ok_or_else(|| {
            CoreError::unimplemented("delete_database requires an admin capability")
        })?;

        let collections = self.store.transact(|txn| {
            let claim_id = NameClaim::claim_id(&NameClaim::database_scope(tenant), name);
            let claim = txn
                .find::<NameClaim>(&claim_id)?
                .ok_or_else(|| CoreError::not_found("database", name))?;
            let database_id = DatabaseId::from_uuid(claim.owner);

            let collections = txn.list::<Collection>(|c| c.database_id == database_id)?;
            for collection in &collections {
                stage_delete(txn, collection)?;
            }
            txn.delete::<NameClaim>(&claim_id, Expected::Any)?;
            txn.delete::<Database>(&database_id.to_string(), Expected::Any)?;
            Ok(collections.len())
        })?;
        info!(
            principal = cap.principal(),
            tenant = %tenant,
            database = %name,
            collections,
            "deleted database"
        );
        Ok(())
    }

    /// Tenants are never deleted, so their ids are never reused.
    ///
    /// # Errors
    ///
    /// Always returns `Unimplemented`.
    pub fn delete_tenant(&self, _cap: Option<&AdminCapability>, id: &TenantId) -> CoreResult<()> {
        debug!(tenant = %id, "refused tenant deletion");
        Err(CoreError::unimplemented("tenants cannot be deleted"))
    }
}

/// Stages a new tenant with an initial watermark.
pub(crate) fn stage_tenant(
    txn: &mut StoreTxn<'_>,
    id: &TenantId,
    name: Option<&str>,
    last_compaction_time: i64,
) -> CoreResult<Versioned<Tenant>> {
    let tenant = Tenant {
        id: id.clone(),
        name: name.unwrap_or(id.as_str()).to_string(),
        last_compaction_time,
        created_at_ms: txn.now_ms(),
    };
    let version = txn.put(tenant.clone(), Expected::Vacant)?;
    Ok(Versioned {
        version,
        record: tenant,
    })
}

/// Resolves a tenant, creating it when `implicit` is set.
pub(crate) fn require_tenant(
    txn: &mut StoreTxn<'_>,
    id: &TenantId,
    implicit: bool,
) -> CoreResult<Versioned<Tenant>> {
    match txn.find::<Tenant>(id.as_str())? {
        Some(tenant) => Ok(tenant),
        None if implicit => {
            debug!(tenant = %id, "creating tenant implicitly");
            stage_tenant(txn, id, None, 0)
        }
        None => Err(CoreError::not_found("tenant", id.as_str())),
    }
}
