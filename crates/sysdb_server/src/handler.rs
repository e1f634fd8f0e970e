//! Request handlers for coordinator RPCs.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::messages::{
    CreateCollectionRequest, CreateCollectionResponse, CreateDatabaseRequest,
    CreateSegmentRequest, CreateTenantRequest, DatabaseResponse, DeleteCollectionRequest,
    DeleteSegmentRequest, Empty, GetCollectionsRequest, GetCollectionsResponse,
    GetDatabaseRequest, GetLastCompactionTimeRequest, GetLastCompactionTimeResponse,
    GetSegmentsRequest, GetSegmentsResponse, GetTenantRequest, SegmentResponse,
    SetLastCompactionTimeRequest, TenantResponse, UpdateCollectionRequest,
    UpdateCollectionResponse, UpdateSegmentRequest, UpdateSegmentResponse,
};
use std::sync::Arc;
use sysdb_core::{AdminCapability, SysDb};

/// Per-request context.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Capability minted from a valid admin token, if any.
    pub admin: Option<AdminCapability>,
}

impl CallContext {
    /// Context for an unauthenticated caller.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Context for a caller holding `cap`.
    pub fn admin(cap: AdminCapability) -> Self {
        Self { admin: Some(cap) }
    }
}

/// Validates request shape and delegates to the coordinator.
pub struct RequestHandler {
    db: Arc<SysDb>,
    config: ServerConfig,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(db: Arc<SysDb>, config: ServerConfig) -> Self {
        Self { db, config }
    }

    /// Returns the coordinator.
    pub fn db(&self) -> &Arc<SysDb> {
        &self.db
    }

    /// Handles `CreateDatabase`.
    pub fn create_database(
        &self,
        request: CreateDatabaseRequest,
        _ctx: &CallContext,
    ) -> ServerResult<DatabaseResponse> {
        non_empty("name", &request.name)?;
        let database = self
            .db
            .namespace()
            .create_database(&request.tenant, &request.name, request.id)?;
        Ok(DatabaseResponse { database })
    }

    /// Handles `GetDatabase`.
    pub fn get_database(
        &self,
        request: GetDatabaseRequest,
        _ctx: &CallContext,
    ) -> ServerResult<DatabaseResponse> {
        non_empty("name", &request.name)?;
        let database = self
            .db
            .namespace()
            .get_database(&request.tenant, &request.name)?;
        Ok(DatabaseResponse { database })
    }

    /// Handles `CreateTenant`.
    pub fn create_tenant(
        &self,
        request: CreateTenantRequest,
        _ctx: &CallContext,
    ) -> ServerResult<TenantResponse> {
        if let Some(name) = &request.name {
            non_empty("name", name)?;
        }
        let tenant = self
            .db
            .namespace()
            .create_tenant(&request.id, request.name.as_deref())?;
        Ok(TenantResponse { tenant })
    }

    /// Handles `GetTenant`.
    pub fn get_tenant(
        &self,
        request: GetTenantRequest,
        _ctx: &CallContext,
    ) -> ServerResult<TenantResponse> {
        let tenant = self.db.namespace().get_tenant(&request.id)?;
        Ok(TenantResponse { tenant })
    }

    /// Handles `CreateSegment`.
    pub fn create_segment(
        &self,
        request: CreateSegmentRequest,
        _ctx: &CallContext,
    ) -> ServerResult<SegmentResponse> {
        non_empty("segment_type", &request.segment.segment_type)?;
        let segment = self.db.segments().create_segment(request.segment)?;
        Ok(SegmentResponse { segment })
    }

    /// Handles `DeleteSegment`.
    pub fn delete_segment(
        &self,
        request: DeleteSegmentRequest,
        _ctx: &CallContext,
    ) -> ServerResult<Empty> {
        self.db.segments().delete_segment(request.id)?;
        Ok(Empty {})
    }

    /// Handles `GetSegments`.
    pub fn get_segments(
        &self,
        request: GetSegmentsRequest,
        _ctx: &CallContext,
    ) -> ServerResult<GetSegmentsResponse> {
        let segments = self.db.segments().get_segments(&request.filter)?;
        Ok(GetSegmentsResponse { segments })
    }

    /// Handles `UpdateSegment`.
    pub fn update_segment(
        &self,
        request: UpdateSegmentRequest,
        _ctx: &CallContext,
    ) -> ServerResult<UpdateSegmentResponse> {
        let version = self
            .db
            .segments()
            .update_segment(request.id, request.patch, request.version)?;
        Ok(UpdateSegmentResponse { version })
    }

    /// Handles `CreateCollection`.
    pub fn create_collection(
        &self,
        request: CreateCollectionRequest,
        _ctx: &CallContext,
    ) -> ServerResult<CreateCollectionResponse> {
        non_empty("name", &request.collection.name)?;
        non_empty("database", &request.collection.database)?;
        let created = self.db.collections().create_collection(request.collection)?;
        Ok(CreateCollectionResponse {
            collection: created.collection,
            segments: created.segments,
            created: created.created,
        })
    }

    /// Handles `DeleteCollection`.
    pub fn delete_collection(
        &self,
        request: DeleteCollectionRequest,
        _ctx: &CallContext,
    ) -> ServerResult<Empty> {
        self.db.collections().delete_collection(request.id)?;
        Ok(Empty {})
    }

    /// Handles `GetCollections`.
    pub fn get_collections(
        &self,
        request: GetCollectionsRequest,
        _ctx: &CallContext,
    ) -> ServerResult<GetCollectionsResponse> {
        let filter = request.filter;
        if let Some(limit) = filter.limit {
            if limit == 0 || limit > self.config.max_page_size {
                return Err(ServerError::InvalidRequest(format!(
                    "limit must be 1-{}, got {limit}",
                    self.config.max_page_size
                )));
            }
        }
        if filter.database.is_some() && filter.tenant.is_none() {
            return Err(ServerError::InvalidRequest(
                "database filter requires a tenant".into(),
            ));
        }
        let collections = self.db.collections().get_collections(&filter)?;
        Ok(GetCollectionsResponse { collections })
    }

    /// Handles `UpdateCollection`.
    pub fn update_collection(
        &self,
        request: UpdateCollectionRequest,
        _ctx: &CallContext,
    ) -> ServerResult<UpdateCollectionResponse> {
        if let Some(name) = &request.patch.name {
            non_empty("name", name)?;
        }
        let collection = self
            .db
            .collections()
            .update_collection(request.id, request.patch, request.version)?;
        Ok(UpdateCollectionResponse { collection })
    }

    /// Handles `ResetState`.
    pub fn reset_state(&self, _request: Empty, ctx: &CallContext) -> ServerResult<Empty> {
        self.db.reset_state(ctx.admin.as_ref())?;
        Ok(Empty {})
    }

    /// Handles `GetLastCompactionTimeForTenant`.
    pub fn get_last_compaction_time(
        &self,
        request: GetLastCompactionTimeRequest,
        _ctx: &CallContext,
    ) -> ServerResult<GetLastCompactionTimeResponse> {
        let tenant_last_compaction_time = self
            .db
            .watermarks()
            .get_last_compaction_times(&request.tenant_ids)?;
        Ok(GetLastCompactionTimeResponse {
            tenant_last_compaction_time,
        })
    }

    /// Handles `SetLastCompactionTimeForTenant`.
    pub fn set_last_compaction_time(
        &self,
        request: SetLastCompactionTimeRequest,
        _ctx: &CallContext,
    ) -> ServerResult<Empty> {
        self.db
            .watermarks()
            .set_last_compaction_time(&request.tenant_id, request.last_compaction_time)?;
        Ok(Empty {})
    }
}

fn non_empty(field: &str, value: &str) -> ServerResult<()> {
    if value.trim().is_empty() {
        return Err(ServerError::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusCode;
    use sysdb_core::{CollectionFilter, NewCollection, SysDbConfig, TenantId};

    fn handler(config: SysDbConfig) -> RequestHandler {
        let db = Arc::new(SysDb::open_in_memory(config).unwrap());
        RequestHandler::new(db, ServerConfig::default().with_max_page_size(10))
    }

    fn t1() -> TenantId {
        TenantId::new("t1").unwrap()
    }

    #[test]
    fn empty_names_are_invalid() {
        let h = handler(SysDbConfig::default());
        let ctx = CallContext::anonymous();
        let err = h
            .create_database(
                CreateDatabaseRequest {
                    id: None,
                    name: " ".into(),
                    tenant: t1(),
                },
                &ctx,
            )
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::InvalidArgument);
    }

    #[test]
    fn page_limits_are_checked() {
        let h = handler(SysDbConfig::default());
        let ctx = CallContext::anonymous();
        for limit in [0, 11] {
            let err = h
                .get_collections(
                    GetCollectionsRequest {
                        filter: CollectionFilter::new().page(limit, 0),
                    },
                    &ctx,
                )
                .unwrap_err();
            assert_eq!(err.status(), StatusCode::InvalidArgument);
        }
    }

    #[test]
    fn database_filter_needs_tenant() {
        let h = handler(SysDbConfig::default());
        let filter = CollectionFilter {
            database: Some("prod".into()),
            ..CollectionFilter::default()
        };
        let err = h
            .get_collections(GetCollectionsRequest { filter }, &CallContext::anonymous())
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::InvalidArgument);
    }

    #[test]
    fn reset_needs_admin_context() {
        let h = handler(SysDbConfig::new().allow_reset(true));
        let err = h
            .reset_state(Empty {}, &CallContext::anonymous())
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::Unimplemented);

        let ctx = CallContext::admin(AdminCapability::grant("ops"));
        h.reset_state(Empty {}, &ctx).unwrap();
    }

    #[test]
    fn create_collection_reports_segments() {
        let h = handler(SysDbConfig::default());
        let ctx = CallContext::anonymous();
        h.create_tenant(
            CreateTenantRequest {
                id: t1(),
                name: None,
            },
            &ctx,
        )
        .unwrap();
        h.create_database(
            CreateDatabaseRequest {
                id: None,
                name: "prod".into(),
                tenant: t1(),
            },
            &ctx,
        )
        .unwrap();
        let response = h
            .create_collection(
                CreateCollectionRequest {
                    collection: NewCollection::new(t1(), "prod", "docs"),
                },
                &ctx,
            )
            .unwrap();
        assert!(response.created);
        assert_eq!(response.segments.len(), 2);
    }
}
