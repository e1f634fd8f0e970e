//! Per-tenant compaction watermarks.
//!
//! A watermark only moves forward. Updates read the tenant, compare, and
//! write back guarded by the version they read. A writer that loses the race
//! re-reads and compares again, so a late update carrying an older time is
//! rejected instead of overwriting a newer one.

use crate::config::SysDbConfig;
use crate::error::{CoreError, CoreResult};
use crate::model::Tenant;
use crate::namespace::stage_tenant;
use crate::store::{EntityStore, Expected};
use crate::types::TenantId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// A tenant's compaction watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantWatermark {
    /// Tenant id.
    pub tenant: TenantId,
    /// Last compaction time.
    pub last_compaction_time: i64,
}

/// Reads and advances compaction watermarks.
#[derive(Debug, Clone)]
pub struct WatermarkTracker {
    store: Arc<EntityStore>,
    config: Arc<SysDbConfig>,
}

impl WatermarkTracker {
    pub(crate) fn new(store: Arc<EntityStore>, config: Arc<SysDbConfig>) -> Self {
        Self { store, config }
    }

    /// Returns the tenant's watermark, or 0 if it was never set or the
    /// tenant is unknown.
    pub fn get_last_compaction_time(&self, tenant: &TenantId) -> CoreResult<i64> {
        Ok(self
            .store
            .find::<Tenant>(tenant.as_str())?
            .map_or(0, |t| t.last_compaction_time))
    }

    /// Returns the watermarks of the known tenants among `tenants`.
    pub fn get_last_compaction_times(&self, tenants: &[TenantId]) -> CoreResult<Vec<TenantWatermark>> {
        let mut out = Vec::with_capacity(tenants.len());
        for id in tenants {
            if let Some(tenant) = self.store.find::<Tenant>(id.as_str())? {
                out.push(TenantWatermark {
                    tenant: tenant.record.id,
                    last_compaction_time: tenant.record.last_compaction_time,
                });
            }
        }
        Ok(out)
    }

    /// Advances the tenant's watermark to `time`.
    ///
    /// Setting the current value again succeeds without writing.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if `time` is negative or below the stored value
    /// - `NotFound` if the tenant is unknown and implicit tenants are off
    /// - `VersionConflict` if concurrent writers kept winning for every
    ///   attempt the retry policy allows
    pub fn set_last_compaction_time(&self, tenant: &TenantId, time: i64) -> CoreResult<()> {
        if time < 0 {
            return Err(CoreError::invalid_argument(format!(
                "compaction time must not be negative, got {time}"
            )));
        }

        let attempts = self.config.retry.max_attempts;
        let mut last_conflict = None;
        for attempt in 1..=attempts {
            let outcome = match self.store.find::<Tenant>(tenant.as_str())? {
                None if self.config.implicit_tenants => self
                    .store
                    .transact(|txn| stage_tenant(txn, tenant, None, time).map(|_| ())),
                None => return Err(CoreError::not_found("tenant", tenant.as_str())),
                Some(current) => {
                    let stored = current.last_compaction_time;
                    if time < stored {
                        warn!(tenant = %tenant, stored, rejected = time, "rejected watermark regression");
                        return Err(CoreError::invalid_argument(format!(
                            "compaction time {time} is older than stored {stored} for tenant {tenant}"
                        )));
                    }
                    if time == stored {
                        return Ok(());
                    }
                    let version = current.version;
                    let mut next = current.into_inner();
                    next.last_compaction_time = time;
                    self.store
                        .put(next, Expected::Version(version))
                        .map(|_| ())
                }
            };

            match outcome {
                Ok(()) => {
                    debug!(tenant = %tenant, time, attempt, "advanced watermark");
                    return Ok(());
                }
                Err(err @ (CoreError::VersionConflict { .. } | CoreError::AlreadyExists { .. })) => {
                    debug!(tenant = %tenant, attempt, "lost watermark race, re-reading");
                    last_conflict = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_conflict.unwrap_or_else(|| {
            CoreError::unavailable(format!("watermark update for {tenant} was not attempted"))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::SysDb;

    fn t1() -> TenantId {
        TenantId::new("t1").unwrap()
    }

    #[test]
    fn monotonic_advance() {
        let db = SysDb::open_in_memory(SysDbConfig::default()).unwrap();
        db.namespace().create_tenant(&t1(), None).unwrap();
        let wm = db.watermarks();

        assert_eq!(wm.get_last_compaction_time(&t1()).unwrap(), 0);
        wm.set_last_compaction_time(&t1(), 100).unwrap();
        let err = wm.set_last_compaction_time(&t1(), 50).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        wm.set_last_compaction_time(&t1(), 100).unwrap();
        wm.set_last_compaction_time(&t1(), 150).unwrap();
        assert_eq!(wm.get_last_compaction_time(&t1()).unwrap(), 150);
    }

    #[test]
    fn equal_value_does_not_write() {
        let db = SysDb::open_in_memory(SysDbConfig::default()).unwrap();
        db.namespace().create_tenant(&t1(), None).unwrap();
        db.watermarks().set_last_compaction_time(&t1(), 10).unwrap();
        let before = db.namespace().get_tenant(&t1()).unwrap().version;
        db.watermarks().set_last_compaction_time(&t1(), 10).unwrap();
        assert_eq!(db.namespace().get_tenant(&t1()).unwrap().version, before);
    }

    #[test]
    fn negative_time_rejected() {
        let db = SysDb::open_in_memory(SysDbConfig::default()).unwrap();
        db.namespace().create_tenant(&t1(), None).unwrap();
        let err = db
            .watermarks()
            .set_last_compaction_time(&t1(), -1)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn unknown_tenant() {
        let db = SysDb::open_in_memory(SysDbConfig::default()).unwrap();
        let ghost = TenantId::new("ghost").unwrap();
        assert_eq!(db.watermarks().get_last_compaction_time(&ghost).unwrap(), 0);
        let err = db
            .watermarks()
            .set_last_compaction_time(&ghost, 5)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let db = SysDb::open_in_memory(SysDbConfig::new().implicit_tenants(true)).unwrap();
        db.watermarks().set_last_compaction_time(&ghost, 5).unwrap();
        assert_eq!(db.watermarks().get_last_compaction_time(&ghost).unwrap(), 5);
    }

    #[test]
    fn batch_read_skips_unknown() {
        let db = SysDb::open_in_memory(SysDbConfig::default()).unwrap();
        let a = TenantId::new("a").unwrap();
        let b = TenantId::new("b").unwrap();
        db.namespace().create_tenant(&a, None).unwrap();
        db.watermarks().set_last_compaction_time(&a, 7).unwrap();

        let marks = db.watermarks().get_last_compaction_times(&[a.clone(), b]).unwrap();
        assert_eq!(
            marks,
            vec![TenantWatermark {
                tenant: a,
                last_compaction_time: 7
            }]
        );
    }
}
