//! Stress helpers for SysDB.
//!
//! These drive the coordinator from many threads at once and report how
//! many operations won, lost or failed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use sysdb_core::{ErrorCode, SysDb, TenantId};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Operations rejected by an expected precondition.
    pub rejected_ops: usize,
    /// Operations that failed for any other reason.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, rejected: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + rejected + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            rejected_ops: rejected,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Rejected: {}", self.rejected_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Operations per thread.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 200,
            threads: 4,
        }
    }
}

#[derive(Default)]
struct Tally {
    successful: AtomicUsize,
    rejected: AtomicUsize,
    failed: AtomicUsize,
}

impl Tally {
    fn record<T>(&self, outcome: sysdb_core::CoreResult<T>, expected: &[ErrorCode]) {
        let counter = match outcome {
            Ok(_) => &self.successful,
            Err(e) if expected.contains(&e.code()) => &self.rejected,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn finish(self, start: Instant) -> StressTestResult {
        StressTestResult::new(
            self.successful.into_inner(),
            self.rejected.into_inner(),
            self.failed.into_inner(),
            start.elapsed(),
        )
    }
}

/// Has every thread try to create the same tenants.
///
/// Each tenant is created exactly once; every other attempt is counted as
/// rejected with `AlreadyExists`.
pub fn stress_concurrent_tenant_creation(db: &SysDb, config: &StressConfig) -> StressTestResult {
    let tally = Tally::default();
    let start = Instant::now();

    thread::scope(|scope| {
        for _ in 0..config.threads {
            scope.spawn(|| {
                for i in 0..config.operations {
                    let Ok(id) = TenantId::new(format!("tenant_{i}")) else {
                        tally.failed.fetch_add(1, Ordering::Relaxed);
                        continue;
                    };
                    tally.record(
                        db.namespace().create_tenant(&id, None),
                        &[ErrorCode::AlreadyExists],
                    );
                }
            });
        }
    });

    tally.finish(start)
}

/// Has every thread push increasing watermarks for `tenant`.
///
/// Thread `t` proposes `i * threads + t` for `i` in `0..operations`, so
/// proposals interleave across threads. Regressions are counted as
/// rejected. The tenant must already exist.
pub fn stress_concurrent_watermarks(
    db: &SysDb,
    tenant: &TenantId,
    config: &StressConfig,
) -> StressTestResult {
    let tally = Tally::default();
    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..config.threads {
            let tally = &tally;
            scope.spawn(move || {
                for i in 0..config.operations {
                    let time = (i * config.threads + t) as i64;
                    tally.record(
                        db.watermarks().set_last_compaction_time(tenant, time),
                        &[ErrorCode::InvalidArgument],
                    );
                }
            });
        }
    });

    tally.finish(start)
}
