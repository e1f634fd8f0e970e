//! Retrying transient storage faults.

use crate::config::RetryPolicy;
use crate::error::{CoreError, CoreResult};
use sysdb_storage::StorageResult;
use tracing::warn;

/// Runs `op` until it succeeds, fails permanently, or the policy is exhausted.
///
/// Transient failures left over after the last attempt become
/// [`CoreError::Unavailable`]; permanent failures are returned at once.
pub(crate) fn with_retry<T>(
    policy: &RetryPolicy,
    what: &str,
    mut op: impl FnMut() -> StorageResult<T>,
) -> CoreResult<T> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                attempt += 1;
                if attempt >= policy.max_attempts {
                    warn!(%what, attempts = attempt, error = %err, "storage still unavailable, giving up");
                    return Err(CoreError::unavailable(format!(
                        "{what} failed after {attempt} attempts: {err}"
                    )));
                }
                let delay = policy.delay_for_attempt(attempt);
                warn!(%what, attempt, ?delay, error = %err, "transient storage error, retrying");
                std::thread::sleep(delay);
            }
            Err(err) => return Err(err.into()),
        }
    }
}
