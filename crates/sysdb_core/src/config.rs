//! Coordinator configuration.

use std::time::Duration;

/// Default implementation type for vector segments.
pub const DEFAULT_VECTOR_SEGMENT_TYPE: &str = "urn:sysdb:segment/vector/hnsw-distributed";

/// Default implementation type for metadata segments.
pub const DEFAULT_METADATA_SEGMENT_TYPE: &str = "urn:sysdb:segment/metadata/blockfile";

/// Configuration for opening a [`SysDb`](crate::SysDb).
#[derive(Debug, Clone)]
pub struct SysDbConfig {
    /// Retry behaviour for transient storage faults and watermark races.
    pub retry: RetryPolicy,

    /// Whether database creation and watermark updates may create unknown tenants.
    pub implicit_tenants: bool,

    /// How long tombstones are kept before [`purge_tombstones`](crate::SysDb::purge_tombstones) removes them.
    pub tombstone_retention: Duration,

    /// Segment type used for the default vector segment of new collections.
    pub vector_segment_type: String,

    /// Segment type used for the default metadata segment of new collections.
    pub metadata_segment_type: String,

    /// Whether `reset_state` may run at all.
    pub allow_reset: bool,

    /// Whether to create the default tenant and database on open.
    pub bootstrap_defaults: bool,
}

impl Default for SysDbConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            implicit_tenants: false,
            tombstone_retention: Duration::from_secs(60 * 60), // 1 hour
            vector_segment_type: DEFAULT_VECTOR_SEGMENT_TYPE.to_string(),
            metadata_segment_type: DEFAULT_METADATA_SEGMENT_TYPE.to_string(),
            allow_reset: false,
            bootstrap_defaults: false,
        }
    }
}

impl SysDbConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets whether unknown tenants are created on demand.
    #[must_use]
    pub const fn implicit_tenants(mut self, value: bool) -> Self {
        self.implicit_tenants = value;
        self
    }

    /// Sets the tombstone retention.
    #[must_use]
    pub const fn tombstone_retention(mut self, retention: Duration) -> Self {
        self.tombstone_retention = retention;
        self
    }

    /// Sets the default vector segment type.
    #[must_use]
    pub fn vector_segment_type(mut self, segment_type: impl Into<String>) -> Self {
        self.vector_segment_type = segment_type.into();
        self
    }

    /// Sets the default metadata segment type.
    #[must_use]
    pub fn metadata_segment_type(mut self, segment_type: impl Into<String>) -> Self {
        self.metadata_segment_type = segment_type.into();
        self
    }

    /// Sets whether `reset_state` is permitted.
    #[must_use]
    pub const fn allow_reset(mut self, value: bool) -> Self {
        self.allow_reset = value;
        self
    }

    /// Sets whether the default tenant and database are created on open.
    #[must_use]
    pub const fn bootstrap_defaults(mut self, value: bool) -> Self {
        self.bootstrap_defaults = value;
        self
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    /// Creates a policy with `max_attempts` and default delays.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
        }
    }

    /// Creates a policy that never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Returns the delay to wait before attempt `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SysDbConfig::default();
        assert!(!config.allow_reset);
        assert!(!config.implicit_tenants);
        assert_eq!(config.vector_segment_type, DEFAULT_VECTOR_SEGMENT_TYPE);
    }

    #[test]
    fn builder_pattern() {
        let config = SysDbConfig::new()
            .allow_reset(true)
            .implicit_tenants(true)
            .metadata_segment_type("urn:test/meta")
            .retry(RetryPolicy::no_retry());

        assert!(config.allow_reset);
        assert!(config.implicit_tenants);
        assert_eq!(config.metadata_segment_type, "urn:test/meta");
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::new(10)
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(350));

        assert_eq!(policy.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for_attempt(8), Duration::from_millis(350));
    }

    #[test]
    fn zero_attempts_is_clamped() {
        assert_eq!(RetryPolicy::new(0).max_attempts, 1);
    }
}
