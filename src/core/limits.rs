/*!
 * Runtime Limits and Constants
 *
 * Centralized location for all limits, thresholds, and magic numbers.
 * Organized by domain for maintainability and discoverability.
 */

use std::time::Duration;

// =============================================================================
// TRACKING LIMITS
// =============================================================================

/// Maximum tracking signature length in bytes
/// Signatures beyond this are rejected at the call that set them
pub const MAX_SIGNATURE_LEN: usize = 128;

/// Default severity gate for the level selector (everything enabled)
pub const DEFAULT_MIN_SEVERITY: crate::track::Severity = crate::track::Severity::Trace;

// =============================================================================
// DISPATCH POOL
// =============================================================================

/// Default bounded dispatch queue capacity
/// [PERF] Power of 2 keeps the ring arithmetic cheap
pub const DEFAULT_QUEUE_CAPACITY: usize = 8192;

/// Default worker count per dispatch pool
pub const DEFAULT_POOL_WORKERS: usize = 4;

/// Name of the shared default dispatch pool
pub const DEFAULT_POOL_NAME: &str = "default";

/// Worker poll interval while waiting for work or a shutdown signal
pub const POOL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Shutdown grace period
/// Maximum time to wait for workers to drain before abandoning them
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Minimum interval between repeated dispatch error reports
/// Bounds diagnostic log volume during sustained sink outages
pub const ERROR_REPORT_INTERVAL: Duration = Duration::from_secs(30);

// =============================================================================
// SINK CHAIN
// =============================================================================

/// Default TTL assigned by the TTL stage when an item inherits the context
/// default (one day, in seconds)
pub const DEFAULT_EVENT_TTL_SEC: i64 = 86_400;

/// Default in-memory sink retention capacity
/// [PERF] Power of 2 for the lock-free retention ring
pub const MEMORY_SINK_CAPACITY: usize = 1024;

/// Upper bound on how long a blocking rate limiter will sleep for one grant
pub const LIMITER_MAX_SLEEP: Duration = Duration::from_millis(250);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_of_two_requirements() {
        assert!(DEFAULT_QUEUE_CAPACITY.is_power_of_two());
        assert!(MEMORY_SINK_CAPACITY.is_power_of_two());
    }

    #[test]
    fn test_interval_hierarchy() {
        // Workers must poll much faster than the shutdown grace period
        assert!(POOL_POLL_INTERVAL < SHUTDOWN_GRACE_PERIOD);
        assert!(POOL_POLL_INTERVAL < ERROR_REPORT_INTERVAL);
    }

    #[test]
    fn test_signature_bound() {
        assert!(MAX_SIGNATURE_LEN >= 36, "must fit a UUID string");
    }
}
