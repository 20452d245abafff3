//! Executor and scheduler configuration. Spec §4.4.1/§4.5 name the defaults
//! (`maxParallel` default 4, watchdog default 10 minutes); this module adds
//! the environment-variable overrides operators expect from the rest of
//! this stack.

use std::time::Duration;

/// Tunables for a single run's worker pool (spec §4.4.1, §4.4.2, §5).
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Number of concurrent node-executing workers per run.
    pub max_parallel: usize,
    /// Re-enqueue delay when a node's dependency/children-done gate isn't
    /// satisfied yet.
    pub dependency_retry_delay: Duration,
    /// Re-enqueue delay after a node's retryable failure.
    pub failure_retry_delay: Duration,
    /// Safety bound on dependency-gate re-enqueues before raising
    /// `DependencyStall`.
    pub dependency_stall_limit: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel: std::env::var("WORKFLOW_MAX_PARALLEL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            dependency_retry_delay: Duration::from_millis(100),
            failure_retry_delay: Duration::from_millis(500),
            dependency_stall_limit: 100,
        }
    }
}

/// Tunables for the scheduler's per-run watchdog (spec §4.5).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub watchdog_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            watchdog_timeout: std::env::var("WORKFLOW_WATCHDOG_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or_else(|| Duration::from_secs(600)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn executor_config_defaults_match_spec() {
        let config = ExecutorConfig::default();
        assert_eq!(config.dependency_retry_delay, Duration::from_millis(100));
        assert_eq!(config.failure_retry_delay, Duration::from_millis(500));
        assert_eq!(config.dependency_stall_limit, 100);
    }

    #[test]
    fn scheduler_config_defaults_to_ten_minutes() {
        let config = SchedulerConfig::default();
        if std::env::var("WORKFLOW_WATCHDOG_SECS").is_err() {
            assert_eq!(config.watchdog_timeout, Duration::from_secs(600));
        }
    }
}
