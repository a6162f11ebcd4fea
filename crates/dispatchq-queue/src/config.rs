//! Engine configuration.

use std::time::Duration;

use dispatchq_config::Config;
pub use dispatchq_config::PriorityOrder;

use crate::error::QueueError;
use crate::retry::RetryPolicy;

/// Runtime settings shared by the engine components.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Which end of the priority scale is dispatched first.
    pub priority_order: PriorityOrder,
    pub default_priority: i64,
    pub min_priority: i64,
    pub max_priority: i64,
    /// Claims older than this are reclaimed by the reaper.
    pub claim_timeout: Duration,
    pub reaper_interval: Duration,
    /// Reaper retry budget (0 = unlimited).
    pub max_attempts: u32,
    /// Stats cache lifetime (zero disables the cache).
    pub stats_cache_ttl: Duration,
    pub retry: RetryPolicy,
}

impl EngineConfig {
    /// Check that `priority` lies inside the configured range.
    pub fn check_priority(&self, priority: i64) -> Result<i64, QueueError> {
        if (self.min_priority..=self.max_priority).contains(&priority) {
            Ok(priority)
        } else {
            Err(QueueError::validation(format!(
                "priority {} is outside [{}, {}]",
                priority, self.min_priority, self.max_priority
            )))
        }
    }

    /// Resolve an optional priority against the default.
    pub fn resolve_priority(&self, priority: Option<i64>) -> Result<i64, QueueError> {
        self.check_priority(priority.unwrap_or(self.default_priority))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for EngineConfig {
    fn from(config: &Config) -> Self {
        Self {
            priority_order: config.dispatch.priority_order,
            default_priority: config.dispatch.default_priority,
            min_priority: config.dispatch.min_priority,
            max_priority: config.dispatch.max_priority,
            claim_timeout: Duration::from_secs(config.reaper.claim_timeout_secs),
            reaper_interval: Duration::from_secs(config.reaper.interval_secs),
            max_attempts: config.reaper.max_attempts,
            stats_cache_ttl: Duration::from_millis(config.stats.cache_ttl_ms),
            retry: RetryPolicy {
                max_retries: config.storage.max_retries,
                base_delay: Duration::from_millis(config.storage.retry_base_delay_ms),
                max_delay: Duration::from_millis(config.storage.retry_max_delay_ms),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.priority_order, PriorityOrder::HigherFirst);
        assert_eq!(config.default_priority, 5);
        assert_eq!(config.claim_timeout, Duration::from_secs(1800));
        assert_eq!(config.stats_cache_ttl, Duration::from_millis(2000));
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_from_config_overrides() {
        let mut raw = Config::default();
        raw.dispatch.priority_order = PriorityOrder::LowerFirst;
        raw.reaper.claim_timeout_secs = 90;
        raw.reaper.max_attempts = 4;

        let config = EngineConfig::from(&raw);
        assert_eq!(config.priority_order, PriorityOrder::LowerFirst);
        assert_eq!(config.claim_timeout, Duration::from_secs(90));
        assert_eq!(config.max_attempts, 4);
    }

    #[test]
    fn test_priority_range() {
        let config = EngineConfig::default();
        assert_eq!(config.resolve_priority(None).unwrap(), 5);
        assert_eq!(config.resolve_priority(Some(10)).unwrap(), 10);
        assert!(matches!(config.check_priority(11), Err(QueueError::Validation(_))));
        assert!(matches!(config.check_priority(-1), Err(QueueError::Validation(_))));
    }
}
