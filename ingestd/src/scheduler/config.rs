//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::DEFAULT_BATCH_SIZE;

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Max item IDs per batch
    #[serde(rename = "batch-size", default = "default_batch_size")]
    pub batch_size: usize,

    /// Minimum spacing between batch dispatches in milliseconds
    #[serde(rename = "rate-limit-ms", default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,

    /// Idle recheck interval for the drain loop; derived from the rate limit when unset
    #[serde(rename = "poll-interval-ms", default)]
    pub poll_interval_ms: Option<u64>,

    /// Simulated work per item in milliseconds
    #[serde(rename = "item-delay-ms", default = "default_item_delay_ms")]
    pub item_delay_ms: u64,

    /// Optional upper bound on a single item's work
    #[serde(rename = "item-timeout-ms", default)]
    pub item_timeout_ms: Option<u64>,

    /// How long shutdown waits for the drain loop before aborting it
    #[serde(rename = "shutdown-timeout-ms", default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_rate_limit_ms() -> u64 {
    5_000
}

fn default_item_delay_ms() -> u64 {
    1_000
}

fn default_shutdown_timeout_ms() -> u64 {
    10_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            rate_limit_ms: 5_000,
            poll_interval_ms: None,
            item_delay_ms: 1_000,
            item_timeout_ms: None,
            shutdown_timeout_ms: 10_000,
        }
    }
}

impl SchedulerConfig {
    /// Get the rate limit interval as a Duration
    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    /// Idle recheck interval: explicit value, else 1/50 of the rate limit, never below 1ms
    pub fn poll_interval(&self) -> Duration {
        let ms = self.poll_interval_ms.unwrap_or(self.rate_limit_ms / 50);
        Duration::from_millis(ms.max(1))
    }

    /// Get the simulated per-item delay as a Duration
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    /// Get the per-item timeout, if any
    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_ms.map(Duration::from_millis)
    }

    /// Get the shutdown timeout as a Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.rate_limit(), Duration::from_secs(5));
        assert_eq!(config.item_delay(), Duration::from_secs(1));
        assert_eq!(config.item_timeout(), None);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_poll_interval_derived_from_rate_limit() {
        let config = SchedulerConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(100));

        let tiny = SchedulerConfig {
            rate_limit_ms: 0,
            ..Default::default()
        };
        assert_eq!(tiny.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn test_explicit_poll_interval_wins() {
        let config = SchedulerConfig {
            poll_interval_ms: Some(7),
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(7));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: SchedulerConfig = serde_yaml::from_str("batch-size: 10\nitem-timeout-ms: 250\n").unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.item_timeout(), Some(Duration::from_millis(250)));
        assert_eq!(config.rate_limit_ms, 5_000);
    }
}
