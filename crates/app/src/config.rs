//! Engine tuning knobs.

use std::time::Duration;

use serde::Deserialize;

/// Cadence, bounds, and capacities of the evaluation engine.
///
/// Every field has a production-sensible default so deployments only set
/// what they need to change.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How often the scheduler wakes up.
    #[serde(with = "duration_ms", rename = "tick_interval_ms")]
    pub tick_interval: Duration,
    /// How many processes run concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches to bound burst load on the transport.
    #[serde(with = "duration_ms", rename = "batch_pause_ms")]
    pub batch_pause: Duration,
    /// Per-process evaluation bound.
    #[serde(with = "duration_ms", rename = "evaluation_timeout_ms")]
    pub evaluation_timeout: Duration,
    /// Per-remote-fetch bound in distributed evaluation.
    #[serde(with = "duration_ms", rename = "fetch_timeout_ms")]
    pub fetch_timeout: Duration,
    /// Samples older than this fail the quality gate.
    #[serde(with = "duration_ms", rename = "stale_after_ms")]
    pub stale_after: Duration,
    /// Concurrent-process ceiling.
    pub max_processes: usize,
    /// Capacity of the resolved-state store before LRU eviction.
    pub resolved_capacity: usize,
    /// Entries kept per process in trigger/diagnostic histories.
    pub history_bound: usize,
    /// Rules averaging above this show up in `slow_rule_ids`.
    pub slow_threshold_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            batch_size: 8,
            batch_pause: Duration::from_millis(50),
            evaluation_timeout: Duration::from_secs(2),
            fetch_timeout: Duration::from_millis(500),
            stale_after: Duration::from_secs(300),
            max_processes: 64,
            resolved_capacity: 256,
            history_bound: 20,
            slow_threshold_ms: 250,
        }
    }
}

impl EngineConfig {
    /// The staleness bound as a chrono duration for sample-age checks.
    #[must_use]
    pub fn stale_after_chrono(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.stale_after)
            .unwrap_or_else(|_| chrono::Duration::minutes(5))
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_one_second_tick_and_five_minute_staleness() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_interval, Duration::from_secs(1));
        assert_eq!(config.stale_after, Duration::from_secs(300));
        assert_eq!(config.stale_after_chrono(), chrono::Duration::minutes(5));
    }

    #[test]
    fn should_deserialize_durations_from_milliseconds() {
        let json = serde_json::json!({
            "tick_interval_ms": 250,
            "batch_size": 4,
            "fetch_timeout_ms": 100
        });
        let config: EngineConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.tick_interval, Duration::from_millis(250));
        assert_eq!(config.batch_size, 4);
        assert_eq!(config.fetch_timeout, Duration::from_millis(100));
        // untouched fields keep their defaults
        assert_eq!(config.max_processes, 64);
    }
}
