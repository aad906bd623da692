//! Periodic resync scheduling.
//!
//! Watch events are the primary trigger for passes, but a pass whose inputs
//! never change again would otherwise never run. Each worker resyncs its
//! cluster on a timer as a fallback.
//!
//! - **Interval**: 10 minutes by default
//! - **Jitter**: 0-20% added, derived from the cluster key so that restarts
//!   don't resync every cluster at the same moment
//! - **Initial stagger**: also derived from the cluster key

use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::types::ObjectKey;

const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 600;

const DEFAULT_JITTER_PERCENT: u8 = 20;

/// Configuration for periodic resyncs.
#[derive(Debug, Clone)]
pub struct ResyncConfig {
    /// Interval between resyncs of one cluster.
    pub interval: Duration,

    /// Jitter percentage added to the interval (0-100).
    pub jitter_percent: u8,
}

impl Default for ResyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ResyncConfig {
    pub fn new() -> Self {
        ResyncConfig {
            interval: Duration::from_secs(DEFAULT_RESYNC_INTERVAL_SECS),
            jitter_percent: DEFAULT_JITTER_PERCENT,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Returns the resync interval with jitter added for a specific cluster.
    ///
    /// The jitter is deterministic: the same cluster always gets the same
    /// interval.
    ///
    /// # Formula
    ///
    /// `interval * (1 + (hash(key) % jitter_percent) / 100)`
    pub fn interval_with_jitter(&self, key: &ObjectKey) -> Duration {
        if self.jitter_percent == 0 {
            return self.interval;
        }
        let jitter = (key_hash(key) % self.jitter_percent as u64) as f64 / 100.0;
        self.interval.mul_f64(1.0 + jitter)
    }

    /// Delay before a new worker's first resync.
    ///
    /// # Formula
    ///
    /// `hash(key) % (interval / 2)`
    pub fn initial_delay(&self, key: &ObjectKey) -> Duration {
        let max_delay = (self.interval.as_millis() / 2).max(1) as u64;
        Duration::from_millis(key_hash(key) % max_delay)
    }
}

fn key_hash(key: &ObjectKey) -> u64 {
    let mut hasher = std::hash::DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_ten_minutes() {
        let config = ResyncConfig::new();
        assert_eq!(config.interval, Duration::from_secs(600));
        assert_eq!(config.jitter_percent, 20);
    }

    #[test]
    fn jitter_is_deterministic() {
        let config = ResyncConfig::new();
        let key = ObjectKey::new("infra", "prod");

        assert_eq!(
            config.interval_with_jitter(&key),
            config.interval_with_jitter(&key)
        );
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let config = ResyncConfig::new();
        for name in ["prod", "staging", "dev", "edge"] {
            let interval = config.interval_with_jitter(&ObjectKey::new("infra", name));
            assert!(interval >= config.interval);
            assert!(interval <= config.interval.mul_f64(1.2));
        }
    }

    #[test]
    fn zero_jitter_returns_exact_interval() {
        let config = ResyncConfig {
            jitter_percent: 0,
            ..ResyncConfig::new()
        };
        let key = ObjectKey::new("infra", "prod");
        assert_eq!(config.interval_with_jitter(&key), config.interval);
    }

    #[test]
    fn initial_delay_is_within_half_interval() {
        let config = ResyncConfig::new().with_interval(Duration::from_secs(60));
        let key = ObjectKey::new("infra", "prod");
        assert!(config.initial_delay(&key) < Duration::from_secs(30));
    }

    #[test]
    fn tiny_interval_does_not_divide_by_zero() {
        let config = ResyncConfig::new().with_interval(Duration::ZERO);
        let key = ObjectKey::new("infra", "prod");
        assert_eq!(config.initial_delay(&key), Duration::ZERO);
    }
}
