use anyhow::bail;
use serde::{Deserialize, Serialize};

const DEFAULT_CONCURRENT_PINS: usize = 10;
const DEFAULT_MAX_PIN_QUEUE_SIZE: usize = 1_000_000;

/// Pin tracker section of the peer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Number of workers per queue. Pin and unpin queues each get this
    /// many, so up to `2 * concurrent_pins` daemon calls run at once.
    #[serde(default = "default_concurrent_pins")]
    pub concurrent_pins: usize,

    /// Capacity of each operation queue. Enqueueing beyond it fails the
    /// operation instead of blocking the caller.
    #[serde(default = "default_max_pin_queue_size")]
    pub max_pin_queue_size: usize,
}

fn default_concurrent_pins() -> usize {
    DEFAULT_CONCURRENT_PINS
}

fn default_max_pin_queue_size() -> usize {
    DEFAULT_MAX_PIN_QUEUE_SIZE
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            concurrent_pins: DEFAULT_CONCURRENT_PINS,
            max_pin_queue_size: DEFAULT_MAX_PIN_QUEUE_SIZE,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.concurrent_pins == 0 {
            bail!("tracker.concurrent_pins must be at least 1");
        }
        if self.max_pin_queue_size == 0 {
            bail!("tracker.max_pin_queue_size must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let cfg = TrackerConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.concurrent_pins, 10);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let cfg = TrackerConfig {
            concurrent_pins: 0,
            ..TrackerConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let cfg: TrackerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, TrackerConfig::default());
    }
}
