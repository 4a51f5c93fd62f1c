/*
[INPUT]:  YAML configuration file (optional)
[OUTPUT]: Parsed and validated pipeline timing configuration
[POS]:    Configuration layer - input gate, phase, broadcast and log tuning
[UPDATE]: When adding new configuration options
*/

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Top-level configuration for one session
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Click filtering
    #[serde(default)]
    pub input: InputConfig,
    /// Simulated workload cadence
    #[serde(default)]
    pub phase: PhaseConfig,
    /// Progress/error fan-out
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    /// View log retention
    #[serde(default)]
    pub log: LogConfig,
}

/// Debounce and throttle windows for raw clicks
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InputConfig {
    /// Silence required before a click is let through
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Leading throttle window applied to debounced start clicks
    #[serde(default = "default_start_throttle_ms")]
    pub start_throttle_ms: u64,
}

/// Phase simulator cadence
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PhaseConfig {
    /// Delay between two Doing emissions
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// First emitted percent
    #[serde(default = "default_first_percent")]
    pub first_percent: u8,
    /// Last emitted percent; reaching it completes the phase
    #[serde(default = "default_last_percent")]
    pub last_percent: u8,
}

/// Broadcast channel sizing and Stop de-duplication
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BroadcastConfig {
    /// Window in which a cancel Stop collapses into the previous Stop
    #[serde(default = "default_stop_settle_ms")]
    pub stop_settle_ms: u64,
    /// Per-channel buffer; slow subscribers past this lag and skip
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

/// Log retention for views that keep a history
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(default = "default_log_capacity")]
    pub capacity: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            start_throttle_ms: default_start_throttle_ms(),
        }
    }
}

impl Default for PhaseConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            first_percent: default_first_percent(),
            last_percent: default_last_percent(),
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            stop_settle_ms: default_stop_settle_ms(),
            capacity: default_capacity(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            capacity: default_log_capacity(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    150
}

fn default_start_throttle_ms() -> u64 {
    1000
}

fn default_tick_interval_ms() -> u64 {
    25
}

fn default_first_percent() -> u8 {
    1
}

fn default_last_percent() -> u8 {
    100
}

fn default_stop_settle_ms() -> u64 {
    300
}

fn default_capacity() -> usize {
    256
}

fn default_log_capacity() -> usize {
    256
}

impl InputConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn start_throttle(&self) -> Duration {
        Duration::from_millis(self.start_throttle_ms)
    }
}

impl PhaseConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl BroadcastConfig {
    pub fn stop_settle(&self) -> Duration {
        Duration::from_millis(self.stop_settle_ms)
    }
}

impl PipelineConfig {
    /// Load configuration from YAML file and validate it
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.phase.tick_interval_ms == 0 {
            return Err(PipelineError::Config(
                "phase.tick_interval_ms must be greater than 0".to_string(),
            ));
        }
        let (first, last) = (self.phase.first_percent, self.phase.last_percent);
        if first == 0 || last > 100 || first > last {
            return Err(PipelineError::Config(format!(
                "phase percent range must satisfy 1 <= first <= last <= 100 (got {first}..={last})"
            )));
        }
        if self.broadcast.capacity == 0 {
            return Err(PipelineError::Config(
                "broadcast.capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_timings() {
        let config = PipelineConfig::default();
        assert_eq!(config.input.debounce(), Duration::from_millis(150));
        assert_eq!(config.input.start_throttle(), Duration::from_millis(1000));
        assert_eq!(config.phase.tick_interval(), Duration::from_millis(25));
        assert_eq!((config.phase.first_percent, config.phase.last_percent), (1, 100));
        assert_eq!(config.broadcast.stop_settle(), Duration::from_millis(300));
        assert_eq!(config.log.capacity, 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_fields() {
        let config = PipelineConfig::from_yaml(
            "broadcast:\n  stop_settle_ms: 500\nphase:\n  tick_interval_ms: 10\n",
        )
        .unwrap();
        assert_eq!(config.broadcast.stop_settle_ms, 500);
        assert_eq!(config.broadcast.capacity, 256);
        assert_eq!(config.phase.tick_interval_ms, 10);
        assert_eq!(config.phase.last_percent, 100);
        assert_eq!(config.input, InputConfig::default());
    }

    #[test]
    fn validate_rejects_zero_tick_interval() {
        let err = PipelineConfig::from_yaml("phase:\n  tick_interval_ms: 0\n").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn validate_rejects_inverted_percent_range() {
        let err =
            PipelineConfig::from_yaml("phase:\n  first_percent: 60\n  last_percent: 40\n")
                .unwrap_err();
        assert!(err.to_string().contains("60..=40"));
    }

    #[test]
    fn malformed_yaml_is_a_yaml_error() {
        let err = PipelineConfig::from_yaml("input: [not, a, map").unwrap_err();
        assert!(matches!(err, PipelineError::Yaml(_)));
    }
}
