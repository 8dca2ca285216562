use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Tuning for the sequence controller.
/// These values are empirically tuned against device clock jitter, so they
/// are loaded from config rather than baked in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceTuning {
    /// Seconds. Slack for every segment boundary comparison.
    pub boundary_tolerance: f64,
    /// Grace period at a segment end before advancing.
    pub dwell_ms: u64,
    /// Consecutive stale ticks before the expected position is dropped.
    pub max_stale_time_count: u32,
    /// Ticks to wait for the first trustworthy time after a load.
    pub max_settling_count: u32,
    /// Re-seeks issued while settling before the stale time is trusted.
    pub max_reseek_attempts: u32,
    /// Consecutive valid ticks that confirm a seek has landed.
    pub valid_ticks_to_confirm: u32,
    /// Seconds a reported time may deviate from the expected position.
    pub stale_deviation: f64,
    /// Seconds a reported time may run past the segment end.
    pub stale_overrun: f64,
    /// Seconds after a segment start still accepted as settled.
    pub settle_window: f64,
}

impl Default for SequenceTuning {
    fn default() -> Self {
        Self {
            boundary_tolerance: 0.1,
            dwell_ms: 250,
            max_stale_time_count: 10,
            max_settling_count: 30,
            max_reseek_attempts: 3,
            valid_ticks_to_confirm: 3,
            stale_deviation: 1.0,
            stale_overrun: 0.5,
            settle_window: 1.0,
        }
    }
}

impl SequenceTuning {
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub sample_interval_ms: u64,
    pub flush_interval_secs: u64,
    /// Accumulated seconds below this are not worth a request.
    pub min_delta: f64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 1000,
            flush_interval_secs: 30,
            min_delta: 1.0,
        }
    }
}

impl HeartbeatConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cadence of the time observer that feeds the controller.
    pub time_observer_ms: u64,
    pub default_volume: f32,
    /// Seconds used by remote skip-forward/backward without an explicit interval.
    pub skip_interval: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            time_observer_ms: 50,
            default_volume: 1.0,
            skip_interval: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sequence: SequenceTuning,
    pub heartbeat: HeartbeatConfig,
    pub engine: EngineConfig,
    pub api: ApiConfig,
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.sequence;
        if !(s.boundary_tolerance > 0.0) {
            return Err(Error::Config("sequence.boundary_tolerance must be positive".into()));
        }
        if !(s.stale_deviation > 0.0) || !(s.stale_overrun > 0.0) || !(s.settle_window > 0.0) {
            return Err(Error::Config("sequence stale/settle windows must be positive".into()));
        }
        if s.max_stale_time_count == 0 || s.max_settling_count == 0 || s.valid_ticks_to_confirm == 0 {
            return Err(Error::Config("sequence counters must be non-zero".into()));
        }
        if self.heartbeat.sample_interval_ms == 0 || self.heartbeat.flush_interval_secs == 0 {
            return Err(Error::Config("heartbeat intervals must be non-zero".into()));
        }
        if self.heartbeat.min_delta < 0.0 {
            return Err(Error::Config("heartbeat.min_delta must not be negative".into()));
        }
        if self.engine.time_observer_ms == 0 {
            return Err(Error::Config("engine.time_observer_ms must be non-zero".into()));
        }
        if !(0.0..=1.0).contains(&self.engine.default_volume) {
            return Err(Error::Config("engine.default_volume must be within 0..=1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [sequence]
            dwell_ms = 400
            max_stale_time_count = 5

            [heartbeat]
            flush_interval_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.sequence.dwell(), Duration::from_millis(400));
        assert_eq!(config.sequence.max_stale_time_count, 5);
        assert_eq!(config.sequence.boundary_tolerance, 0.1);
        assert_eq!(config.heartbeat.flush_interval(), Duration::from_secs(60));
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn zero_counters_are_rejected() {
        let err = Config::from_toml_str("[sequence]\nmax_settling_count = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
