//! Tool configuration from `/etc/signal-booster/config.toml`.
//!
//! Loading is tolerant: a missing or malformed file falls back to the
//! defaults with a warning, and out-of-range values are clamped rather
//! than rejected. CLI flags always win over file values.

use crate::levels::OptimizationLevel;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Probe settings: where and how much to ping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSettings {
    #[serde(default = "default_ping_target")]
    pub ping_target: String,

    /// Packets per full latency measurement (valid: 1-20).
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,
}

fn default_ping_target() -> String {
    "1.1.1.1".to_string()
}

fn default_ping_count() -> u32 {
    5
}

impl ProbeSettings {
    pub fn effective_ping_count(&self) -> u32 {
        self.ping_count.clamp(1, 20)
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        ProbeSettings {
            ping_target: default_ping_target(),
            ping_count: default_ping_count(),
        }
    }
}

/// Monitor loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Seconds between samples (valid: 1-300).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Consecutive probe failures before monitoring degrades (valid: 1-10).
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

fn default_interval_secs() -> u64 {
    1
}

fn default_max_consecutive_failures() -> u32 {
    3
}

impl MonitorSettings {
    pub fn effective_interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.clamp(1, 300))
    }

    pub fn effective_max_failures(&self) -> u32 {
        self.max_consecutive_failures.clamp(1, 10)
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        MonitorSettings {
            interval_secs: default_interval_secs(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

/// Optimization defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizeSettings {
    #[serde(default)]
    pub default_level: OptimizationLevel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoosterConfig {
    #[serde(default)]
    pub probe: ProbeSettings,

    #[serde(default)]
    pub monitor: MonitorSettings,

    #[serde(default)]
    pub optimize: OptimizeSettings,
}

impl BoosterConfig {
    /// Load from the default location (or its env override).
    pub fn load() -> Self {
        Self::load_from(&paths::config_file())
    }

    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = fs::read_to_string(path) else {
            return Self::default();
        };
        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "config file is invalid, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = BoosterConfig::default();
        assert_eq!(config.probe.ping_target, "1.1.1.1");
        assert_eq!(config.probe.ping_count, 5);
        assert_eq!(config.monitor.interval_secs, 1);
        assert_eq!(config.monitor.max_consecutive_failures, 3);
        assert_eq!(config.optimize.default_level, OptimizationLevel::Standard);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let config = BoosterConfig::load_from(&temp.path().join("missing.toml"));
        assert_eq!(config.probe.ping_target, "1.1.1.1");
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "[probe\nping_target = ").unwrap();
        let config = BoosterConfig::load_from(&path);
        assert_eq!(config.monitor.interval_secs, 1);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(
            &path,
            "[probe]\nping_target = \"9.9.9.9\"\n\n[optimize]\ndefault_level = \"aggressive\"\n",
        )
        .unwrap();

        let config = BoosterConfig::load_from(&path);
        assert_eq!(config.probe.ping_target, "9.9.9.9");
        assert_eq!(config.probe.ping_count, 5);
        assert_eq!(config.optimize.default_level, OptimizationLevel::Aggressive);
        assert_eq!(config.monitor.max_consecutive_failures, 3);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let monitor = MonitorSettings {
            interval_secs: 0,
            max_consecutive_failures: 99,
        };
        assert_eq!(monitor.effective_interval(), Duration::from_secs(1));
        assert_eq!(monitor.effective_max_failures(), 10);

        let probe = ProbeSettings {
            ping_target: "1.1.1.1".to_string(),
            ping_count: 500,
        };
        assert_eq!(probe.effective_ping_count(), 20);
    }
}
