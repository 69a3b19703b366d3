//! Configuration for the memory profiler

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::error::{ProfilerError, ProfilerResult};

/// Main profiler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// Interval between background snapshots (seconds)
    pub snapshot_interval_secs: u64,

    /// Window used for object growth statistics (seconds)
    pub leak_detection_window_secs: u64,

    /// Resident memory above which recommendations fire (MB)
    pub memory_threshold_mb: f64,

    /// Fragmentation ratio above which severity escalates
    pub fragmentation_threshold: f64,

    /// Collect an object census with every snapshot
    pub deep_introspection: bool,

    /// Maximum number of ranked census entries per snapshot
    pub introspection_sample_limit: usize,

    /// Capacity of the snapshot history buffer
    pub max_history: usize,

    /// Directory for persisted reports
    pub report_dir: PathBuf,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_secs: 30,
            leak_detection_window_secs: 300,
            memory_threshold_mb: 1000.0,
            fragmentation_threshold: 0.3,
            deep_introspection: true,
            introspection_sample_limit: 100,
            max_history: 1000,
            report_dir: PathBuf::from("tmp"),
        }
    }
}

impl ProfilerConfig {
    /// Load config from TOML file
    pub fn load(path: &Path) -> ProfilerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to TOML file
    pub fn save(&self, path: &Path) -> ProfilerResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file location (`<config_dir>/memprof/config.toml`)
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("memprof")
            .join("config.toml")
    }

    /// Defaults overridden by `MEMPROF_*` environment variables
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup. Unparseable values are logged and ignored.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var(&lookup, "MEMPROF_SNAPSHOT_INTERVAL") {
            self.snapshot_interval_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "MEMPROF_LEAK_WINDOW") {
            self.leak_detection_window_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "MEMPROF_MEMORY_THRESHOLD_MB") {
            self.memory_threshold_mb = v;
        }
        if let Some(v) = parse_var(&lookup, "MEMPROF_FRAGMENTATION_THRESHOLD") {
            self.fragmentation_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "MEMPROF_DEEP_INTROSPECTION") {
            self.deep_introspection = v;
        }
        if let Some(v) = parse_var(&lookup, "MEMPROF_SAMPLE_LIMIT") {
            self.introspection_sample_limit = v;
        }
        self
    }

    /// Reject values the analyzers cannot work with
    pub fn validate(&self) -> ProfilerResult<()> {
        if self.snapshot_interval_secs == 0 {
            return Err(ProfilerError::Config("snapshot_interval_secs must be > 0".into()));
        }
        if self.max_history == 0 {
            return Err(ProfilerError::Config("max_history must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.fragmentation_threshold) {
            return Err(ProfilerError::Config(format!(
                "fragmentation_threshold {} outside [0, 1]",
                self.fragmentation_threshold
            )));
        }
        if !self.memory_threshold_mb.is_finite() || self.memory_threshold_mb < 0.0 {
            return Err(ProfilerError::Config("memory_threshold_mb must be >= 0".into()));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ProfilerConfig::default();
        assert_eq!(config.snapshot_interval_secs, 30);
        assert_eq!(config.leak_detection_window_secs, 300);
        assert_eq!(config.memory_threshold_mb, 1000.0);
        assert_eq!(config.fragmentation_threshold, 0.3);
        assert!(config.deep_introspection);
        assert_eq!(config.introspection_sample_limit, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MEMPROF_SNAPSHOT_INTERVAL", "5"),
            ("MEMPROF_DEEP_INTROSPECTION", "false"),
            ("MEMPROF_MEMORY_THRESHOLD_MB", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = ProfilerConfig::default()
            .with_env_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.snapshot_interval_secs, 5);
        assert!(!config.deep_introspection);
        assert_eq!(config.memory_threshold_mb, 1000.0);
    }

    #[test]
    fn test_toml_roundtrip_partial() {
        let config: ProfilerConfig = toml::from_str("memory_threshold_mb = 512.0").unwrap();
        assert_eq!(config.memory_threshold_mb, 512.0);
        assert_eq!(config.snapshot_interval_secs, 30);
    }

    #[test]
    fn test_validate_rejects() {
        let config = ProfilerConfig {
            fragmentation_threshold: 1.5,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ProfilerError::Config(_))));
    }
}
