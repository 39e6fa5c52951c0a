//! Pipeline configuration (`config.toml`)
//!
//! Every field has a default, so a partial or empty file is valid. Settings
//! live in the platform-specific config directory unless a path is given.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scheduler::QualityLevel;
use crate::sort::SortAlgorithm;
use crate::transform::TransformPath;

/// File name inside [`config_dir`]
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(String),
    #[error("invalid config TOML: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables for one [`SplatPipeline`](crate::SplatPipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Frame rate the quality controller aims for (default: 60)
    #[serde(default = "default_target_fps")]
    pub target_fps: f32,
    /// Let measured FPS move the quality level (default: true)
    #[serde(default = "default_true")]
    pub adaptive_quality: bool,
    /// Level at startup (default: high)
    #[serde(default)]
    pub initial_quality: QualityLevel,
    /// Algorithm used on full sorts (default: bucket)
    #[serde(default)]
    pub sort_algorithm: SortAlgorithm,
    /// Arithmetic for batch transforms (default: float)
    #[serde(default)]
    pub transform_path: TransformPath,
    /// Longest wait for one batch to complete (default: 1000)
    #[serde(default = "default_timeout_ms")]
    pub coprocessor_timeout_ms: u64,
    /// Completed waits longer than this count as warnings (default: one 60 Hz frame)
    #[serde(default = "default_long_wait_ms")]
    pub long_wait_ms: f32,
    /// Emit an error-level summary every this many warnings (default: 10)
    #[serde(default = "default_warning_escalation")]
    pub warning_escalation: u32,
    /// Halve batches for a frame when FPS falls below this share of target (default: 0.8)
    #[serde(default = "default_throttle_ratio")]
    pub throttle_ratio: f32,
    /// Move up a level at or above this share of target (default: 1.1)
    #[serde(default = "default_upgrade_ratio")]
    pub upgrade_ratio: f32,
    /// Move down a level below this share of target (default: 0.9)
    #[serde(default = "default_downgrade_ratio")]
    pub downgrade_ratio: f32,
    /// Frame rate comes from the host through `record_fps_sample`, not from
    /// timing `render_frame` (default: false)
    #[serde(default)]
    pub external_fps: bool,
}

fn default_target_fps() -> f32 {
    60.0
}
fn default_true() -> bool {
    true
}
fn default_timeout_ms() -> u64 {
    1000
}
fn default_long_wait_ms() -> f32 {
    16.67
}
fn default_warning_escalation() -> u32 {
    10
}
fn default_throttle_ratio() -> f32 {
    0.8
}
fn default_upgrade_ratio() -> f32 {
    1.1
}
fn default_downgrade_ratio() -> f32 {
    0.9
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_fps: default_target_fps(),
            adaptive_quality: default_true(),
            initial_quality: QualityLevel::default(),
            sort_algorithm: SortAlgorithm::default(),
            transform_path: TransformPath::default(),
            coprocessor_timeout_ms: default_timeout_ms(),
            long_wait_ms: default_long_wait_ms(),
            warning_escalation: default_warning_escalation(),
            throttle_ratio: default_throttle_ratio(),
            upgrade_ratio: default_upgrade_ratio(),
            downgrade_ratio: default_downgrade_ratio(),
            external_fps: false,
        }
    }
}

impl PipelineConfig {
    pub fn coprocessor_timeout(&self) -> Duration {
        Duration::from_millis(self.coprocessor_timeout_ms)
    }

    pub fn long_wait(&self) -> Duration {
        Duration::from_secs_f32(self.long_wait_ms.max(0.0) / 1000.0)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Write as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Io(format!("{}: {e}", parent.display())))?;
        }
        let content = self.to_toml_string()?;
        std::fs::write(path, content)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))
    }

    /// Load `config.toml` from [`config_dir`], or defaults if there is none.
    ///
    /// A file that exists but fails to parse or validate is an error.
    pub fn load_default() -> Result<Self, ConfigError> {
        match default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.target_fps.is_finite() && self.target_fps > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "target_fps must be positive, got {}",
                self.target_fps
            )));
        }
        if self.coprocessor_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "coprocessor_timeout_ms must be non-zero".to_string(),
            ));
        }
        for (name, value) in [
            ("throttle_ratio", self.throttle_ratio),
            ("upgrade_ratio", self.upgrade_ratio),
            ("downgrade_ratio", self.downgrade_ratio),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.downgrade_ratio >= self.upgrade_ratio {
            return Err(ConfigError::Invalid(format!(
                "downgrade_ratio ({}) must be below upgrade_ratio ({})",
                self.downgrade_ratio, self.upgrade_ratio
            )));
        }
        if self.warning_escalation == 0 {
            return Err(ConfigError::Invalid(
                "warning_escalation must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\Splatstorm\config`
/// On macOS: `~/Library/Application Support/io.splatstorm.Splatstorm`
/// On Linux: `~/.config/Splatstorm`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.splatstorm", "", "Splatstorm")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// `config.toml` inside [`config_dir`]
pub fn default_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    // =============================================================
    // Default value tests
    // =============================================================

    #[test]
    fn test_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.target_fps, 60.0);
        assert!(config.adaptive_quality);
        assert_eq!(config.initial_quality, QualityLevel::High);
        assert_eq!(config.sort_algorithm, SortAlgorithm::Bucket);
        assert_eq!(config.transform_path, TransformPath::Float);
        assert_eq!(config.coprocessor_timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_deserialize_empty() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_config_deserialize_partial() {
        let toml_str = r#"
target_fps = 30.0
initial_quality = "low"
sort_algorithm = "radix"
transform_path = "fixed"
"#;
        let config = PipelineConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.target_fps, 30.0);
        assert_eq!(config.initial_quality, QualityLevel::Low);
        assert_eq!(config.sort_algorithm, SortAlgorithm::Radix);
        assert_eq!(config.transform_path, TransformPath::Fixed);
        assert!(config.adaptive_quality); // default
        assert!(!config.external_fps); // default
        assert_eq!(config.warning_escalation, 10); // default
    }

    // =============================================================
    // Validation tests
    // =============================================================

    #[test]
    fn test_rejects_bad_values() {
        let cases = [
            "target_fps = 0.0",
            "target_fps = -5.0",
            "coprocessor_timeout_ms = 0",
            "warning_escalation = 0",
            "upgrade_ratio = 0.9\ndowngrade_ratio = 0.9",
        ];
        for case in cases {
            assert!(
                matches!(
                    PipelineConfig::from_toml_str(case),
                    Err(ConfigError::Invalid(_))
                ),
                "{case}"
            );
        }
    }

    #[test]
    fn test_rejects_non_finite_ratios() {
        for field in ["throttle_ratio", "upgrade_ratio", "downgrade_ratio"] {
            let config = PipelineConfig::from_toml_str(&format!("{field} = nan"));
            assert!(matches!(config, Err(ConfigError::Invalid(_))), "{field}");
        }

        let config = PipelineConfig {
            upgrade_ratio: f32::INFINITY,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_toml() {
        let err = PipelineConfig::from_toml_str("target_fps = [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = PipelineConfig::from_toml_str("initial_quality = \"extreme\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    // =============================================================
    // File round trip
    // =============================================================

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let config = PipelineConfig {
            target_fps: 50.0,
            adaptive_quality: false,
            initial_quality: QualityLevel::Ultra,
            sort_algorithm: SortAlgorithm::Quick,
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
