//! Watermark Configuration
//!
//! Recognized options of the overlay, loadable from TOML or JSON.
//! Millisecond fields mirror how the host page configures the watermark.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use vwm_detect::DetectionMode;
use vwm_timing::{DwellTimes, UpdateCadence};

/// Default tamper check interval
pub const DEFAULT_DETECTION_INTERVAL_MS: u64 = 5_000;

/// Default bounds of the randomized move cadence
pub const DEFAULT_RANDOM_UPDATE_MIN_MS: u64 = 5_000;
pub const DEFAULT_RANDOM_UPDATE_MAX_MS: u64 = 20_000;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// How the watermark is laid out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkMode {
    /// Repeated diagonal lines of text covering the whole video
    #[default]
    Stripes,
    /// A single text field placed at a random position
    Random,
}

impl From<WatermarkMode> for DetectionMode {
    fn from(mode: WatermarkMode) -> Self {
        match mode {
            WatermarkMode::Stripes => DetectionMode::Stripes,
            WatermarkMode::Random => DetectionMode::Random,
        }
    }
}

/// Overlay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    /// Watermark text
    pub text: String,
    pub mode: WatermarkMode,
    /// Time spent hidden before showing again
    pub visible_timeout_ms: Option<u64>,
    /// Time spent visible before hiding
    pub hidden_timeout_ms: Option<u64>,
    /// Fixed move interval for an always-visible random field
    pub update_timeout_ms: Option<u64>,
    pub random_update_min_ms: u64,
    pub random_update_max_ms: u64,
    /// 0 disables tamper detection
    pub modification_detection_interval_ms: u64,
    pub base_font_size: Option<f64>,
    /// Font scale per 100px of the smaller container side
    pub scale_by_size: Option<f64>,
    /// Explicit container size; measured from the node when absent
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Offset of the overlay inside the player
    pub x: Option<i32>,
    pub y: Option<i32>,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            text: String::new(),
            mode: WatermarkMode::Stripes,
            visible_timeout_ms: None,
            hidden_timeout_ms: None,
            update_timeout_ms: None,
            random_update_min_ms: DEFAULT_RANDOM_UPDATE_MIN_MS,
            random_update_max_ms: DEFAULT_RANDOM_UPDATE_MAX_MS,
            modification_detection_interval_ms: DEFAULT_DETECTION_INTERVAL_MS,
            base_font_size: None,
            scale_by_size: None,
            width: None,
            height: None,
            x: None,
            y: None,
        }
    }
}

impl WatermarkConfig {
    /// Create a configuration with the given text and defaults elsewhere
    pub fn new(text: impl Into<String>, mode: WatermarkMode) -> Self {
        Self {
            text: text.into(),
            mode,
            ..Default::default()
        }
    }

    /// Configuration used by the demo binary
    pub fn demo() -> Self {
        Self {
            text: "user@example.com 203.0.113.7".to_string(),
            mode: WatermarkMode::Random,
            visible_timeout_ms: Some(2_000),
            hidden_timeout_ms: Some(4_000),
            modification_detection_interval_ms: 1_000,
            base_font_size: Some(4.0),
            scale_by_size: Some(1.0),
            ..Default::default()
        }
    }

    /// Check option consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.random_update_min_ms > self.random_update_max_ms {
            return Err(ConfigError::Invalid(format!(
                "random_update_min_ms ({}) exceeds random_update_max_ms ({})",
                self.random_update_min_ms, self.random_update_max_ms
            )));
        }
        if self.random_update_min_ms == 0 {
            return Err(ConfigError::Invalid("random_update_min_ms must be positive".into()));
        }
        for (name, value) in [("base_font_size", self.base_font_size), ("scale_by_size", self.scale_by_size)] {
            if let Some(v) = value {
                if !v.is_finite() || v <= 0.0 {
                    return Err(ConfigError::Invalid(format!("{} must be positive, got {}", name, v)));
                }
            }
        }
        Ok(())
    }

    /// Show/hide dwell times, if both are configured and positive
    pub fn dwell_times(&self) -> Option<DwellTimes> {
        DwellTimes::from_millis(self.visible_timeout_ms, self.hidden_timeout_ms)
    }

    /// Move cadence of an always-visible random field
    pub fn update_cadence(&self) -> UpdateCadence {
        UpdateCadence::from_millis(
            self.update_timeout_ms,
            self.random_update_min_ms,
            self.random_update_max_ms,
        )
    }

    /// Tamper check interval, `None` when detection is disabled
    pub fn detection_interval(&self) -> Option<Duration> {
        (self.modification_detection_interval_ms > 0)
            .then(|| Duration::from_millis(self.modification_detection_interval_ms))
    }

    /// Load from a TOML or JSON file, by extension
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_file(path),
            _ => Self::from_toml_file(path),
        }
    }

    /// Load from TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Load from TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_json(&content)
    }

    /// Load from JSON string
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WatermarkConfig::default();
        assert_eq!(config.mode, WatermarkMode::Stripes);
        assert_eq!(config.detection_interval(), Some(Duration::from_secs(5)));
        assert!(config.dwell_times().is_none());
        assert_eq!(config.update_cadence(), UpdateCadence::default());
    }

    #[test]
    fn test_parse_toml() {
        let config = WatermarkConfig::from_toml(
            r#"
            text = "viewer 42"
            mode = "random"
            visible_timeout_ms = 1000
            hidden_timeout_ms = 2000
            base_font_size = 3.0
            scale_by_size = 1.5
            width = 640
            "#,
        )
        .unwrap();

        assert_eq!(config.text, "viewer 42");
        assert_eq!(config.mode, WatermarkMode::Random);
        assert_eq!(
            config.dwell_times(),
            DwellTimes::new(Duration::from_secs(1), Duration::from_secs(2))
        );
        assert_eq!(config.width, Some(640));
        assert_eq!(config.height, None);
        assert_eq!(config.modification_detection_interval_ms, DEFAULT_DETECTION_INTERVAL_MS);
    }

    #[test]
    fn test_parse_json() {
        let config = WatermarkConfig::from_json(
            r#"{"text": "abc", "update_timeout_ms": 7000, "modification_detection_interval_ms": 0}"#,
        )
        .unwrap();

        assert_eq!(config.update_cadence(), UpdateCadence::Fixed(Duration::from_secs(7)));
        assert!(config.detection_interval().is_none());
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let result = WatermarkConfig::from_toml(r#"mode = "diagonal""#);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validate() {
        let mut config = WatermarkConfig::default();
        config.random_update_min_ms = 30_000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = WatermarkConfig::default();
        config.base_font_size = Some(0.0);
        assert!(config.validate().is_err());

        let mut config = WatermarkConfig::default();
        config.scale_by_size = Some(f64::NAN);
        assert!(config.validate().is_err());

        assert!(WatermarkConfig::demo().validate().is_ok());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = WatermarkConfig::demo();
        let parsed = WatermarkConfig::from_toml(&config.to_toml()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_missing_file() {
        let result = WatermarkConfig::from_file(Path::new("/nonexistent/watermark.toml"));
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
