//! Configuration for the command-line front end.
//!
//! Detection constants are fixed in [`crate::constants`]; this only covers
//! logging, camera selection and output paths.

use crate::error::{EmotionDetectorError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Camera configuration
    pub camera: CameraConfig,

    /// Output configuration
    pub output: OutputConfig,
}

/// Log file configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// File the log is written to
    pub file: PathBuf,

    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
}

/// Capture device selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Device index
    pub index: u32,

    /// Requested frame width
    pub width: u32,

    /// Requested frame height
    pub height: u32,

    /// Requested frame rate
    pub fps: u32,
}

/// Where rendered output goes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default path for the composited overlay image
    pub overlay_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("emotion_overlay.log"),
            level: "info".to_string(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| EmotionDetectorError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_yaml::to_string(self)
            .map_err(|e| EmotionDetectorError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.logging.level.trim().is_empty() {
            return Err(EmotionDetectorError::Config(
                "Log level must not be empty".to_string(),
            ));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(EmotionDetectorError::Config(
                "Camera resolution must be non-zero".to_string(),
            ));
        }
        if self.camera.fps == 0 {
            return Err(EmotionDetectorError::Config(
                "Camera FPS must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Example configuration file content
pub const EXAMPLE_CONFIG: &str = r#"# Emotion Overlay Configuration

logging:
  file: "emotion_overlay.log"
  level: "info"

camera:
  index: 0
  width: 640
  height: 480
  fps: 30

output:
  overlay_path: "overlay.png"
"#;
