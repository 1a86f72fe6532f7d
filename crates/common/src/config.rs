//! Application configuration.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReeltextError, ReeltextResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Defaults applied to newly created overlays.
    pub editor: EditorDefaults,

    /// Live compositing settings.
    pub render: RenderSettings,

    /// Export capture settings.
    pub export: ExportSettings,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Defaults for overlays created from the editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorDefaults {
    /// Length of a new overlay's visible window in seconds.
    pub overlay_duration_secs: f64,

    /// Default animation duration in seconds.
    pub animation_duration_secs: f64,

    /// Placeholder text for new overlays.
    pub text: String,

    pub font_family: String,

    pub font_size: f64,
}

/// Frame renderer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Redraw loop rate in Hz.
    pub fps: u32,

    /// Color painted in the letterbox margins (`#rrggbb`).
    pub background: String,

    /// Padding around overlay background boxes, in layout pixels.
    pub text_padding_px: f64,

    /// Backing-store pixels per layout pixel.
    pub pixel_ratio: f64,

    /// Font family name to font file.
    pub fonts: BTreeMap<String, PathBuf>,

    /// Font used when a family is not listed in `fonts`.
    pub default_font: Option<PathBuf>,
}

/// Export capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Frames per second pushed to the recorder.
    pub capture_fps: u32,

    /// Container media type (`video/webm` or `video/mp4`).
    pub mime_type: String,

    pub video_bitrate_kbps: u32,

    pub audio_bitrate_kbps: u32,

    /// Directory that finished artifacts are written to.
    pub output_dir: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reeltext=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for EditorDefaults {
    fn default() -> Self {
        Self {
            overlay_duration_secs: 3.0,
            animation_duration_secs: 1.0,
            text: "Your text".to_string(),
            font_family: "sans-serif".to_string(),
            font_size: 32.0,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            fps: 60,
            background: "#000000".to_string(),
            text_padding_px: 8.0,
            pixel_ratio: 1.0,
            fonts: BTreeMap::new(),
            default_font: None,
        }
    }
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            capture_fps: 30,
            mime_type: "video/webm".to_string(),
            video_bitrate_kbps: 4000,
            audio_bitrate_kbps: 128,
            output_dir: PathBuf::from("."),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path. Unlike [`AppConfig::load`], errors are returned.
    pub fn load_from(path: impl AsRef<Path>) -> ReeltextResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReeltextError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> ReeltextResult<()> {
        if self.render.fps == 0 {
            return Err(ReeltextError::config("render.fps must be at least 1"));
        }
        if self.export.capture_fps == 0 {
            return Err(ReeltextError::config("export.capture_fps must be at least 1"));
        }
        if !(self.render.pixel_ratio.is_finite() && self.render.pixel_ratio > 0.0) {
            return Err(ReeltextError::config("render.pixel_ratio must be positive"));
        }
        if !(self.editor.overlay_duration_secs > 0.0) {
            return Err(ReeltextError::config(
                "editor.overlay_duration_secs must be positive",
            ));
        }
        if !(self.editor.animation_duration_secs > 0.0) {
            return Err(ReeltextError::config(
                "editor.animation_duration_secs must be positive",
            ));
        }
        Ok(())
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("reeltext").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.export.mime_type, "video/webm");
        assert_eq!(config.render.fps, 60);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"export":{"capture_fps":24}}"#).unwrap();
        assert_eq!(config.export.capture_fps, 24);
        assert_eq!(config.export.mime_type, "video/webm");
        assert!((config.editor.overlay_duration_secs - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_load_from_rejects_zero_fps() {
        let dir = std::env::temp_dir().join("reeltext_test_config");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{"render":{"fps":0}}"#).unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ReeltextError::Config { .. }));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = AppConfig::load_from("/nonexistent/reeltext/config.json").unwrap_err();
        assert!(matches!(err, ReeltextError::FileNotFound { .. }));
    }
}
