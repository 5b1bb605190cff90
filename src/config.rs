//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILSHRINK_CONFIG` (environment variable)
//! 2. `~/.config/mailshrink/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailshrink\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShrinkError};
use crate::imaging::{OutputFormat, Quality};

/// Largest side a baseline JPEG can encode.
const JPEG_MAX_SIDE: u32 = 65_535;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Image rewriting settings.
    pub transform: TransformConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// How eligible images are rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// Maximum output width in pixels.
    pub max_width: u32,
    /// Maximum output height in pixels.
    pub max_height: u32,
    /// Encoder quality (1-100).
    pub quality: Quality,
    /// Output format. Only `"jpeg"` exists.
    pub output_format: OutputFormat,
    /// Keep the source EXIF block (orientation reset to 1).
    pub preserve_exif: bool,
    /// Inline images (or images with no disposition) are only rewritten
    /// when they carry a Content-ID.
    pub inline_requires_content_id: bool,
    /// Transform sibling parts on the rayon thread pool.
    pub parallel: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1080,
            quality: Quality::default(),
            output_format: OutputFormat::default(),
            preserve_exif: true,
            inline_requires_content_id: true,
            parallel: false,
        }
    }
}

impl TransformConfig {
    /// Reject bounds the encoder cannot honor.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("max_width", self.max_width), ("max_height", self.max_height)] {
            if value == 0 {
                return Err(ShrinkError::Config(format!("{name} must be positive")));
            }
            if value > JPEG_MAX_SIDE {
                return Err(ShrinkError::Config(format!(
                    "{name} {value} exceeds the JPEG limit of {JPEG_MAX_SIDE}"
                )));
            }
        }
        Ok(())
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILSHRINK_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailshrink").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailshrink")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mailshrink.log")
}
