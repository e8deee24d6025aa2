//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$EVOCACHE_CONFIG` (environment variable)
//! 2. `~/.config/evocache/config.toml` (Linux/macOS)
//!    `%APPDATA%\evocache\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::extract::ExtractOptions;
use crate::store::reader::DEFAULT_READ_BUFFER;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Extraction defaults.
    pub extract: ExtractConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override directory for the log file.
    pub log_dir: Option<PathBuf>,
}

/// Extraction defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Appended to the archive path when no output directory is given.
    pub output_suffix: String,
    /// Copy entry timestamps onto extracted files.
    pub preserve_mtime: bool,
    /// Content stream read buffer in bytes (default: 65536 = 64 KB).
    pub read_buffer_size: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: None,
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            output_suffix: "_extracted".to_string(),
            preserve_mtime: true,
            read_buffer_size: DEFAULT_READ_BUFFER,
        }
    }
}

impl ExtractConfig {
    /// Options for the extractor.
    pub fn options(&self) -> ExtractOptions {
        ExtractOptions {
            preserve_mtime: self.preserve_mtime,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

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

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("EVOCACHE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("evocache").join("config.toml"))
}

/// Return the directory for the log file.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("evocache")
}
