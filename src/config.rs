//! Application configuration
//!
//! Loaded from `config.toml` in the platform config directory. Every
//! section falls back to defaults, so a missing or partial file is fine.

use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{Error, Result};

/// Environment variable overriding `api.base_url`
pub const API_URL_ENV: &str = "MANIFEST_API_URL";

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub mixer: MixerConfig,
    pub output: OutputConfig,
    pub downloads: DownloadConfig,
}

/// Backend connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout_secs: 60,
        }
    }
}

/// Initial mix settings for a freshly mounted player
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    pub voice_volume: u8,
    pub background_volume: u8,
    pub background_enabled: bool,
    pub default_track_id: String,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            voice_volume: DEFAULT_VOICE_VOLUME,
            background_volume: DEFAULT_BACKGROUND_VOLUME,
            background_enabled: true,
            default_track_id: DEFAULT_TRACK_ID.to_string(),
        }
    }
}

/// Where rendered audio goes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputBackend {
    /// A cpal output device
    Device,
    /// No device; the owner drives rendering (tests, offline use)
    Headless,
}

/// Output context settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub backend: OutputBackend,
    /// Device id as produced by `audio::device::list_output_devices`
    pub device_id: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    /// How often the session driver calls `MixSession::tick`
    pub tick_interval_ms: u64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            backend: OutputBackend::Device,
            device_id: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            tick_interval_ms: 50,
        }
    }
}

impl OutputConfig {
    /// Headless output at the default format
    pub fn headless() -> Self {
        Self {
            backend: OutputBackend::Headless,
            ..Default::default()
        }
    }
}

/// Download destination
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub directory: Option<PathBuf>,
}

impl DownloadConfig {
    /// Configured directory, else the user's download dir, else the cwd
    pub fn resolve_dir(&self) -> PathBuf {
        if let Some(dir) = &self.directory {
            return dir.clone();
        }
        UserDirs::new()
            .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl AppConfig {
    /// Path of the config file in the platform config directory
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "manifest", "manifest-mixer")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from the default location, applying environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                config.api.base_url = url;
            }
        }
        Ok(config)
    }

    /// Load from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Write to an explicit path, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Write to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()
            .ok_or_else(|| Error::Config("No config directory available".to_string()))?;
        self.save_to(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [api]
            base_url = "http://backend:9000"

            [output]
            backend = "headless"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "http://backend:9000");
        assert_eq!(config.api.timeout_secs, 60);
        assert_eq!(config.output.backend, OutputBackend::Headless);
        assert_eq!(config.output.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(config.mixer.background_volume, 20);
        assert!(config.mixer.background_enabled);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AppConfig::from_toml("[api\nbase_url = 1").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.mixer.voice_volume = 80;
        config.downloads.directory = Some(dir.path().to_path_buf());
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.mixer.voice_volume, 80);
        assert_eq!(loaded.downloads.resolve_dir(), dir.path());
    }
}
