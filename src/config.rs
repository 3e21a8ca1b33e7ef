//! CLI configuration
//!
//! Stored in ~/.config/stash/config.json. Every field is optional; missing
//! fields and a missing file fall back to defaults.

use crate::store::DEFAULT_COMPRESSION_LEVEL;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Asset name used when none is configured
pub const DEFAULT_ASSET: &str = "stash";

/// Where and how the `stash` tool keeps its data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StashConfig {
    /// Root directory of the local blob store
    pub location: PathBuf,
    /// Asset the stash is persisted as
    pub asset: String,
    /// zstd level for stored objects; 0 disables compression
    pub compression_level: i32,
}

impl Default for StashConfig {
    fn default() -> Self {
        StashConfig {
            location: default_location(),
            asset: DEFAULT_ASSET.to_string(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl StashConfig {
    /// Default config file path (~/.config/stash/config.json)
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".into()))?;
        Ok(config_dir.join("stash").join("config.json"))
    }

    /// Load from the default path, or defaults if it does not exist
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path()?)
    }

    /// Load from `path`, or defaults if it does not exist
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Write to `path`, creating parent directories
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {}", e)))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))
    }
}

fn default_location() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("stash"))
        .unwrap_or_else(|| PathBuf::from(".stash"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = StashConfig::load_from(dir.path().join("none.json")).unwrap();
        assert_eq!(config, StashConfig::default());
        assert_eq!(config.asset, DEFAULT_ASSET);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "asset": "tags" }"#).unwrap();

        let config = StashConfig::load_from(&path).unwrap();
        assert_eq!(config.asset, "tags");
        assert_eq!(config.compression_level, DEFAULT_COMPRESSION_LEVEL);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = StashConfig {
            location: dir.path().join("data"),
            asset: "bookmarks".into(),
            compression_level: 0,
        };

        config.save_to(&path).unwrap();
        assert_eq!(StashConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            StashConfig::load_from(&path),
            Err(Error::Config(_))
        ));
    }
}
