//! # Configuration Management
//!
//! Configuration for the registry core, stored as JSON. Every section carries
//! defaults so a partial file (or none at all) yields a working setup.
//!
//! - [`StorageConfig`]: where artifacts are written
//! - [`LimitsConfig`]: size and length bounds applied during validation
//! - [`SearchConfig`]: search result bounds
//!
//! ```rust,no_run
//! # use registry_core::config::RegistryConfig;
//! // Load from file with fallback to defaults
//! let config = RegistryConfig::load_or_default("registry.json")?;
//! # Ok::<(), registry_core::RegistryError>(())
//! ```

use crate::error::RegistryResult;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default maximum artifact size (5 MiB)
pub const DEFAULT_MAX_ARTIFACT_SIZE: u64 = 5 * 1024 * 1024;

/// Default maximum description length
pub const DEFAULT_MAX_DESCRIPTION_LENGTH: usize = 4096;

/// Default maximum package name length
pub const DEFAULT_MAX_PACKAGE_NAME_LENGTH: usize = 214;

/// Default number of search hits requested from the engine
pub const DEFAULT_MAX_SEARCH_HITS: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory for registry data
    pub data_dir: PathBuf,
    /// Artifact directory, relative to `data_dir`
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            artifacts_dir: default_artifacts_dir(),
        }
    }
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum decoded artifact size in bytes
    pub max_artifact_size: u64,
    pub max_description_length: usize,
    pub max_package_name_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_artifact_size: DEFAULT_MAX_ARTIFACT_SIZE,
            max_description_length: DEFAULT_MAX_DESCRIPTION_LENGTH,
            max_package_name_length: DEFAULT_MAX_PACKAGE_NAME_LENGTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_hits: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_hits: DEFAULT_MAX_SEARCH_HITS,
        }
    }
}

impl RegistryConfig {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> RegistryResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from file, or use defaults when the file is missing
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> RegistryResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> RegistryResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Absolute (or data-dir relative) location of stored artifacts
    pub fn artifacts_path(&self) -> PathBuf {
        self.storage.data_dir.join(&self.storage.artifacts_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.limits.max_artifact_size, 5 * 1024 * 1024);
        assert_eq!(config.search.max_hits, 20);
        assert_eq!(config.artifacts_path(), PathBuf::from("./data/artifacts"));
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("registry.json");
        fs::write(
            &path,
            r#"{"storage": {"data_dir": "/srv/registry"}, "limits": {"max_artifact_size": 1024}}"#,
        )
        .unwrap();

        let config = RegistryConfig::load(&path).unwrap();
        assert_eq!(config.storage.artifacts_dir, PathBuf::from("artifacts"));
        assert_eq!(config.limits.max_artifact_size, 1024);
        assert_eq!(config.limits.max_description_length, 4096);
        assert_eq!(config.search, SearchConfig::default());
    }

    #[test]
    fn test_save_and_load_or_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/registry.json");

        let missing = RegistryConfig::load_or_default(&path).unwrap();
        assert_eq!(missing, RegistryConfig::default());

        let mut config = RegistryConfig::default();
        config.search.max_hits = 5;
        config.save(&path).unwrap();
        assert_eq!(RegistryConfig::load_or_default(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("registry.json");
        fs::write(&path, "{not json").unwrap();
        assert!(RegistryConfig::load(&path).is_err());
    }
}
