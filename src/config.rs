//! Split and manifest settings persisted as `config.toml` in the app directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs;
use crate::dataset::DEFAULT_LABEL_FIELD;
use crate::dataset::manifest::ManifestOptions;
use crate::dataset::split::{SplitError, SplitRatios};

/// Default filename used to store the configuration.
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Seed used when none is configured.
pub const DEFAULT_SEED: &str = "stratify-v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to create config directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config to TOML at {path}: {source}")]
    SerializeToml {
        path: PathBuf,
        source: toml::ser::Error,
    },
    #[error("No suitable config directory found: {0}")]
    NoConfigDir(#[from] app_dirs::AppDirError),
    #[error("Manifest delimiter must be a single ASCII character, got {0:?}")]
    InvalidDelimiter(char),
}

/// Aggregate settings loaded from `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub split: SplitSettings,
    #[serde(default)]
    pub manifest: ManifestSettings,
}

/// Ratios, seed and stratification field for a split run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitSettings {
    #[serde(default = "default_train_ratio")]
    pub train_ratio: f64,
    #[serde(default = "default_val_ratio")]
    pub val_ratio: f64,
    #[serde(default = "default_test_ratio")]
    pub test_ratio: f64,
    #[serde(default = "default_seed")]
    pub seed: String,
    #[serde(default = "default_label_field")]
    pub label_field: String,
}

impl Default for SplitSettings {
    fn default() -> Self {
        Self {
            train_ratio: default_train_ratio(),
            val_ratio: default_val_ratio(),
            test_ratio: default_test_ratio(),
            seed: default_seed(),
            label_field: default_label_field(),
        }
    }
}

impl SplitSettings {
    /// Validate the configured fractions.
    pub fn ratios(&self) -> Result<SplitRatios, SplitError> {
        SplitRatios::new(self.train_ratio, self.val_ratio, self.test_ratio)
    }
}

/// How manifest files are parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestSettings {
    #[serde(default = "default_identifier_field")]
    pub identifier_field: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default = "default_has_headers")]
    pub has_headers: bool,
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            identifier_field: default_identifier_field(),
            delimiter: default_delimiter(),
            has_headers: default_has_headers(),
        }
    }
}

impl ManifestSettings {
    pub fn options(&self) -> Result<ManifestOptions, ConfigError> {
        if !self.delimiter.is_ascii() {
            return Err(ConfigError::InvalidDelimiter(self.delimiter));
        }
        Ok(ManifestOptions {
            identifier_field: self.identifier_field.clone(),
            delimiter: self.delimiter as u8,
            has_headers: self.has_headers,
        })
    }
}

fn default_train_ratio() -> f64 {
    0.7
}

fn default_val_ratio() -> f64 {
    0.2
}

fn default_test_ratio() -> f64 {
    0.1
}

fn default_seed() -> String {
    DEFAULT_SEED.to_string()
}

fn default_label_field() -> String {
    DEFAULT_LABEL_FIELD.to_string()
}

fn default_identifier_field() -> String {
    "path".to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_has_headers() -> bool {
    true
}

/// Resolve the configuration file path inside the app directory.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME))
}

/// Load configuration from the app directory, returning defaults if missing.
pub fn load_or_default() -> Result<AppConfig, ConfigError> {
    load_from(&config_path()?)
}

/// Load configuration from `path`, returning defaults if the file is missing.
pub fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

/// Persist configuration to the app directory.
pub fn save(config: &AppConfig) -> Result<(), ConfigError> {
    save_to_path(config, &config_path()?)
}

/// Save configuration to a specific path, creating parent directories as needed.
pub fn save_to_path(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let text = toml::to_string_pretty(config).map_err(|source| ConfigError::SerializeToml {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, text).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = load_from(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.split.ratios().unwrap(), SplitRatios::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "[split]\nseed = \"birds\"\n\n[manifest]\ndelimiter = \"\\t\"\n",
        )
        .unwrap();
        let config = load_from(&path).unwrap();
        assert_eq!(config.split.seed, "birds");
        assert_eq!(config.split.train_ratio, 0.7);
        assert_eq!(config.manifest.options().unwrap().delimiter, b'\t');
        assert!(config.manifest.has_headers);
    }

    #[test]
    fn saved_config_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut config = AppConfig::default();
        config.split.train_ratio = 0.8;
        config.split.val_ratio = 0.1;
        config.manifest.identifier_field = "file".to_string();
        save_to_path(&config, &path).unwrap();
        assert_eq!(load_from(&path).unwrap(), config);
    }

    #[test]
    fn invalid_toml_is_reported_with_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[split\n").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseToml { path: p, .. } if p == path));
    }

    #[test]
    fn configured_ratios_are_validated() {
        let settings = SplitSettings {
            test_ratio: 0.05,
            ..SplitSettings::default()
        };
        assert!(matches!(
            settings.ratios(),
            Err(SplitError::InvalidRatio { .. })
        ));
    }

    #[test]
    fn non_ascii_delimiter_is_rejected() {
        let settings = ManifestSettings {
            delimiter: '¦',
            ..ManifestSettings::default()
        };
        assert!(matches!(
            settings.options(),
            Err(ConfigError::InvalidDelimiter('¦'))
        ));
    }
}
