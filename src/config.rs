//! Catalogue configuration
//!
//! Settings come from, highest precedence first: command-line overrides,
//! `FILENODE_*` environment variables, the YAML config file, and defaults.
//! The config file is `$FILENODE_CONFIG` or `<config_dir>/filenode/config.yaml`.

use crate::classify::DEFAULT_MIN_CONFIDENCE;
use crate::identity::IdentitySynthesizer;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const ENV_DATABASE: &str = "FILENODE_DB";
pub const ENV_SCHEMA_DIR: &str = "FILENODE_SCHEMA_DIR";
pub const ENV_CONFIG: &str = "FILENODE_CONFIG";

const APP_DIR: &str = "filenode";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    /// SQLite database file
    pub database: PathBuf,
    /// Directory of `*.yaml` schema documents loaded at startup
    pub schema_dir: Option<PathBuf>,
    /// Path prefixes applied to searches that give none
    pub search_paths: Vec<String>,
    /// Scan threshold in [0, 1]
    pub min_confidence: f64,
    /// Collision bound for identifier synthesis
    pub max_attempts: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            schema_dir: None,
            search_paths: Vec::new(),
            min_confidence: DEFAULT_MIN_CONFIDENCE,
            max_attempts: IdentitySynthesizer::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// `<data_dir>/filenode/filenode.db`, or `filenode.db` when the platform has
/// no data directory
pub fn default_database() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_default()
        .join("filenode.db")
}

pub fn default_config_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.yaml"))
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub schema_dir: Option<PathBuf>,
}

impl CatalogConfig {
    pub fn from_yaml(text: &str) -> ConfigResult<Self> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Resolve against the process environment
    pub fn resolve(overrides: &ConfigOverrides) -> ConfigResult<Self> {
        Self::resolve_with(overrides, |name| std::env::var_os(name).map(PathBuf::from))
    }

    /// Resolve with an explicit environment lookup.
    ///
    /// An explicitly named config file must exist; the default one is
    /// optional.
    pub fn resolve_with<E>(overrides: &ConfigOverrides, env: E) -> ConfigResult<Self>
    where
        E: Fn(&str) -> Option<PathBuf>,
    {
        let explicit = overrides.config_file.clone().or_else(|| env(ENV_CONFIG));
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_file().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(path)?,
                None => Self::default(),
            },
        };

        if let Some(database) = env(ENV_DATABASE) {
            config.database = database;
        }
        if let Some(dir) = env(ENV_SCHEMA_DIR) {
            config.schema_dir = Some(dir);
        }
        if let Some(database) = &overrides.database {
            config.database = database.clone();
        }
        if let Some(dir) = &overrides.schema_dir {
            config.schema_dir = Some(dir.clone());
        }

        config.validate()?;
        debug!(database = %config.database.display(), "configuration resolved");
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}
