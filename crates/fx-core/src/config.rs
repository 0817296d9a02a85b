//! Configuration types and parsing for fixflow.yml

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main project configuration from fixflow.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Project name
    pub name: String,

    /// Directory holding the dataset tree, relative to the config file
    #[serde(default = "default_fixture_dir")]
    pub fixture_dir: String,

    /// Database connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Extraction tuning
    #[serde(default)]
    pub download: DownloadConfig,

    /// Population tuning
    #[serde(default)]
    pub populate: PopulateConfig,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Engine backend
    #[serde(default)]
    pub engine: DbEngine,

    /// Database file path, or ":memory:"
    #[serde(default = "default_db_path")]
    pub path: String,
}

/// Supported engine backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbEngine {
    #[default]
    Sqlite,
    Duckdb,
}

/// Extraction tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DownloadConfig {
    /// Global row budget per extraction request
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Driver bound-parameter limit used for batch sizing
    #[serde(default = "default_max_bound_parameters")]
    pub max_bound_parameters: usize,
}

/// Population tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PopulateConfig {
    /// Rows inserted between explicit commits
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,

    /// Run a constraint re-validation pass after re-enabling (slow)
    #[serde(default)]
    pub revalidate_constraints: bool,
}

fn default_fixture_dir() -> String {
    "fixtures".to_string()
}

fn default_db_path() -> String {
    "fixflow.db".to_string()
}

fn default_max_rows() -> usize {
    1000
}

fn default_max_bound_parameters() -> usize {
    2000
}

fn default_insert_batch_size() -> usize {
    10_000
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            engine: DbEngine::default(),
            path: default_db_path(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            max_bound_parameters: default_max_bound_parameters(),
        }
    }
}

impl Default for PopulateConfig {
    fn default() -> Self {
        Self {
            insert_batch_size: default_insert_batch_size(),
            revalidate_constraints: false,
        }
    }
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Resolve the fixture directory against the project root
    pub fn fixture_dir_absolute(&self, root: &Path) -> PathBuf {
        let dir = Path::new(&self.fixture_dir);
        if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            root.join(dir)
        }
    }
}
