//! Application configuration: pipeline settings, logging and store location.
//!
//! Loaded from an optional YAML (or JSON) file, then overridden by
//! command-line flags and `CENSUSKV_DATABASE`.
//!
//! ```yaml
//! pipeline:
//!   batch_size: 25
//!   transform:
//!     sentinel_token: ".."
//!     sentinel_value: -1
//!     variant: geo-stratified
//! log:
//!   level: info
//!   components:
//!     censuskv-storage: debug
//! store:
//!   database: ./censuskv.db
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use censuskv_core::config::PipelineConfig;
use censuskv_core::error::ConfigError;
use censuskv_observability::LogConfig;

/// Where the SQLite store lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// File path or `sqlite:` URL.
    pub database: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: "censuskv.db".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub log: LogConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_yaml::from_str(s)?;
        cfg.pipeline.validate()?;
        Ok(cfg)
    }

    /// Load `path`, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_yaml_str(&std::fs::read_to_string(p)?),
            None => Ok(Self::default()),
        }
    }

    /// Apply command-line overrides.
    pub fn apply_overrides(&mut self, verbose: bool, log_json: bool, database: Option<String>) {
        if verbose {
            self.log.level = "debug".into();
        }
        if log_json {
            self.log.json = true;
        }
        if let Some(db) = database {
            self.store.database = db;
        }
    }
}
