// Configuration - ~/.strata/config.toml and database path resolution

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::db;

pub const DB_ENV_VAR: &str = "STRATA_DB";
pub const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: Option<PathBuf>,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Load `~/.strata/config.toml`, falling back to defaults when HOME is
    /// unset or the file does not exist
    pub fn load() -> Result<Self> {
        match default_config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("Invalid config file {:?}", path))?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Database path: explicit flag, then STRATA_DB, then config, then
    /// ~/.strata/data.db
    pub fn resolve_db_path(&self, cli_db: Option<&Path>) -> Result<PathBuf> {
        let env_db = std::env::var_os(DB_ENV_VAR)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        self.resolve_db_path_with(cli_db, env_db)
    }

    fn resolve_db_path_with(&self, cli_db: Option<&Path>, env_db: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = cli_db {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = env_db {
            return Ok(path);
        }
        if let Some(path) = &self.db_path {
            return Ok(path.clone());
        }
        db::get_default_db_path()
    }
}

fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".strata").join("config.toml"))
}
