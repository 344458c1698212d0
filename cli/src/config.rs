//! Runtime configuration: optional YAML file, then environment overrides.
//!
//! ```yaml
//! log:
//!   level: info
//!   json: false
//! explorer:
//!   min_interval_ms: 200
//!   endpoints:
//!     polygon: { base_url: "https://api.polygonscan.com" }
//! warehouse:
//!   url: "sqlite:./topic_abis.db"
//!   table: topic_abis
//! reader:
//!   cache_capacity: 128
//!   strict_proxy: false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use abitopics_evm::ReaderConfig;
use abitopics_explorer::ExplorerConfig;
use abitopics_observability::LogConfig;
use abitopics_warehouse::WarehouseConfig;

pub const CONFIG_ENV: &str = "ABITOPICS_CONFIG";
pub const DATABASE_URL_ENV: &str = "ABITOPICS_DATABASE_URL";
pub const LOG_ENV: &str = "ABITOPICS_LOG";
pub const LOG_JSON_ENV: &str = "ABITOPICS_LOG_JSON";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub warehouse: WarehouseConfig,
    #[serde(default)]
    pub reader: ReaderConfig,
}

impl AppConfig {
    /// Load from `$ABITOPICS_CONFIG` (if set) and the process environment.
    pub fn load() -> Result<Self> {
        Self::load_from(|name| std::env::var(name).ok())
    }

    /// Same as `load` with an injectable environment.
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(&lookup);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        self.explorer.apply_env_from(lookup);
        if let Some(url) = lookup(DATABASE_URL_ENV).filter(|v| !v.is_empty()) {
            self.warehouse.url = url;
        }
        if let Some(level) = lookup(LOG_ENV).filter(|v| !v.is_empty()) {
            self.log.level = level;
        }
        if lookup(LOG_JSON_ENV).is_some() {
            self.log.json = true;
        }
    }
}
