//! Explorer client configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use abitopics_core::{Chain, ExplorerError};
use serde::{Deserialize, Serialize};

use crate::policy::RetryConfig;

/// Per-chain endpoint overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Explorer base URL without `/api`; defaults to the chain's public explorer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// Settings shared by every request the client makes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Minimum spacing between requests to one base URL.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    /// chain slug → endpoint overrides
    #[serde(default)]
    pub endpoints: BTreeMap<Chain, EndpointConfig>,
}

fn default_min_interval_ms() -> u64 { 200 }
fn default_request_timeout_secs() -> u64 { 30 }

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryConfig::default(),
            endpoints: BTreeMap::new(),
        }
    }
}

impl ExplorerConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base URL for `chain`, override first.
    pub fn base_url(&self, chain: Chain) -> String {
        self.endpoints
            .get(&chain)
            .and_then(|e| e.base_url.clone())
            .unwrap_or_else(|| chain.default_explorer_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }

    /// API key for `chain`, or `MissingApiKey`.
    pub fn api_key(&self, chain: Chain) -> Result<&str, ExplorerError> {
        self.endpoints
            .get(&chain)
            .and_then(|e| e.api_key.as_deref())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ExplorerError::MissingApiKey {
                chain,
                env: chain.api_key_env().to_string(),
            })
    }

    /// Set a chain's API key.
    pub fn with_api_key(mut self, chain: Chain, key: impl Into<String>) -> Self {
        self.endpoints.entry(chain).or_default().api_key = Some(key.into());
        self
    }

    /// Point a chain at a different base URL (self-hosted mirror, test server).
    pub fn with_base_url(mut self, chain: Chain, url: impl Into<String>) -> Self {
        self.endpoints.entry(chain).or_default().base_url = Some(url.into());
        self
    }

    /// Fill API keys from the per-chain environment variables.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Same as `apply_env` with an injectable lookup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for chain in Chain::ALL {
            if let Some(key) = lookup(chain.api_key_env()).filter(|k| !k.is_empty()) {
                self.endpoints.entry(chain).or_default().api_key = Some(key);
            }
        }
    }
}
