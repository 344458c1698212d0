//! HTTP client for Etherscan-compatible explorers, backed by `reqwest`.
//!
//! Features:
//! - Per-base-URL minimum spacing between requests (shared across chains that
//!   point at the same host)
//! - Automatic retry with exponential backoff for transient errors
//! - `NOTOK` answers surfaced as `AbiFetch::Unavailable`, except rate-limit
//!   answers which are retried

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use abitopics_core::{AbiFetch, Chain, ExplorerApi, ExplorerError};

use crate::config::ExplorerConfig;
use crate::policy::{LimiterRegistry, RetryPolicy};

/// Envelope shared by the `contract` and `proxy` modules.
///
/// `contract` answers carry `status`/`message`; `proxy` answers mirror
/// JSON-RPC and carry `result` or `error`.
#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl ExplorerResponse {
    fn is_notok(&self) -> bool {
        self.message.as_deref().is_some_and(|m| m.starts_with("NOTOK"))
            || self.status.as_deref() == Some("0")
    }

    fn result_text(&self) -> String {
        match &self.result {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

/// Rate-limited explorer client. One instance serves every chain.
pub struct ExplorerClient {
    http: reqwest::Client,
    config: ExplorerConfig,
    retry: RetryPolicy,
    limiters: Arc<LimiterRegistry>,
}

impl ExplorerClient {
    /// Build a client with its own limiter registry.
    pub fn new(config: ExplorerConfig) -> Result<Self, ExplorerError> {
        let limiters = Arc::new(LimiterRegistry::new(config.min_interval()));
        Self::with_limiters(config, limiters)
    }

    /// Build a client sharing `limiters` with other clients in the process.
    pub fn with_limiters(
        config: ExplorerConfig,
        limiters: Arc<LimiterRegistry>,
    ) -> Result<Self, ExplorerError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("abitopics/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ExplorerError::Http(e.to_string()))?;

        Ok(Self {
            http,
            retry: RetryPolicy::new(config.retry.clone()),
            config,
            limiters,
        })
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Fails with `MissingApiKey` when `chain` has no key configured.
    pub fn require_credentials(&self, chain: Chain) -> Result<(), ExplorerError> {
        self.config.api_key(chain).map(|_| ())
    }

    async fn get_once(
        &self,
        base_url: &str,
        params: &[(&str, &str)],
    ) -> Result<ExplorerResponse, ExplorerError> {
        self.limiters.for_base_url(base_url).acquire().await;

        let resp = self
            .http
            .get(format!("{base_url}/api"))
            .query(params)
            .send()
            .await
            .map_err(|e| ExplorerError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ExplorerError::Status { status, body });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| ExplorerError::Http(e.to_string()))?;
        let parsed: ExplorerResponse = serde_json::from_str(&body)?;

        // Throttling arrives as HTTP 200 + NOTOK; surface it so the loop retries.
        if parsed.is_notok() && parsed.result_text().to_ascii_lowercase().contains("rate limit") {
            return Err(ExplorerError::RateLimited {
                reason: parsed.result_text(),
            });
        }
        Ok(parsed)
    }

    /// GET `{base}/api` with retries on transient failures.
    async fn get(
        &self,
        chain: Chain,
        params: &[(&str, &str)],
    ) -> Result<ExplorerResponse, ExplorerError> {
        let base_url = self.config.base_url(chain);
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.get_once(&base_url, params).await {
                Ok(resp) => return Ok(resp),
                Err(e) if e.is_retryable() => match self.retry.next_delay(attempt) {
                    Some(delay) => {
                        tracing::warn!(
                            attempt,
                            delay_ms = delay.as_millis(),
                            error = %e,
                            %chain,
                            "retrying explorer request"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        tracing::error!(
                            attempt,
                            error = %e,
                            %chain,
                            "max retries exceeded"
                        );
                        return Err(e);
                    }
                },
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl ExplorerApi for ExplorerClient {
    async fn fetch_abi(&self, chain: Chain, address: &str) -> Result<AbiFetch, ExplorerError> {
        let api_key = self.config.api_key(chain)?;
        let body = self
            .get(
                chain,
                &[
                    ("module", "contract"),
                    ("action", "getabi"),
                    ("address", address),
                    ("apikey", api_key),
                ],
            )
            .await?;

        if body.is_notok() {
            return Ok(AbiFetch::Unavailable {
                reason: body.result_text(),
            });
        }

        let abi: Value = match &body.result {
            Some(Value::String(text)) => {
                serde_json::from_str(text).map_err(|e| ExplorerError::InvalidResponse {
                    reason: format!("ABI is not valid JSON: {e}"),
                })?
            }
            Some(other) => other.clone(),
            None => {
                return Err(ExplorerError::InvalidResponse {
                    reason: "getabi response has no `result`".into(),
                })
            }
        };

        match abi {
            Value::Array(entries) => Ok(AbiFetch::Available(entries)),
            other => Err(ExplorerError::InvalidResponse {
                reason: format!("ABI is not a JSON array: {other}"),
            }),
        }
    }

    async fn read_storage(
        &self,
        chain: Chain,
        address: &str,
        slot: &str,
    ) -> Result<String, ExplorerError> {
        let api_key = self.config.api_key(chain)?;
        let body = self
            .get(
                chain,
                &[
                    ("module", "proxy"),
                    ("action", "eth_getStorageAt"),
                    ("address", address),
                    ("position", slot),
                    ("tag", "latest"),
                    ("apikey", api_key),
                ],
            )
            .await?;

        if let Some(error) = &body.error {
            return Err(ExplorerError::InvalidResponse {
                reason: format!("eth_getStorageAt failed: {error}"),
            });
        }
        match &body.result {
            Some(Value::String(word)) if word.starts_with("0x") => Ok(word.clone()),
            _ => Err(ExplorerError::InvalidResponse {
                reason: format!("eth_getStorageAt returned {}", body.result_text()),
            }),
        }
    }
}
