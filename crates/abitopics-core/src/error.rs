//! Error types shared across the abitopics pipeline.

use thiserror::Error;

use crate::chain::Chain;

/// Errors raised while talking to a block explorer.
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("Unsupported chain: {chain}")]
    UnsupportedChain { chain: String },

    #[error("Invalid contract address: {address}")]
    InvalidAddress { address: String },

    #[error("No explorer API key for {chain} (set {env})")]
    MissingApiKey { chain: Chain, env: String },

    /// Connection refused, timeout, TLS failure and the like.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The explorer answered with a non-200 status.
    #[error("Explorer request failed with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The explorer throttled us (HTTP 200 with a rate-limit `NOTOK`).
    #[error("Rate limited by explorer: {reason}")]
    RateLimited { reason: String },

    #[error("Invalid explorer response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Storage word is not a 32-byte hex value: {word}")]
    InvalidStorageWord { word: String },

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl ExplorerError {
    /// Returns `true` for transient failures worth retrying on an idempotent read.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Errors raised while deriving topics from an ABI.
#[derive(Debug, Error)]
pub enum DeriveError {
    #[error("ABI is not a JSON array")]
    NotAnArray,

    #[error("ABI entry {index} is not an object: {reason}")]
    InvalidEntry { index: usize, reason: String },

    #[error("Event '{event}' (ABI entry {index}) has no `inputs`")]
    MissingInputs { event: String, index: usize },

    #[error("Event '{event}' input {param} has no `type`")]
    MissingType { event: String, param: usize },
}

/// Errors raised by a warehouse sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unsupported warehouse URL: {url}")]
    UnsupportedUrl { url: String },

    #[error("Invalid table name: {name}")]
    InvalidTable { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ExplorerError::Http("reset".into()).is_retryable());
        assert!(ExplorerError::Status { status: 429, body: String::new() }.is_retryable());
        assert!(ExplorerError::Status { status: 502, body: String::new() }.is_retryable());
        assert!(!ExplorerError::Status { status: 403, body: String::new() }.is_retryable());
        assert!(ExplorerError::RateLimited { reason: "Max rate limit reached".into() }.is_retryable());
        assert!(!ExplorerError::InvalidResponse { reason: "x".into() }.is_retryable());
    }
}
