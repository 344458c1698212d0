//! # abitopics-explorer
//!
//! [`ExplorerClient`] implements [`abitopics_core::ExplorerApi`] over HTTP
//! for Etherscan-compatible explorers (Etherscan, Polygonscan, BscScan,
//! Snowtrace, Arbiscan, Optimistic Etherscan, FtmScan).
//!
//! Every request to a given explorer host passes through a
//! [`MinIntervalLimiter`](policy::MinIntervalLimiter), 200 ms apart by default.

pub mod client;
pub mod config;
pub mod policy;

pub use client::ExplorerClient;
pub use config::{EndpointConfig, ExplorerConfig};
pub use policy::{LimiterRegistry, MinIntervalLimiter, RetryConfig, RetryPolicy};
