//! Supported chains and their block-explorer defaults.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ExplorerError;

/// A chain with an Etherscan-compatible block explorer.
///
/// The set is closed: an unknown slug is an error, never a silent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Ethereum,
    Polygon,
    Binance,
    Avalanche,
    Arbitrum,
    Optimism,
    Fantom,
}

impl Chain {
    pub const ALL: [Chain; 7] = [
        Chain::Ethereum,
        Chain::Polygon,
        Chain::Binance,
        Chain::Avalanche,
        Chain::Arbitrum,
        Chain::Optimism,
        Chain::Fantom,
    ];

    /// Lower-case slug, e.g. `"ethereum"`.
    pub fn slug(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Polygon => "polygon",
            Chain::Binance => "binance",
            Chain::Avalanche => "avalanche",
            Chain::Arbitrum => "arbitrum",
            Chain::Optimism => "optimism",
            Chain::Fantom => "fantom",
        }
    }

    /// Default explorer base URL (without the `/api` path).
    pub fn default_explorer_url(&self) -> &'static str {
        match self {
            Chain::Ethereum => "https://api.etherscan.io",
            Chain::Polygon => "https://api.polygonscan.com",
            Chain::Binance => "https://api.bscscan.com",
            Chain::Avalanche => "https://api.snowtrace.io",
            Chain::Arbitrum => "https://api.arbiscan.io",
            Chain::Optimism => "https://api-optimistic.etherscan.io",
            Chain::Fantom => "https://api.ftmscan.com",
        }
    }

    /// Environment variable holding the explorer API key for this chain.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ETHERSCAN_API_KEY",
            Chain::Polygon => "POLYGONSCAN_API_KEY",
            Chain::Binance => "BSCSCAN_API_KEY",
            Chain::Avalanche => "SNOWTRACE_API_KEY",
            Chain::Arbitrum => "ARBISCAN_API_KEY",
            Chain::Optimism => "OPTIMISTIC_ETHERSCAN_API_KEY",
            Chain::Fantom => "FTMSCAN_API_KEY",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Chain {
    type Err = ExplorerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Chain::ALL
            .into_iter()
            .find(|c| c.slug() == wanted)
            .ok_or_else(|| ExplorerError::UnsupportedChain {
                chain: s.to_string(),
            })
    }
}
