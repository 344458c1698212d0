//! Contract references, topic hashes and the records persisted per event.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::chain::Chain;
use crate::error::ExplorerError;

/// A contract on a specific chain. The address is stored lower-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractRef {
    pub chain: Chain,
    pub address: String,
}

impl ContractRef {
    /// Validate and normalize a `0x`-prefixed 20-byte hex address.
    pub fn new(chain: Chain, address: &str) -> Result<Self, ExplorerError> {
        Ok(Self {
            chain,
            address: normalize_address(address)?,
        })
    }
}

impl fmt::Display for ContractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.address)
    }
}

/// Lower-case a contract address after checking it is `0x` + 40 hex digits.
pub fn normalize_address(address: &str) -> Result<String, ExplorerError> {
    let trimmed = address.trim();
    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .ok_or_else(|| ExplorerError::InvalidAddress {
            address: address.to_string(),
        })?;
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ExplorerError::InvalidAddress {
            address: address.to_string(),
        });
    }
    Ok(format!("0x{}", hex.to_ascii_lowercase()))
}

/// Keccak-256 hash of an event signature, `0x`-prefixed lower-case hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicHash(String);

impl TopicHash {
    /// Wrap a 32-byte digest.
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(format!("0x{}", hex::encode(digest)))
    }

    /// Parse a topic from hex. Accepts upper-case input and normalizes it.
    pub fn parse(hex: &str) -> Option<Self> {
        let body = hex.strip_prefix("0x").unwrap_or(hex);
        if body.len() == 64 && body.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(Self(format!("0x{}", body.to_ascii_lowercase())))
        } else {
            None
        }
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One derived event signature, ready for the warehouse.
///
/// Natural key: `(topic, topic_length, data_length)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRecord {
    pub topic: TopicHash,
    /// Address the ABI was requested for (the proxy, when one was followed).
    pub source_contract: String,
    pub name: String,
    /// Verbatim ABI entry as returned by the explorer, serialized to JSON.
    #[serde(rename = "abi")]
    pub abi_json: String,
    /// 1 + number of indexed inputs.
    pub topic_length: u32,
    /// 2 + 64 per non-indexed input.
    pub data_length: u32,
}

impl TopicRecord {
    /// The merge key used by every sink.
    pub fn natural_key(&self) -> (&TopicHash, u32, u32) {
        (&self.topic, self.topic_length, self.data_length)
    }
}

/// Outcome of a `getabi` call.
#[derive(Debug, Clone, PartialEq)]
pub enum AbiFetch {
    /// The explorer returned an ABI: the decoded JSON array entries.
    Available(Vec<serde_json::Value>),
    /// The explorer answered `NOTOK` (unverified contract and the like).
    Unavailable { reason: String },
}

impl AbiFetch {
    /// ABI entries, empty when the explorer had none.
    pub fn entries(&self) -> &[serde_json::Value] {
        match self {
            AbiFetch::Available(entries) => entries,
            AbiFetch::Unavailable { .. } => &[],
        }
    }
}
