//! EVM proxy contract detection and implementation lookup.
//!
//! A contract is treated as a proxy candidate when its ABI yields no event
//! topics at all, or when it declares the EIP-1967 `Upgraded(address)` event.
//! Candidates are resolved by reading the implementation address from storage:
//!
//! | Slot | Derivation | Standard |
//! |------|------------|----------|
//! | `0x3608…2bbc` | `keccak256("eip1967.proxy.implementation") - 1` | EIP-1967 |
//! | `0x7050…f8c3` | `keccak256("org.zeppelinos.proxy.implementation")` | OpenZeppelin (pre-EIP-1967) |
//!
//! Slots are probed in that order and the first non-zero word wins. A proxy
//! whose events are named differently and whose ABI is non-empty is not
//! detected; that is a known limitation of the heuristic.

use std::sync::Arc;

use abitopics_core::{Chain, ExplorerApi, ExplorerError, TopicHash};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::MemoCache;
use crate::signature::TopicMap;

/// Topic of `Upgraded(address)`, emitted by EIP-1967 proxies on upgrade.
pub const UPGRADED_TOPIC: &str =
    "0xbc7cd75a20ee27fd9adebab32041f755214dbc6bffa90cc0225b39da2e5c2d3b";

/// EIP-1967 implementation slot:
/// `keccak256("eip1967.proxy.implementation") - 1`
pub const EIP1967_IMPL_SLOT: &str =
    "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc";

/// OpenZeppelin legacy implementation slot:
/// `keccak256("org.zeppelinos.proxy.implementation")`
pub const ZEPPELINOS_IMPL_SLOT: &str =
    "0x7050c9e0f4ca769c69bd3a8ef740bc37934f8e2c036e5a723fd8ee048ed3f8c3";

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Which storage slot held the implementation address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImplementationSlot {
    Eip1967,
    ZeppelinOs,
}

impl ImplementationSlot {
    /// Probe order.
    pub const ALL: [ImplementationSlot; 2] =
        [ImplementationSlot::Eip1967, ImplementationSlot::ZeppelinOs];

    pub fn position(&self) -> &'static str {
        match self {
            ImplementationSlot::Eip1967 => EIP1967_IMPL_SLOT,
            ImplementationSlot::ZeppelinOs => ZEPPELINOS_IMPL_SLOT,
        }
    }
}

/// Result of probing the implementation slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    /// A slot held a non-zero address.
    Implementation {
        address: String,
        slot: ImplementationSlot,
    },
    /// Every slot held the zero address.
    Unresolved,
}

/// `true` if the topics suggest a proxy: none at all, or an `Upgraded` event.
pub fn looks_like_proxy(topics: &TopicMap) -> bool {
    if topics.is_empty() {
        return true;
    }
    TopicHash::parse(UPGRADED_TOPIC).is_some_and(|upgraded| topics.contains_key(&upgraded))
}

/// Read the address stored in the low 20 bytes of a storage word.
///
/// Short words are left-padded with zeros. Returns `Ok(None)` for the zero
/// address.
pub fn storage_to_address(word: &str) -> Result<Option<String>, ExplorerError> {
    let trimmed = word.trim();
    let body = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if body.len() > 64 || hex::decode(pad_even(body)).is_err() {
        return Err(ExplorerError::InvalidStorageWord {
            word: word.to_string(),
        });
    }
    let padded = format!("{body:0>64}");
    let address = format!("0x{}", padded[24..].to_ascii_lowercase());
    if address == ZERO_ADDRESS {
        Ok(None)
    } else {
        Ok(Some(address))
    }
}

fn pad_even(body: &str) -> String {
    if body.len() % 2 == 1 {
        format!("0{body}")
    } else {
        body.to_string()
    }
}

/// Resolves proxy implementations through an explorer, memoizing per contract.
///
/// Concurrent lookups of one contract share a single probe sequence.
pub struct ProxyResolver {
    explorer: Arc<dyn ExplorerApi>,
    cache: MemoCache<(Chain, String), Resolution>,
}

impl ProxyResolver {
    pub fn new(explorer: Arc<dyn ExplorerApi>, cache_capacity: usize) -> Self {
        Self {
            explorer,
            cache: MemoCache::new(cache_capacity),
        }
    }

    /// Resolve the implementation behind `address`.
    ///
    /// Both outcomes are cached; explorer errors are not.
    pub async fn resolve(&self, chain: Chain, address: &str) -> Result<Resolution, ExplorerError> {
        let address = address.to_ascii_lowercase();
        let addr = address.as_str();
        let memo = self
            .cache
            .get_or_try_init((chain, address.clone()), || self.probe(chain, addr))
            .await?;
        if memo.hit {
            debug!(%chain, %address, "proxy resolution cache hit");
        }
        Ok(memo.value)
    }

    /// Number of memoized contracts.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    async fn probe(&self, chain: Chain, address: &str) -> Result<Resolution, ExplorerError> {
        for slot in ImplementationSlot::ALL {
            let word = self
                .explorer
                .read_storage(chain, address, slot.position())
                .await?;
            match storage_to_address(&word)? {
                Some(implementation) => {
                    info!(%chain, proxy = %address, %implementation, ?slot, "proxy implementation resolved");
                    return Ok(Resolution::Implementation {
                        address: implementation,
                        slot,
                    });
                }
                None => debug!(%chain, proxy = %address, ?slot, "implementation slot empty"),
            }
        }
        Ok(Resolution::Unresolved)
    }
}
