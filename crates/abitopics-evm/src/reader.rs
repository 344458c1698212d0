//! ABI reader: fetch, follow proxies, derive records for one contract.
//!
//! ```text
//! getabi(address) → derive topics ─┬─ not a proxy ──────────────────────────┐
//!                                  └─ proxy? → probe slots → getabi(impl) ──┤
//!                                                                           ▼
//!                                                     records (source = address)
//! ```

use std::sync::Arc;

use abitopics_core::{
    AbiFetch, Chain, ContractRef, DeriveError, ExplorerApi, ExplorerError, TopicAccumulator,
    TopicRecord,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::{MemoCache, DEFAULT_CACHE_CAPACITY};
use crate::proxy::{looks_like_proxy, ImplementationSlot, ProxyResolver, Resolution};
use crate::signature::{derive_topics, to_records, TopicMap};

/// Reader options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Entries kept in each of the ABI and proxy caches.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Fail when a proxy candidate has no implementation in either slot.
    #[serde(default)]
    pub strict_proxy: bool,
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            strict_proxy: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error(transparent)]
    Explorer(#[from] ExplorerError),

    #[error("Cannot derive topics for {address}: {source}")]
    Derive {
        address: String,
        #[source]
        source: DeriveError,
    },

    #[error("Proxy candidate {contract} has no implementation address in any known slot")]
    ProxyUnresolved { contract: ContractRef },
}

/// What happened on the proxy path for one contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProxyOutcome {
    /// The ABI's own topics were used.
    NotProxy,
    /// The implementation's ABI was used instead.
    Followed {
        implementation: String,
        slot: ImplementationSlot,
    },
    /// Looked like a proxy, but both slots were empty; the raw topics were kept.
    Unresolved,
}

/// Per-contract result.
#[derive(Debug, Clone, Serialize)]
pub struct ContractReport {
    pub contract: ContractRef,
    pub proxy: ProxyOutcome,
    /// Address whose ABI produced the records.
    pub abi_address: String,
    /// `false` when the explorer answered `NOTOK` for that address.
    pub abi_available: bool,
    /// Events derived before dropping parameterless ones.
    pub events_derived: usize,
    pub records: Vec<TopicRecord>,
}

/// Reads contracts through an explorer, memoizing ABIs and proxy lookups.
pub struct AbiReader {
    explorer: Arc<dyn ExplorerApi>,
    resolver: ProxyResolver,
    abi_cache: MemoCache<(Chain, String), AbiFetch>,
    config: ReaderConfig,
}

impl AbiReader {
    pub fn new(explorer: Arc<dyn ExplorerApi>, config: ReaderConfig) -> Self {
        Self {
            resolver: ProxyResolver::new(explorer.clone(), config.cache_capacity),
            abi_cache: MemoCache::new(config.cache_capacity),
            explorer,
            config,
        }
    }

    pub fn resolver(&self) -> &ProxyResolver {
        &self.resolver
    }

    /// `getabi`, memoized per (chain, address). `NOTOK` answers are cached too.
    ///
    /// Concurrent fetches of one address share a single request.
    pub async fn fetch_abi(&self, chain: Chain, address: &str) -> Result<AbiFetch, ExplorerError> {
        let address = address.to_ascii_lowercase();
        let explorer = &self.explorer;
        let addr = address.as_str();
        let memo = self
            .abi_cache
            .get_or_try_init((chain, address.clone()), || async move {
                let fetch = explorer.fetch_abi(chain, addr).await?;
                match &fetch {
                    AbiFetch::Available(entries) => {
                        info!(%chain, address = addr, entries = entries.len(), "ABI retrieved")
                    }
                    AbiFetch::Unavailable { reason } => {
                        warn!(%chain, address = addr, %reason, "explorer has no ABI")
                    }
                }
                Ok::<_, ExplorerError>(fetch)
            })
            .await?;
        if memo.hit {
            debug!(%chain, %address, "ABI cache hit");
        }
        Ok(memo.value)
    }

    /// Resolve, derive and classify the topics of one contract.
    pub async fn read_contract(&self, contract: &ContractRef) -> Result<ContractReport, ReaderError> {
        let chain = contract.chain;
        let fetch = self.fetch_abi(chain, &contract.address).await?;
        let mut abi_available = matches!(fetch, AbiFetch::Available(_));
        let mut abi_address = contract.address.clone();
        let mut topics = derive(&contract.address, fetch.entries())?;
        let mut proxy = ProxyOutcome::NotProxy;

        if looks_like_proxy(&topics) {
            info!(%contract, topics = topics.len(), "proxy candidate detected");
            match self.resolver.resolve(chain, &contract.address).await? {
                Resolution::Implementation { address, slot } => {
                    let impl_fetch = self.fetch_abi(chain, &address).await?;
                    abi_available = matches!(impl_fetch, AbiFetch::Available(_));
                    topics = derive(&address, impl_fetch.entries())?;
                    abi_address = address.clone();
                    proxy = ProxyOutcome::Followed {
                        implementation: address,
                        slot,
                    };
                }
                Resolution::Unresolved => {
                    if self.config.strict_proxy {
                        return Err(ReaderError::ProxyUnresolved {
                            contract: contract.clone(),
                        });
                    }
                    warn!(%contract, "proxy implementation not found; keeping the contract's own topics");
                    proxy = ProxyOutcome::Unresolved;
                }
            }
        }

        let records = to_records(&contract.address, &topics);
        for record in &records {
            debug!(name = %record.name, topic = %record.topic, "topic collected");
        }
        info!(
            %contract,
            events = topics.len(),
            records = records.len(),
            "contract topics derived"
        );

        Ok(ContractReport {
            contract: contract.clone(),
            proxy,
            abi_address,
            abi_available,
            events_derived: topics.len(),
            records,
        })
    }

    /// `read_contract`, appending the records to `acc`.
    pub async fn collect(
        &self,
        contract: &ContractRef,
        acc: &mut TopicAccumulator,
    ) -> Result<ContractReport, ReaderError> {
        let report = self.read_contract(contract).await?;
        acc.extend(report.records.iter().cloned());
        Ok(report)
    }
}

fn derive(address: &str, entries: &[serde_json::Value]) -> Result<TopicMap, ReaderError> {
    derive_topics(entries).map_err(|source| ReaderError::Derive {
        address: address.to_string(),
        source,
    })
}
