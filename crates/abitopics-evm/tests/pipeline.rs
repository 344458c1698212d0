//! End-to-end: explorer → reader → accumulator → warehouse.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use abitopics_core::{
    AbiFetch, Chain, ContractRef, ExplorerApi, ExplorerError, TopicAccumulator, TopicSink,
};
use abitopics_evm::proxy::{EIP1967_IMPL_SLOT, ZEPPELINOS_IMPL_SLOT};
use abitopics_evm::{AbiReader, ProxyOutcome, ReaderConfig};
use abitopics_warehouse::{MemorySink, SqliteSink};
use async_trait::async_trait;
use serde_json::json;

const PROXY: &str = "0x43506849d7c04f9138d1a2050bbf3a0c054402dd";
const IMPL: &str = "0xa2327a938febf5fec13bacfb16ae10ecbc4cbdcf";
const TOKEN: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";

const TRANSFER: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
const APPROVAL: &str = "0x8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925";

/// Answers from fixed tables; counts every call.
#[derive(Default)]
struct FixtureExplorer {
    abis: HashMap<String, serde_json::Value>,
    storage: HashMap<(String, String), String>,
    calls: Mutex<usize>,
}

impl FixtureExplorer {
    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ExplorerApi for FixtureExplorer {
    async fn fetch_abi(&self, _chain: Chain, address: &str) -> Result<AbiFetch, ExplorerError> {
        *self.calls.lock().unwrap() += 1;
        Ok(match self.abis.get(address) {
            Some(abi) => AbiFetch::Available(abi.as_array().cloned().unwrap_or_default()),
            None => AbiFetch::Unavailable {
                reason: "Contract source code not verified".into(),
            },
        })
    }

    async fn read_storage(
        &self,
        _chain: Chain,
        address: &str,
        slot: &str,
    ) -> Result<String, ExplorerError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self
            .storage
            .get(&(address.to_string(), slot.to_string()))
            .cloned()
            .unwrap_or_else(|| format!("0x{}", "0".repeat(64))))
    }
}

fn erc20_events() -> serde_json::Value {
    json!([
        {"type": "function", "name": "transfer", "inputs": [
            {"name": "to", "type": "address"}, {"name": "amount", "type": "uint256"}
        ]},
        {"type": "event", "name": "Transfer", "anonymous": false, "inputs": [
            {"name": "from", "type": "address", "indexed": true},
            {"name": "to", "type": "address", "indexed": true},
            {"name": "value", "type": "uint256", "indexed": false}
        ]},
        {"type": "event", "name": "Approval", "anonymous": false, "inputs": [
            {"name": "owner", "type": "address", "indexed": true},
            {"name": "spender", "type": "address", "indexed": true},
            {"name": "value", "type": "uint256", "indexed": false}
        ]},
        {"type": "event", "name": "Paused", "inputs": []}
    ])
}

fn proxy_events() -> serde_json::Value {
    json!([
        {"type": "event", "name": "Upgraded", "inputs": [
            {"name": "implementation", "type": "address", "indexed": true}
        ]},
        {"type": "event", "name": "AdminChanged", "inputs": [
            {"name": "previousAdmin", "type": "address", "indexed": false},
            {"name": "newAdmin", "type": "address", "indexed": false}
        ]}
    ])
}

fn fixture(slot: &str) -> FixtureExplorer {
    let mut explorer = FixtureExplorer::default();
    explorer.abis.insert(PROXY.into(), proxy_events());
    explorer.abis.insert(IMPL.into(), erc20_events());
    explorer.abis.insert(TOKEN.into(), erc20_events());
    explorer.storage.insert(
        (PROXY.into(), slot.into()),
        format!("0x000000000000000000000000{}", &IMPL[2..]),
    );
    explorer
}

#[tokio::test]
async fn proxy_topics_land_in_the_warehouse_under_the_proxy_address() {
    let explorer = Arc::new(fixture(EIP1967_IMPL_SLOT));
    let reader = AbiReader::new(explorer.clone(), ReaderConfig::default());
    let sink = MemorySink::new();

    let mut acc = TopicAccumulator::new();
    let contract = ContractRef::new(Chain::Ethereum, PROXY).unwrap();
    let report = reader.collect(&contract, &mut acc).await.unwrap();

    assert!(matches!(report.proxy, ProxyOutcome::Followed { ref implementation, .. } if implementation == IMPL));
    assert_eq!(report.abi_address, IMPL);

    let merge = sink.merge(&acc.drain()).await.unwrap();
    assert!(merge.is_clean());
    assert_eq!(merge.inserted, 2);

    let rows = sink.rows();
    let topics: Vec<&str> = rows.iter().map(|r| r.topic.as_hex()).collect();
    assert!(topics.contains(&TRANSFER));
    assert!(topics.contains(&APPROVAL));
    assert!(rows.iter().all(|r| r.source_contract == PROXY));
    assert!(rows.iter().all(|r| r.topic_length == 3 && r.data_length == 66));
}

#[tokio::test]
async fn legacy_slot_is_used_when_the_eip1967_slot_is_empty() {
    let explorer = Arc::new(fixture(ZEPPELINOS_IMPL_SLOT));
    let reader = AbiReader::new(explorer, ReaderConfig::default());

    let contract = ContractRef::new(Chain::Polygon, PROXY).unwrap();
    let report = reader.read_contract(&contract).await.unwrap();
    assert_eq!(report.abi_address, IMPL);
    assert_eq!(report.records.len(), 2);
}

#[tokio::test]
async fn rerunning_the_pipeline_is_idempotent_and_memoized() {
    let explorer = Arc::new(fixture(EIP1967_IMPL_SLOT));
    let reader = AbiReader::new(explorer.clone(), ReaderConfig::default());
    let sink = SqliteSink::in_memory("topic_abis").await.unwrap();
    let contract = ContractRef::new(Chain::Ethereum, PROXY).unwrap();

    let mut acc = TopicAccumulator::new();
    reader.collect(&contract, &mut acc).await.unwrap();
    sink.merge(&acc.drain()).await.unwrap();
    let first_rows = sink.rows().await.unwrap();
    let calls_after_first = explorer.calls();

    reader.collect(&contract, &mut acc).await.unwrap();
    let second = sink.merge(&acc.drain()).await.unwrap();

    assert_eq!(explorer.calls(), calls_after_first);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.updated, 2);
    assert_eq!(sink.rows().await.unwrap(), first_rows);
}

#[tokio::test]
async fn plain_and_proxied_contracts_share_rows_by_natural_key() {
    let explorer = Arc::new(fixture(EIP1967_IMPL_SLOT));
    let reader = AbiReader::new(explorer, ReaderConfig::default());
    let sink = MemorySink::new();
    let mut acc = TopicAccumulator::new();

    for address in [TOKEN, PROXY] {
        let contract = ContractRef::new(Chain::Ethereum, address).unwrap();
        reader.collect(&contract, &mut acc).await.unwrap();
    }
    assert_eq!(acc.len(), 4);

    let merge = sink.merge(&acc.drain()).await.unwrap();
    assert_eq!(merge.staged, 2);
    // last writer wins
    assert!(sink.rows().iter().all(|r| r.source_contract == PROXY));
}

#[tokio::test]
async fn unverified_contract_without_implementation_writes_nothing() {
    let explorer = Arc::new(FixtureExplorer::default());
    let reader = AbiReader::new(explorer, ReaderConfig::default());
    let sink = MemorySink::new();

    let mut acc = TopicAccumulator::new();
    let contract = ContractRef::new(Chain::Fantom, TOKEN).unwrap();
    let report = reader.collect(&contract, &mut acc).await.unwrap();

    assert_eq!(report.proxy, ProxyOutcome::Unresolved);
    assert!(!report.abi_available);
    assert!(acc.is_empty());

    let merge = sink.merge(&acc.drain()).await.unwrap();
    assert_eq!(merge.staged, 0);
    assert!(sink.is_empty());
}
