//! Scripted `ExplorerApi` for unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use abitopics_core::{AbiFetch, Chain, ExplorerApi, ExplorerError};
use async_trait::async_trait;

pub const ZERO_WORD: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Default)]
pub struct MockExplorer {
    abis: Mutex<HashMap<String, AbiFetch>>,
    storage: Mutex<HashMap<(String, String), String>>,
    pub abi_calls: Mutex<Vec<String>>,
    pub storage_calls: Mutex<Vec<(String, String)>>,
    delay: Option<Duration>,
    storage_failures: Mutex<usize>,
}

impl MockExplorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_abi(self, address: &str, abi: serde_json::Value) -> Self {
        let entries = abi.as_array().cloned().unwrap_or_default();
        self.abis
            .lock()
            .unwrap()
            .insert(address.to_string(), AbiFetch::Available(entries));
        self
    }

    pub fn with_notok(self, address: &str) -> Self {
        self.abis.lock().unwrap().insert(
            address.to_string(),
            AbiFetch::Unavailable {
                reason: "Contract source code not verified".into(),
            },
        );
        self
    }

    pub fn with_storage(self, address: &str, slot: &str, word: &str) -> Self {
        self.storage
            .lock()
            .unwrap()
            .insert((address.to_string(), slot.to_string()), word.to_string());
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `n` storage reads with a transport error.
    pub fn failing_storage(self, n: usize) -> Self {
        *self.storage_failures.lock().unwrap() = n;
        self
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn abi_call_count(&self) -> usize {
        self.abi_calls.lock().unwrap().len()
    }

    pub fn storage_call_count(&self) -> usize {
        self.storage_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ExplorerApi for MockExplorer {
    async fn fetch_abi(&self, _chain: Chain, address: &str) -> Result<AbiFetch, ExplorerError> {
        self.abi_calls.lock().unwrap().push(address.to_string());
        self.pause().await;
        Ok(self
            .abis
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or(AbiFetch::Unavailable {
                reason: "Contract source code not verified".into(),
            }))
    }

    async fn read_storage(
        &self,
        _chain: Chain,
        address: &str,
        slot: &str,
    ) -> Result<String, ExplorerError> {
        let key = (address.to_string(), slot.to_string());
        self.storage_calls.lock().unwrap().push(key.clone());
        self.pause().await;
        {
            let mut failures = self.storage_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(ExplorerError::Http("connection reset".into()));
            }
        }
        Ok(self
            .storage
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| ZERO_WORD.to_string()))
    }
}
