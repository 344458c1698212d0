//! The `ExplorerApi` trait: what the resolver and reader need from a block explorer.

use async_trait::async_trait;

use crate::chain::Chain;
use crate::error::ExplorerError;
use crate::types::AbiFetch;

/// Read-only access to an Etherscan-compatible explorer.
///
/// Implementations are responsible for credentials and rate limiting; callers
/// only see the two idempotent reads below.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn ExplorerApi>`.
#[async_trait]
pub trait ExplorerApi: Send + Sync {
    /// `module=contract&action=getabi` for `address`.
    ///
    /// A `NOTOK` answer is `Ok(AbiFetch::Unavailable)`, not an error.
    async fn fetch_abi(&self, chain: Chain, address: &str) -> Result<AbiFetch, ExplorerError>;

    /// `module=proxy&action=eth_getStorageAt` at tag `latest`.
    ///
    /// Returns the raw 32-byte word as hex.
    async fn read_storage(
        &self,
        chain: Chain,
        address: &str,
        slot: &str,
    ) -> Result<String, ExplorerError>;
}
