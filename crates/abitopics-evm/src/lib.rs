//! # abitopics-evm
//!
//! The EVM side of abitopics:
//! - [`signature`]: event signature canonicalization, keccak256 topics and
//!   the `topic_length` / `data_length` size hints
//! - [`proxy`]: proxy detection heuristic and EIP-1967 / OpenZeppelin slot
//!   resolution
//! - [`reader`]: per-contract orchestration with memoized explorer lookups
//! - [`cache`]: the bounded LRU cache and single-flight memo behind that
//!   memoization

pub mod cache;
pub mod proxy;
pub mod reader;
pub mod signature;

#[cfg(test)]
mod testing;

pub use cache::{BoundedCache, MemoCache, Memoized};
pub use proxy::{looks_like_proxy, storage_to_address, ImplementationSlot, ProxyResolver, Resolution};
pub use reader::{AbiReader, ContractReport, ProxyOutcome, ReaderConfig, ReaderError};
pub use signature::{derive_topics, keccak256_signature, to_records, AbiEvent, DerivedEvent, TopicMap};
