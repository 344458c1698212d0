//! # abitopics-core
//!
//! Types and traits shared by every abitopics crate: the supported chains,
//! contract references, topic records, and the two seams the pipeline is
//! built around: [`ExplorerApi`] (where ABIs and storage words come from)
//! and [`TopicSink`] (where records go).

pub mod accumulator;
pub mod chain;
pub mod error;
pub mod explorer;
pub mod sink;
pub mod types;

pub use accumulator::TopicAccumulator;
pub use chain::Chain;
pub use error::{DeriveError, ExplorerError, SinkError};
pub use explorer::ExplorerApi;
pub use sink::{MergeReport, RejectedRow, TopicSink};
pub use types::{normalize_address, AbiFetch, ContractRef, TopicHash, TopicRecord};
