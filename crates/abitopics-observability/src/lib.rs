//! # abitopics-observability
//!
//! Logging setup for the abitopics binary. Library crates only emit `tracing`
//! events; the binary calls [`init_tracing`] once at startup.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, LogConfig};
