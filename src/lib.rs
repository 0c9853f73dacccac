//! shardtally - local fan-out/fan-in line aggregator
//!
//! shardtally splits a line-oriented input into one shard per CPU, counts a
//! derived key in every shard on its own worker thread, merges the partial
//! counts and writes them sorted by frequency.
//!
//! # Architecture
//!
//! - **Partitioner**: round-robin split of the input into N shard files,
//!   all closed before any worker starts
//! - **Workers**: one per shard; count keys, send one partial table, delete
//!   the shard, signal exit
//! - **Coordinator**: single owner of the merged table and of two independent
//!   completion gates (results received, workers exited)
//! - **Key extraction**: pluggable; defaults to the registrable domain of a URL

pub mod config;
pub mod coordinator;
pub mod error;
pub mod extract;
pub mod output;
pub mod partition;
pub mod stats;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{Coordinator, RunSummary};
pub use error::TallyError;
pub use extract::{KeyExtractor, KeyKind};

/// Result type used by the application layer
pub type Result<T> = anyhow::Result<T>;
