//! Error taxonomy for the shard/count/merge pipeline
//!
//! Each variant is fatal to exactly one unit of execution. Partition and output
//! failures end the run; shard-read and key-extraction failures end only the
//! worker that hit them.

use crate::extract::KeyError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failures raised by the partitioner, workers and coordinator
#[derive(Debug, Error)]
pub enum TallyError {
    /// The source line stream could not be opened or read
    #[error("failed to read input {}", .path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A shard could not be created, written, flushed or synced
    #[error("failed to write shard {}", .path.display())]
    ShardWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A worker could not read (or delete) its shard
    #[error("failed to read shard {}", .path.display())]
    ShardRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The key extractor rejected a line; the worker stops without a result
    #[error("worker {worker} could not extract a key from line {line}")]
    KeyExtraction {
        worker: usize,
        /// 1-based line number within the shard
        line: usize,
        #[source]
        source: KeyError,
    },

    /// The final sorted table could not be persisted
    #[error("failed to write output {}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("worker count must be at least 1")]
    InvalidWorkerCount,

    /// A worker task could not be started
    #[error("failed to spawn worker {worker}: {reason}")]
    WorkerSpawn { worker: usize, reason: String },

    /// Every event sender dropped before all workers reported an exit
    #[error("worker event channel closed with {exited} of {expected} workers exited")]
    EventChannelClosed { exited: usize, expected: usize },

    /// Opt-in liveness check fired
    #[error("no worker event for {waited:?} ({results} results, {exited} exits of {expected})")]
    LivenessTimeout {
        waited: Duration,
        results: usize,
        exited: usize,
        expected: usize,
    },
}

/// Result type for the pipeline core
pub type TallyResult<T> = std::result::Result<T, TallyError>;
