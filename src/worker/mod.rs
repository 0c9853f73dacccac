//! Shard worker
//!
//! A [`Worker`] owns exactly one shard. It reads the shard line by line,
//! counts keys with the configured [`KeyExtractor`], and reports to the
//! coordinator over the shared event channel:
//!
//! 1. one [`WorkerEvent::PartialResult`] carrying its table,
//! 2. removal of the shard file,
//! 3. one [`WorkerEvent::Exited`].
//!
//! Both events travel on the same ordered channel, so the coordinator always
//! sees a worker's result before its exit.
//!
//! # Failure behaviour
//!
//! There is no line-level recovery. The first line the extractor rejects ends
//! the worker **without a result**: only `Exited(Failed)` is sent and the
//! shard stays on disk. The coordinator's result gate then never reaches N,
//! so no output is written even though the run still terminates once every
//! worker has exited. This is logged loudly but not repaired.
//!
//! The exit event is sent from a drop guard, so it is delivered on every path
//! out of [`Worker::run`], including a panic inside the extractor.

use crate::error::{TallyError, TallyResult};
use crate::extract::KeyExtractor;
use crate::partition::Shard;
use crate::stats::FrequencyTable;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

/// Message from a worker to the coordinator
#[derive(Debug)]
pub enum WorkerEvent {
    /// The worker's complete key counts; sent at most once
    PartialResult { worker: usize, table: FrequencyTable },
    /// The worker has terminated; sent exactly once
    Exited { worker: usize, status: WorkerExit },
}

/// How a worker terminated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerExit {
    Completed,
    Failed(String),
}

impl WorkerExit {
    pub fn is_failure(&self) -> bool {
        matches!(self, WorkerExit::Failed(_))
    }
}

/// Sending half of the coordinator's event queue
pub type EventSender = UnboundedSender<WorkerEvent>;

/// Sends `Exited` when dropped
struct ExitSignal {
    worker: usize,
    status: Option<WorkerExit>,
    events: EventSender,
}

impl ExitSignal {
    fn new(worker: usize, events: EventSender) -> Self {
        Self {
            worker,
            status: None,
            events,
        }
    }

    fn complete(mut self) {
        self.status = Some(WorkerExit::Completed);
    }

    fn fail(mut self, reason: String) {
        self.status = Some(WorkerExit::Failed(reason));
    }
}

impl Drop for ExitSignal {
    fn drop(&mut self) {
        // No status means we are unwinding out of run()
        let status = self
            .status
            .take()
            .unwrap_or_else(|| WorkerExit::Failed("worker panicked".to_string()));

        if self
            .events
            .send(WorkerEvent::Exited {
                worker: self.worker,
                status,
            })
            .is_err()
        {
            warn!("Worker {}: coordinator gone before exit signal", self.worker);
        }
    }
}

/// Counts the keys of one shard
pub struct Worker {
    id: usize,
    shard: Shard,
    extractor: Arc<dyn KeyExtractor>,
}

impl Worker {
    pub fn new(id: usize, shard: Shard, extractor: Arc<dyn KeyExtractor>) -> Self {
        Self {
            id,
            shard,
            extractor,
        }
    }

    /// Build the partial table for this worker's shard
    ///
    /// Stops at the first unreadable or unextractable line.
    pub fn tally(&self) -> TallyResult<FrequencyTable> {
        let path = &self.shard.path;
        let file = File::open(path).map_err(|source| TallyError::ShardRead {
            path: path.clone(),
            source,
        })?;

        let mut table = FrequencyTable::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| TallyError::ShardRead {
                path: path.clone(),
                source,
            })?;
            let key = self
                .extractor
                .extract(&line)
                .map_err(|source| TallyError::KeyExtraction {
                    worker: self.id,
                    line: n + 1,
                    source,
                })?;
            table.record_owned(key);
        }

        Ok(table)
    }

    /// Run to completion, reporting through `events`
    ///
    /// Blocking; meant to run on its own thread.
    pub fn run(self, events: EventSender) {
        let exit = ExitSignal::new(self.id, events.clone());

        let table = match self.tally() {
            Ok(table) => table,
            Err(e) => {
                error!(
                    "Worker {} failed on {}: {} (no partial result will be sent; \
                     output gate cannot complete)",
                    self.id,
                    self.shard.path.display(),
                    error_chain(&e)
                );
                exit.fail(e.to_string());
                return;
            }
        };

        debug!(
            "Worker {} counted {} lines into {} keys",
            self.id,
            table.total(),
            table.len()
        );

        let sent = events.send(WorkerEvent::PartialResult {
            worker: self.id,
            table,
        });
        if sent.is_err() {
            warn!("Worker {}: coordinator gone before partial result", self.id);
            exit.fail("coordinator channel closed".to_string());
            return;
        }

        if let Err(source) = fs::remove_file(&self.shard.path) {
            let e = TallyError::ShardRead {
                path: self.shard.path.clone(),
                source,
            };
            error!("Worker {} could not delete its shard: {}", self.id, error_chain(&e));
            exit.fail(e.to_string());
            return;
        }

        exit.complete();
    }
}

/// Render an error with its source chain on one line
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
