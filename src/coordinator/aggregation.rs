//! Coordinator-owned merge state and completion gates
//!
//! [`Aggregation`] is the only place the aggregated table and the two
//! completion counters are mutated. It is driven one event at a time by the
//! coordinator loop, so it needs no locking.
//!
//! The two gates are independent:
//!
//! - `results_received == N` triggers the single output write;
//! - `workers_exited == N` triggers termination, written or not.
//!
//! A worker that exits without a result therefore produces a run that
//! terminates cleanly with no output.

use crate::error::TallyResult;
use crate::output::solution::SolutionWriter;
use crate::stats::FrequencyTable;
use crate::worker::{WorkerEvent, WorkerExit};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Coordinator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Partitioning,
    Spawned,
    Merging,
    Writing,
    Draining,
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Partitioning => "partitioning",
            Phase::Spawned => "spawned",
            Phase::Merging => "merging",
            Phase::Writing => "writing",
            Phase::Draining => "draining",
            Phase::Terminated => "terminated",
        };
        write!(f, "{}", name)
    }
}

/// The two monotonic counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionGates {
    pub expected: usize,
    pub results_received: usize,
    pub workers_exited: usize,
}

impl CompletionGates {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            results_received: 0,
            workers_exited: 0,
        }
    }

    pub fn results_complete(&self) -> bool {
        self.results_received == self.expected
    }

    pub fn exits_complete(&self) -> bool {
        self.workers_exited == self.expected
    }
}

/// What the loop should do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Terminated,
}

/// Final state handed back when the exit gate closes
#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    pub output: Option<PathBuf>,
    pub gates: CompletionGates,
    /// Workers whose exit status was a failure, ascending
    pub failed_workers: Vec<usize>,
    pub distinct_keys: usize,
    pub total_count: u64,
}

/// Single-owner merge state
#[derive(Debug)]
pub struct Aggregation {
    table: FrequencyTable,
    gates: CompletionGates,
    phase: Phase,
    writer: SolutionWriter,
    output: Option<PathBuf>,
    result_seen: Vec<bool>,
    exit_seen: Vec<bool>,
    failed_workers: Vec<usize>,
}

impl Aggregation {
    /// State for `workers` freshly spawned workers
    pub fn new(workers: usize, writer: SolutionWriter) -> Self {
        Self {
            table: FrequencyTable::new(),
            gates: CompletionGates::new(workers),
            phase: Phase::Spawned,
            writer,
            output: None,
            result_seen: vec![false; workers],
            exit_seen: vec![false; workers],
            failed_workers: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn gates(&self) -> CompletionGates {
        self.gates
    }

    pub fn table(&self) -> &FrequencyTable {
        &self.table
    }

    pub fn output(&self) -> Option<&PathBuf> {
        self.output.as_ref()
    }

    /// Apply one worker event
    ///
    /// Returns an error only if the output write fails.
    pub fn handle(&mut self, event: WorkerEvent) -> TallyResult<Step> {
        if self.phase == Phase::Terminated {
            warn!("Event after termination ignored: {:?}", event);
            return Ok(Step::Terminated);
        }

        match event {
            WorkerEvent::PartialResult { worker, table } => self.on_result(worker, table),
            WorkerEvent::Exited { worker, status } => Ok(self.on_exit(worker, status)),
        }
    }

    fn on_result(&mut self, worker: usize, table: FrequencyTable) -> TallyResult<Step> {
        if !mark_once(&mut self.result_seen, worker) {
            warn!("Ignoring duplicate or unknown result from worker {}", worker);
            return Ok(Step::Continue);
        }

        if self.phase == Phase::Spawned {
            self.phase = Phase::Merging;
        }

        let keys = table.len();
        self.table.merge(table);
        self.gates.results_received += 1;
        debug!(
            "Merged result from worker {} ({} keys), results {}/{}",
            worker, keys, self.gates.results_received, self.gates.expected
        );

        if self.gates.results_complete() && self.output.is_none() {
            self.phase = Phase::Writing;
            let path = self.writer.write(&self.table)?;
            info!("Solutions written to: {}", path.display());
            self.output = Some(path);
            self.phase = Phase::Draining;
        }

        Ok(Step::Continue)
    }

    fn on_exit(&mut self, worker: usize, status: WorkerExit) -> Step {
        if !mark_once(&mut self.exit_seen, worker) {
            warn!("Ignoring duplicate or unknown exit from worker {}", worker);
            return Step::Continue;
        }

        if status.is_failure() {
            self.failed_workers.push(worker);
        }

        self.gates.workers_exited += 1;
        debug!(
            "Worker {} exited ({:?}), exits {}/{}",
            worker, status, self.gates.workers_exited, self.gates.expected
        );

        if self.gates.exits_complete() {
            self.phase = Phase::Terminated;
            if self.output.is_none() {
                warn!(
                    "All {} workers exited but only {} of {} results arrived; no output written",
                    self.gates.expected, self.gates.results_received, self.gates.expected
                );
            }
            return Step::Terminated;
        }

        Step::Continue
    }

    /// Consume the state once the exit gate has closed
    pub fn finish(mut self) -> AggregationOutcome {
        self.failed_workers.sort_unstable();
        AggregationOutcome {
            output: self.output,
            gates: self.gates,
            failed_workers: self.failed_workers,
            distinct_keys: self.table.len(),
            total_count: self.table.total(),
        }
    }
}

/// Set `seen[idx]`; false if out of range or already set
fn mark_once(seen: &mut [bool], idx: usize) -> bool {
    match seen.get_mut(idx) {
        Some(flag) if !*flag => {
            *flag = true;
            true
        }
        _ => false,
    }
}
