//! Coordinator module
//!
//! Runs one job end to end:
//!
//! 1. **Partitioning**: split the input into N shards (blocking task). Every
//!    shard is closed before this step returns.
//! 2. **Spawned**: start one worker thread per shard, all sending into a single
//!    ordered event queue.
//! 3. **Merging / Writing / Draining**: feed events to [`Aggregation`] until
//!    every worker has exited.
//!
//! Without a liveness timeout the coordinator waits on the event queue
//! indefinitely; a worker that never exits stalls the run. With
//! `liveness_timeout` set, a silent window of that length fails the run.

pub mod aggregation;

use crate::config::Config;
use crate::error::{TallyError, TallyResult};
use crate::extract::KeyExtractor;
use crate::output::solution::SolutionWriter;
use crate::partition::{PartitionReport, Partitioner};
use crate::worker::{Worker, WorkerEvent};
use aggregation::{Aggregation, Phase, Step};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info};

pub use aggregation::{AggregationOutcome, CompletionGates};

/// What a finished run reports
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub workers: usize,
    pub total_lines: usize,
    /// Result artifact; `None` when some worker never delivered its result
    pub output: Option<PathBuf>,
    pub results_received: usize,
    pub workers_exited: usize,
    pub failed_workers: Vec<usize>,
    pub distinct_keys: usize,
    pub total_count: u64,
    pub elapsed: Duration,
}

/// Orchestrates partition, workers and merge for one input
pub struct Coordinator {
    partitioner: Partitioner,
    extractor: Arc<dyn KeyExtractor>,
    writer: SolutionWriter,
    liveness_timeout: Option<Duration>,
    phase: Phase,
}

impl Coordinator {
    /// Build a coordinator from configuration and a fixed worker count
    pub fn new(
        config: &Config,
        workers: usize,
        extractor: Arc<dyn KeyExtractor>,
    ) -> TallyResult<Self> {
        let partitioner = Partitioner::new(&config.input, config.shard_dir.clone(), workers)?;
        Ok(Self::from_parts(
            partitioner,
            extractor,
            SolutionWriter::new(&config.output_dir),
            config.liveness_timeout(),
        ))
    }

    pub fn from_parts(
        partitioner: Partitioner,
        extractor: Arc<dyn KeyExtractor>,
        writer: SolutionWriter,
        liveness_timeout: Option<Duration>,
    ) -> Self {
        Self {
            partitioner,
            extractor,
            writer,
            liveness_timeout,
            phase: Phase::Idle,
        }
    }

    pub fn workers(&self) -> usize {
        self.partitioner.workers()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Run the whole job
    pub async fn run(mut self) -> TallyResult<RunSummary> {
        let start = Instant::now();

        self.transition(Phase::Partitioning);
        let partitioner = self.partitioner.clone();
        let report = match tokio::task::spawn_blocking(move || partitioner.run()).await {
            Ok(report) => report?,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handles = self.spawn_workers(&report, events_tx)?;
        self.transition(Phase::Spawned);

        let aggregation = Aggregation::new(report.shards.len(), self.writer.clone());
        let outcome = self.drive(aggregation, events_rx).await?;
        self.transition(Phase::Terminated);

        // Every worker has sent its exit, so these joins return promptly
        let joined = tokio::task::spawn_blocking(move || {
            for (idx, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() {
                    error!("Worker {} thread panicked", idx);
                }
            }
        })
        .await;
        if joined.is_err() {
            error!("Failed to join worker threads");
        }

        Ok(RunSummary {
            workers: report.shards.len(),
            total_lines: report.total_lines,
            output: outcome.output,
            results_received: outcome.gates.results_received,
            workers_exited: outcome.gates.workers_exited,
            failed_workers: outcome.failed_workers,
            distinct_keys: outcome.distinct_keys,
            total_count: outcome.total_count,
            elapsed: start.elapsed(),
        })
    }

    /// Start one worker thread per shard
    fn spawn_workers(
        &self,
        report: &PartitionReport,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> TallyResult<Vec<JoinHandle<()>>> {
        let mut handles = Vec::with_capacity(report.shards.len());

        for shard in &report.shards {
            let worker = Worker::new(shard.index, shard.clone(), Arc::clone(&self.extractor));
            let tx = events.clone();
            debug!(
                "Spawning worker {} on {} ({} lines)",
                shard.index,
                shard.path.display(),
                shard.lines
            );

            let spawned = std::thread::Builder::new()
                .name(format!("shardtally-worker-{}", shard.index))
                .spawn(move || worker.run(tx));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    // Workers already running own their shards; the rest are ours
                    self.partitioner.discard_from(shard.index);
                    return Err(TallyError::WorkerSpawn {
                        worker: shard.index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!("Started {} workers", handles.len());
        Ok(handles)
    }

    /// Serial event loop; the only mutator of the aggregation state
    async fn drive(
        &mut self,
        mut aggregation: Aggregation,
        mut events: UnboundedReceiver<WorkerEvent>,
    ) -> TallyResult<AggregationOutcome> {
        loop {
            let event = match self.liveness_timeout {
                Some(limit) => match tokio::time::timeout(limit, events.recv()).await {
                    Ok(event) => event,
                    Err(_) => {
                        let gates = aggregation.gates();
                        error!(
                            "No worker event within {:?}; giving up with {} results and {} exits of {}",
                            limit, gates.results_received, gates.workers_exited, gates.expected
                        );
                        return Err(TallyError::LivenessTimeout {
                            waited: limit,
                            results: gates.results_received,
                            exited: gates.workers_exited,
                            expected: gates.expected,
                        });
                    }
                },
                None => events.recv().await,
            };

            let Some(event) = event else {
                let gates = aggregation.gates();
                return Err(TallyError::EventChannelClosed {
                    exited: gates.workers_exited,
                    expected: gates.expected,
                });
            };

            let step = aggregation.handle(event)?;
            self.phase = aggregation.phase();
            if step == Step::Terminated {
                return Ok(aggregation.finish());
            }
        }
    }

    fn transition(&mut self, next: Phase) {
        debug!("Coordinator {} -> {}", self.phase, next);
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{DomainExtractor, KeyError, LineExtractor};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_input(dir: &Path, lines: &[&str]) -> PathBuf {
        let path = dir.join("file.txt");
        let mut content = lines.join("\n");
        content.push('\n');
        fs::write(&path, content).unwrap();
        path
    }

    fn coordinator(dir: &TempDir, input: &Path, workers: usize, extractor: Arc<dyn KeyExtractor>) -> Coordinator {
        Coordinator::from_parts(
            Partitioner::new(input, None, workers).unwrap(),
            extractor,
            SolutionWriter::new(dir.path().join("out")),
            None,
        )
    }

    fn out_dir(dir: &TempDir) -> PathBuf {
        let out = dir.path().join("out");
        fs::create_dir_all(&out).unwrap();
        out
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_end_to_end_two_workers() {
        let dir = TempDir::new().unwrap();
        let out = out_dir(&dir);
        let input = write_input(dir.path(), &["a", "b", "a", "c"]);

        let summary = coordinator(&dir, &input, 2, Arc::new(LineExtractor))
            .run()
            .await
            .unwrap();

        let output = summary.output.expect("output written");
        assert_eq!(output.parent().unwrap(), out.as_path());
        assert_eq!(fs::read_to_string(&output).unwrap(), "a: 2\nb: 1\nc: 1\n");
        assert_eq!(summary.workers, 2);
        assert_eq!(summary.total_lines, 4);
        assert_eq!(summary.results_received, 2);
        assert_eq!(summary.workers_exited, 2);
        assert!(summary.failed_workers.is_empty());

        // Shards are gone, the input is untouched
        assert!(!dir.path().join("0-file.txt").exists());
        assert!(!dir.path().join("1-file.txt").exists());
        assert!(input.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_more_workers_than_lines() {
        let dir = TempDir::new().unwrap();
        out_dir(&dir);
        let input = write_input(
            dir.path(),
            &["https://www.example.com/a", "http://cdn.example.com/b"],
        );

        let summary = coordinator(&dir, &input, 3, Arc::new(DomainExtractor))
            .run()
            .await
            .unwrap();

        assert_eq!(summary.results_received, 3);
        let output = summary.output.expect("output written");
        assert_eq!(fs::read_to_string(output).unwrap(), "example.com: 2\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failing_worker_terminates_without_output() {
        let dir = TempDir::new().unwrap();
        let out = out_dir(&dir);
        // Worker 1 gets only the malformed line
        let input = write_input(dir.path(), &["https://a.example.com", "garbage"]);

        let summary = coordinator(&dir, &input, 2, Arc::new(DomainExtractor))
            .run()
            .await
            .unwrap();

        assert!(summary.output.is_none());
        assert_eq!(summary.results_received, 1);
        assert_eq!(summary.workers_exited, 2);
        assert_eq!(summary.failed_workers, vec![1]);
        assert_eq!(fs::read_dir(out).unwrap().count(), 0);
        // The failed worker's shard is left behind; the healthy one is removed
        assert!(!dir.path().join("0-file.txt").exists());
        assert!(dir.path().join("1-file.txt").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_results_match_sequential_count() {
        let dir = TempDir::new().unwrap();
        out_dir(&dir);
        let lines: Vec<String> = (0..500).map(|i| format!("key{}", (i * 7) % 13)).collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = write_input(dir.path(), &refs);

        let summary = coordinator(&dir, &input, 4, Arc::new(LineExtractor))
            .run()
            .await
            .unwrap();

        let mut expected = crate::stats::FrequencyTable::new();
        for l in &lines {
            expected.record(l);
        }
        let output = summary.output.expect("output written");
        assert_eq!(
            fs::read_to_string(output).unwrap(),
            crate::output::solution::format_table(&expected)
        );
        assert_eq!(summary.distinct_keys, 13);
        assert_eq!(summary.total_count, 500);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_hostless_urls_count_under_empty_key() {
        let dir = TempDir::new().unwrap();
        out_dir(&dir);
        let input = write_input(
            dir.path(),
            &[
                "http://a.example.com/x",
                "file:///tmp/x",
                "mailto:someone@example.org",
                "https://b.example.com",
            ],
        );

        let summary = coordinator(&dir, &input, 2, Arc::new(DomainExtractor))
            .run()
            .await
            .unwrap();

        assert!(summary.failed_workers.is_empty());
        let output = summary.output.expect("output written");
        assert_eq!(fs::read_to_string(output).unwrap(), ": 2\nexample.com: 2\n");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_non_utf8_input_completes() {
        let dir = TempDir::new().unwrap();
        out_dir(&dir);
        let input = dir.path().join("file.txt");
        fs::write(&input, b"caf\xe9\ncaf\xe9\nplain\n").unwrap();

        let summary = coordinator(&dir, &input, 2, Arc::new(LineExtractor))
            .run()
            .await
            .unwrap();

        let output = summary.output.expect("output written");
        assert_eq!(
            fs::read_to_string(output).unwrap(),
            "caf\u{FFFD}: 2\nplain: 1\n"
        );
    }

    #[tokio::test]
    async fn test_missing_input_is_fatal() {
        let dir = TempDir::new().unwrap();
        out_dir(&dir);
        let input = dir.path().join("absent.txt");

        let err = coordinator(&dir, &input, 2, Arc::new(LineExtractor))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, TallyError::InputRead { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_output_write_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        // No output directory created
        let input = write_input(dir.path(), &["a"]);

        let err = coordinator(&dir, &input, 1, Arc::new(LineExtractor))
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, TallyError::OutputWrite { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_liveness_timeout_fires_on_silent_worker() {
        let dir = TempDir::new().unwrap();
        out_dir(&dir);
        let input = write_input(dir.path(), &["slow"]);

        let stall = |_: &str| -> Result<String, KeyError> {
            std::thread::sleep(Duration::from_millis(500));
            Ok("slow".to_string())
        };
        let coordinator = Coordinator::from_parts(
            Partitioner::new(&input, None, 1).unwrap(),
            Arc::new(stall),
            SolutionWriter::new(dir.path().join("out")),
            Some(Duration::from_millis(50)),
        );

        let err = coordinator.run().await.unwrap_err();
        match err {
            TallyError::LivenessTimeout { results, exited, expected, .. } => {
                assert_eq!((results, exited, expected), (0, 0, 1));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_new_from_config() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            input: dir.path().join("file.txt"),
            output_dir: dir.path().to_path_buf(),
            ..Config::default()
        };

        let coordinator = Coordinator::new(&config, 3, Arc::new(LineExtractor)).unwrap();
        assert_eq!(coordinator.workers(), 3);
        assert_eq!(coordinator.phase(), Phase::Idle);

        assert!(matches!(
            Coordinator::new(&config, 0, Arc::new(LineExtractor)),
            Err(TallyError::InvalidWorkerCount)
        ));
    }
}
