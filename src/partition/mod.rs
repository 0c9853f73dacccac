//! Round-robin partitioning of the source file into shards
//!
//! The partitioner reads the source once, sending line `k` (0-based) to shard
//! `k mod N`. Shards are plain files named `<index>-<source file name>`.
//!
//! Lines end at `\n` or `\r\n`, and a final line without a newline still
//! counts. Input bytes that are not valid UTF-8 are decoded lossily (each bad
//! sequence becomes U+FFFD), so every shard is UTF-8 text terminated by `\n`.
//!
//! [`Partitioner::run`] returns only after every shard has been flushed,
//! synced and closed. The coordinator must not start a worker before that,
//! so a worker never reads a shard that is still open for writing. On any
//! failure every shard created so far is removed before the error is returned.
//!
//! # Example
//!
//! ```no_run
//! use shardtally::partition::Partitioner;
//!
//! let partitioner = Partitioner::new("urls.txt", None, 4)?;
//! let report = partitioner.run()?;
//! assert_eq!(report.shards.len(), 4);
//! # Ok::<(), shardtally::error::TallyError>(())
//! ```

use crate::error::{TallyError, TallyResult};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// One persisted shard, ready to be handed to a worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    /// Worker index this shard belongs to
    pub index: usize,
    pub path: PathBuf,
    /// Number of lines written
    pub lines: usize,
}

/// Outcome of a completed partition
#[derive(Debug, Clone)]
pub struct PartitionReport {
    /// Shards ordered by index
    pub shards: Vec<Shard>,
    pub total_lines: usize,
}

/// Splits one line stream into N shard files
#[derive(Debug, Clone)]
pub struct Partitioner {
    source: PathBuf,
    shard_dir: PathBuf,
    workers: usize,
}

impl Partitioner {
    /// Create a partitioner for `source`
    ///
    /// Shards go to `shard_dir`, or next to the source when `None`.
    pub fn new(
        source: impl Into<PathBuf>,
        shard_dir: Option<PathBuf>,
        workers: usize,
    ) -> TallyResult<Self> {
        if workers == 0 {
            return Err(TallyError::InvalidWorkerCount);
        }

        let source = source.into();
        let shard_dir = shard_dir.unwrap_or_else(|| match source.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        });

        Ok(Self {
            source,
            shard_dir,
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Deterministic path of shard `index`
    pub fn shard_path(&self, index: usize) -> PathBuf {
        let name = self
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        self.shard_dir.join(format!("{}-{}", index, name))
    }

    /// Read the source file and write all shards
    pub fn run(&self) -> TallyResult<PartitionReport> {
        let input = File::open(&self.source).map_err(|source| TallyError::InputRead {
            path: self.source.clone(),
            source,
        })?;

        self.split(BufReader::new(input))
    }

    /// Partition an already-open line stream
    ///
    /// Read errors are reported against the configured source path.
    pub fn split<R: BufRead>(&self, reader: R) -> TallyResult<PartitionReport> {
        info!(
            "Splitting {} into {} shards",
            self.source.display(),
            self.workers
        );

        let result = self.write_shards(reader);
        if result.is_err() {
            self.discard_shards();
        }
        result
    }

    fn write_shards<R: BufRead>(&self, mut reader: R) -> TallyResult<PartitionReport> {
        let paths: Vec<PathBuf> = (0..self.workers).map(|i| self.shard_path(i)).collect();

        let mut writers = Vec::with_capacity(self.workers);
        for path in &paths {
            let file = File::create(path).map_err(|source| TallyError::ShardWrite {
                path: path.clone(),
                source,
            })?;
            writers.push(BufWriter::new(file));
        }

        let mut counts = vec![0usize; self.workers];
        let mut total_lines = 0usize;

        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|source| TallyError::InputRead {
                    path: self.source.clone(),
                    source,
                })?;
            if read == 0 {
                break;
            }

            let line = String::from_utf8_lossy(trim_line_ending(&buf));
            let idx = total_lines % self.workers;
            writeln!(writers[idx], "{}", line).map_err(|source| TallyError::ShardWrite {
                path: paths[idx].clone(),
                source,
            })?;

            counts[idx] += 1;
            total_lines += 1;
        }

        debug!("Closing {} shard writers", writers.len());

        // Flush, sync and close every shard before reporting completion
        for (writer, path) in writers.into_iter().zip(&paths) {
            let file = writer.into_inner().map_err(|e| TallyError::ShardWrite {
                path: path.clone(),
                source: e.into_error(),
            })?;
            file.sync_all().map_err(|source| TallyError::ShardWrite {
                path: path.clone(),
                source,
            })?;
        }

        info!("Shards closed ({} lines), workers may start", total_lines);

        let shards = paths
            .into_iter()
            .zip(counts)
            .enumerate()
            .map(|(index, (path, lines))| Shard { index, path, lines })
            .collect();

        Ok(PartitionReport {
            shards,
            total_lines,
        })
    }

    /// Remove every shard that may have been created by a failed run
    fn discard_shards(&self) {
        self.discard_from(0);
    }

    /// Remove shards `first..N`, which no worker has claimed
    pub fn discard_from(&self, first: usize) {
        for index in first..self.workers {
            let path = self.shard_path(index);
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed partial shard {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove partial shard {}: {}", path.display(), e),
            }
        }
    }
}

/// Strip one trailing `\n` or `\r\n`
fn trim_line_ending(record: &[u8]) -> &[u8] {
    match record.strip_suffix(b"\n") {
        Some(line) => line.strip_suffix(b"\r").unwrap_or(line),
        None => record,
    }
}
