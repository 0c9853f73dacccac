//! Final result artifact
//!
//! The aggregated table is written once, as `"<key>: <count>"` lines sorted by
//! count descending (ties by key ascending), to a new file named
//! `solution-<unix millis>.txt`. The file is created exclusively: an existing
//! file is never overwritten, a taken name moves on to the next millisecond.

use crate::error::{TallyError, TallyResult};
use crate::stats::FrequencyTable;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Name attempts before giving up on a unique artifact name
const MAX_NAME_ATTEMPTS: i64 = 64;

/// Render the sorted table, one newline-terminated record per key
pub fn format_table(table: &FrequencyTable) -> String {
    let mut out = String::new();
    for (key, count) in table.sorted_entries() {
        out.push_str(&key);
        out.push_str(": ");
        out.push_str(&count.to_string());
        out.push('\n');
    }
    out
}

/// Artifact file name for a given timestamp
pub fn solution_file_name(millis: i64) -> String {
    format!("solution-{}.txt", millis)
}

/// Writes result artifacts into one directory
#[derive(Debug, Clone)]
pub struct SolutionWriter {
    dir: PathBuf,
}

impl SolutionWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `table` to a freshly created, uniquely named file
    pub fn write(&self, table: &FrequencyTable) -> TallyResult<PathBuf> {
        let start = chrono::Utc::now().timestamp_millis();
        let contents = format_table(table);

        let mut attempt = 0;
        loop {
            let path = self.dir.join(solution_file_name(start + attempt));
            let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => file,
                Err(e)
                    if e.kind() == std::io::ErrorKind::AlreadyExists
                        && attempt + 1 < MAX_NAME_ATTEMPTS =>
                {
                    attempt += 1;
                    continue;
                }
                Err(source) => return Err(TallyError::OutputWrite { path, source }),
            };

            let mut writer = BufWriter::new(file);
            writer
                .write_all(contents.as_bytes())
                .map_err(|source| TallyError::OutputWrite {
                    path: path.clone(),
                    source,
                })?;
            let file = writer.into_inner().map_err(|e| TallyError::OutputWrite {
                path: path.clone(),
                source: e.into_error(),
            })?;
            file.sync_all().map_err(|source| TallyError::OutputWrite {
                path: path.clone(),
                source,
            })?;

            return Ok(path);
        }
    }
}
