//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! Settings are layered: defaults, then the TOML file, then the command line.
//!
//! The worker count is deliberately absent: it is taken from the number of
//! available CPUs at startup.

pub mod cli;
pub mod toml;
pub mod validator;

use crate::extract::KeyKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Default input file name
pub const DEFAULT_INPUT: &str = "file.txt";

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Line-delimited input file
    pub input: PathBuf,
    /// Directory for the solution file
    pub output_dir: PathBuf,
    /// Directory for shard files; next to the input when unset
    pub shard_dir: Option<PathBuf>,
    /// Key extraction mode
    pub key: KeyKind,
    /// Opt-in liveness check on the worker event queue
    pub liveness_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output_dir: PathBuf::from("."),
            shard_dir: None,
            key: KeyKind::default(),
            liveness_timeout_secs: None,
        }
    }
}

impl Config {
    pub fn liveness_timeout(&self) -> Option<Duration> {
        self.liveness_timeout_secs.map(Duration::from_secs)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Input:      {}", self.input.display())?;
        writeln!(f, "  Output dir: {}", self.output_dir.display())?;
        match &self.shard_dir {
            Some(dir) => writeln!(f, "  Shard dir:  {}", dir.display())?,
            None => writeln!(f, "  Shard dir:  (next to input)")?,
        }
        writeln!(f, "  Key:        {}", self.key)?;
        match self.liveness_timeout_secs {
            Some(secs) => write!(f, "  Liveness:   {}s", secs),
            None => write!(f, "  Liveness:   wait indefinitely"),
        }
    }
}
