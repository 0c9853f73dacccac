//! CLI argument parsing using clap

use crate::extract::KeyKind;
use clap::Parser;
use std::path::PathBuf;

/// shardtally - split a line file across all CPUs, count keys, merge the counts
#[derive(Parser, Debug, Default)]
#[command(name = "shardtally")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Input file, one record per line (default: file.txt)
    #[arg(short = 'i', long, env = "FILE_NAME", value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// TOML configuration file; command-line options take precedence
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory the solution file is written to (default: current directory)
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Directory for intermediate shard files (default: next to the input)
    #[arg(long, value_name = "DIR")]
    pub shard_dir: Option<PathBuf>,

    /// How a line is turned into the key it is counted under
    #[arg(long, value_enum)]
    pub key: Option<KeyKind>,

    /// Fail if no worker reports for this many seconds (default: wait forever)
    #[arg(long, value_name = "SECS")]
    pub liveness_timeout: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.liveness_timeout == Some(0) {
            anyhow::bail!("--liveness-timeout must be at least 1 second");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let cli = Cli::try_parse_from([
            "shardtally",
            "--input",
            "urls.txt",
            "-o",
            "/tmp/out",
            "--shard-dir",
            "/scratch",
            "--key",
            "line",
            "--liveness-timeout",
            "30",
            "--debug",
        ])
        .unwrap();

        assert_eq!(cli.input, Some(PathBuf::from("urls.txt")));
        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/out")));
        assert_eq!(cli.shard_dir, Some(PathBuf::from("/scratch")));
        assert_eq!(cli.key, Some(KeyKind::Line));
        assert_eq!(cli.liveness_timeout, Some(30));
        assert!(cli.debug);
        assert!(!cli.dry_run);
        cli.validate().unwrap();
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let cli = Cli::try_parse_from(["shardtally", "--liveness-timeout", "0"]).unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_unknown_key_kind_rejected() {
        assert!(Cli::try_parse_from(["shardtally", "--key", "hostname"]).is_err());
    }
}
