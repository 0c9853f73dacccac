//! Configuration validation

use super::*;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_input(config)?;
    validate_output(config)?;
    validate_shard_dir(config)?;

    if config.liveness_timeout_secs == Some(0) {
        anyhow::bail!("liveness_timeout_secs must be at least 1");
    }

    Ok(())
}

/// The input path must name a file
///
/// Existence is checked by the partitioner, which reports it as an input read
/// failure.
pub fn validate_input(config: &Config) -> Result<()> {
    if config.input.as_os_str().is_empty() {
        anyhow::bail!("input path must not be empty");
    }
    if config.input.is_dir() {
        anyhow::bail!("input {} is a directory", config.input.display());
    }
    Ok(())
}

/// The output directory must already exist
pub fn validate_output(config: &Config) -> Result<()> {
    if !config.output_dir.is_dir() {
        anyhow::bail!(
            "output directory {} does not exist or is not a directory",
            config.output_dir.display()
        );
    }
    Ok(())
}

pub fn validate_shard_dir(config: &Config) -> Result<()> {
    if let Some(ref dir) = config.shard_dir {
        if dir.exists() && !dir.is_dir() {
            anyhow::bail!("shard directory {} is not a directory", dir.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn valid(dir: &TempDir) -> Config {
        Config {
            input: dir.path().join("file.txt"),
            output_dir: dir.path().to_path_buf(),
            ..Config::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let dir = TempDir::new().unwrap();
        validate_config(&valid(&dir)).unwrap();
    }

    #[test]
    fn test_empty_input_rejected() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            input: PathBuf::new(),
            ..valid(&dir)
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_directory_input_rejected() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            input: dir.path().to_path_buf(),
            ..valid(&dir)
        };
        assert!(validate_input(&config).is_err());
    }

    #[test]
    fn test_missing_output_dir_rejected() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            output_dir: dir.path().join("nope"),
            ..valid(&dir)
        };
        assert!(validate_output(&config).is_err());
    }

    #[test]
    fn test_shard_dir_must_be_directory() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain");
        fs::write(&file, "").unwrap();
        let config = Config {
            shard_dir: Some(file),
            ..valid(&dir)
        };
        assert!(validate_shard_dir(&config).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            liveness_timeout_secs: Some(0),
            ..valid(&dir)
        };
        assert!(validate_config(&config).is_err());
    }
}
