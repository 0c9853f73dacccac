//! Key extraction
//!
//! A [`KeyExtractor`] turns one input line into the key it is counted under.
//! Extractors are pure: the same line always yields the same key or the same
//! failure. Workers treat a failure as fatal (see [`crate::worker`]).
//!
//! # Example
//!
//! ```
//! use shardtally::extract::{DomainExtractor, KeyExtractor};
//!
//! let extractor = DomainExtractor;
//! let key = extractor.extract("https://www.news.example.com/a?b=c").unwrap();
//! assert_eq!(key, "example.com");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Why a line produced no key
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("not an absolute URL: {line:?}")]
    InvalidUrl {
        line: String,
        #[source]
        source: url::ParseError,
    },

    /// Raised by caller-supplied extractors
    #[error("{0}")]
    Rejected(String),
}

/// Pure function from a line to its aggregation key
pub trait KeyExtractor: Send + Sync {
    fn extract(&self, line: &str) -> Result<String, KeyError>;
}

impl<F> KeyExtractor for F
where
    F: Fn(&str) -> Result<String, KeyError> + Send + Sync,
{
    fn extract(&self, line: &str) -> Result<String, KeyError> {
        self(line)
    }
}

/// Registrable domain of a URL line: the last two labels of its host
///
/// `https://www.news.example.com/path` is counted as `example.com`. Hosts with
/// a single label (`http://localhost/`) are kept whole. URLs without a host
/// (`file:///tmp/x`, `mailto:a@b`) are counted under the empty key.
#[derive(Debug, Clone, Copy, Default)]
pub struct DomainExtractor;

impl KeyExtractor for DomainExtractor {
    fn extract(&self, line: &str) -> Result<String, KeyError> {
        let url = url::Url::parse(line).map_err(|source| KeyError::InvalidUrl {
            line: line.to_string(),
            source,
        })?;

        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host,
            _ => return Ok(String::new()),
        };

        let mut labels: Vec<&str> = host.rsplit('.').take(2).collect();
        labels.reverse();
        Ok(labels.join("."))
    }
}

/// Counts every distinct line verbatim
#[derive(Debug, Clone, Copy, Default)]
pub struct LineExtractor;

impl KeyExtractor for LineExtractor {
    fn extract(&self, line: &str) -> Result<String, KeyError> {
        Ok(line.to_string())
    }
}

/// Built-in extractor selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    /// Last two host labels of a URL line
    #[default]
    Domain,
    /// The whole line
    Line,
}

impl KeyKind {
    /// Build the shared extractor handed to every worker
    pub fn extractor(self) -> Arc<dyn KeyExtractor> {
        match self {
            KeyKind::Domain => Arc::new(DomainExtractor),
            KeyKind::Line => Arc::new(LineExtractor),
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Domain => write!(f, "domain"),
            KeyKind::Line => write!(f, "line"),
        }
    }
}
