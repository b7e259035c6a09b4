//! Dependency pipeline error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving or installing a dependency.
///
/// None of these abort a batch: the pipeline reports them per reference
/// (or per file, for `Filesystem`) and moves on.
#[derive(Error, Debug)]
pub enum DependError {
    #[error("invalid dependency reference '{input}': {reason}")]
    InvalidReference { input: String, reason: &'static str },

    #[error("no reachable archive for {0}")]
    NotFound(String),

    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {message}", path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("archive error: {0}")]
    Archive(String),
}

impl DependError {
    /// Wrap an IO error with the path it happened on.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub fn transport(url: &str, message: impl ToString) -> Self {
        Self::Transport {
            url: url.to_string(),
            message: message.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DependError>;
