use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors. Problems with individual files or directories are carried as
/// data (`FileFailure`, `WalkError`) and never abort a run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Path does not exist: {}", .0.display())]
    MissingRoot(PathBuf),

    #[error("Invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("Invalid {kind} pattern for {language}: {source}")]
    Regex {
        language: String,
        kind: &'static str,
        source: regex::Error,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
