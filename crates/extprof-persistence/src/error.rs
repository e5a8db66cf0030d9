//! Error types for snapshot persistence

use std::path::PathBuf;
use thiserror::Error;

/// Snapshot persistence errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Filesystem failure; the message carries the underlying I/O error
    #[error("{action} {}: {source}", .path.display())]
    Io {
        /// What was being attempted
        action: &'static str,
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A record could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A line parsed but is not valid at its position
    #[error("invalid snapshot record on line {line}: {reason}")]
    InvalidRecord {
        /// 1-based line number
        line: usize,
        /// What was wrong
        reason: String,
    },

    /// The file is empty or does not start with `session_meta`
    #[error("snapshot does not start with a session_meta record")]
    MissingSessionMeta,

    /// No home directory to derive the default profiles directory from
    #[error("could not determine home directory for default profiles path")]
    HomeDirUnavailable,
}

impl PersistenceError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, PersistenceError>;
