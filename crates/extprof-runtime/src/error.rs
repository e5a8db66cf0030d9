//! Error types for host discovery and patching

use extprof_collector::CollectorError;
use extprof_types::SurfaceKind;
use std::path::PathBuf;
use thiserror::Error;

/// Runtime instrumentation errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No probed location held the host runtime module
    #[error("host runtime module not found; checked: {}", .checked.join(", "))]
    ModuleNotFound {
        /// Every path that was probed, in order
        checked: Vec<String>,
    },

    /// The runtime was found but does not have the expected entry point
    #[error("host runtime shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A module path was located but nothing can turn it into a runtime handle
    #[error("no loader available for host runtime module {}", .0.display())]
    NoLoader(PathBuf),

    /// The loader rejected the located module
    #[error("failed to load host runtime module {}: {reason}", .path.display())]
    Load {
        /// Located module path
        path: PathBuf,
        /// Loader diagnostic
        reason: String,
    },

    /// No extension registered a handler under this name
    #[error("unknown {surface} '{name}'")]
    UnknownHandler {
        /// Surface that was looked up
        surface: SurfaceKind,
        /// Requested name
        name: String,
    },

    /// Scratch collector could not be built
    #[error("collector error: {0}")]
    Collector(#[from] CollectorError),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, RuntimeError>;
