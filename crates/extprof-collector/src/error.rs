//! Error types for collector construction

use thiserror::Error;

/// Collector errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollectorError {
    /// The handler-key cap must allow at least one key
    #[error("max_handler_keys must be a positive integer, got {0}")]
    InvalidCap(usize),
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, CollectorError>;
