//! ext-prof Aggregate Collector
//!
//! Bounded-cardinality, in-memory rolling statistics for wrapped extension
//! callables, plus the text renderers used by the `/ext-prof` command.
//!
//! ## Features
//!
//! - Per-extension and per-handler aggregates updated under one lock
//! - Hard cap on distinct handler keys; overflow is counted, never stored
//! - Stable "most expensive first" summaries
//! - Status and verbose report formatting with an overhead budget line

#![deny(unsafe_code, unused_imports, missing_docs)]

pub mod collector;
pub mod error;
pub mod report;

pub use collector::{Collector, CollectorSnapshot, CollectorStats};
pub use error::CollectorError;
pub use report::{
    build_extension_rows, compute_overhead_pct, format_status, format_verbose_report,
    ExtensionRow, OverheadView, StatusView,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Collector, CollectorError, CollectorStats};
}
