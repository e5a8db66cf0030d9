//! ext-prof Types - Core types for the extension runtime profiler
//!
//! This module defines the data model shared by the collector, the runtime
//! patcher, reporting and snapshot persistence.

pub mod aggregate;
pub mod patch;
pub mod sample;

pub use aggregate::{Aggregate, ExtensionSummary, HandlerAggregate};
pub use patch::{Coverage, CoverageState, OverheadSample, PatchStatus};
pub use sample::{HandlerKey, Sample, SurfaceKind};

/// Identity used when an extension path is blank or cannot be resolved
pub const DEFAULT_FALLBACK_IDENTITY: &str = "<unknown-extension>";

/// Schema version written into every snapshot's `session_meta` record
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;
