//! ext-prof Runtime Instrumentation
//!
//! Wraps the callables a host plugin runtime registers per extension so that
//! every invocation is timed to completion and folded into a
//! [`extprof_collector::Collector`].
//!
//! ## Features
//!
//! - Host port ([`HostRuntime`]) with an in-process adapter ([`ExtensionRunner`])
//! - Idempotent timing wrapper that awaits full completion
//! - Patch-once semantics with independent per-surface coverage
//! - Fail-soft host discovery (linked handle, resolver hook, filesystem walk)
//! - Overhead calibration of the wrapper itself

#![deny(unsafe_code, dead_code, unused_imports, unused_variables, missing_docs)]

pub mod callable;
pub mod clock;
pub mod discovery;
pub mod error;
pub mod host;
pub mod overhead;
pub mod patch;
pub mod runner;
pub mod wrap;

pub use callable::{Callable, HandlerFuture, HandlerResult};
pub use clock::{Clock, MonotonicClock, ScriptedClock};
pub use discovery::{DiscoveryConfig, HostLocator, Located, ResolverHook, RunnerLoader};
pub use error::RuntimeError;
pub use host::{
    BindInterceptor, CommandDefinition, ExtensionApi, ExtensionRecord, HostRuntime,
    RegisteredTool, ToolDefinition,
};
pub use overhead::calibrate_overhead;
pub use patch::{CoverageTracker, Patcher};
pub use runner::{ExtensionBuilder, ExtensionRunner};
pub use wrap::{RecordGate, TimingWrapper};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Callable, ExtensionApi, ExtensionRunner, HostRuntime, Patcher, RuntimeError, TimingWrapper,
    };
}
