//! Port between the profiler and a host plugin runtime.
//!
//! The host's registration tables are not a stable API. Everything the
//! patcher needs from them is expressed here; an adapter per host version
//! implements [`HostRuntime`], and nothing else in the profiler touches host
//! internals.

use crate::callable::Callable;
use crate::error::Result;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// A command an extension registered
#[derive(Debug, Clone)]
pub struct CommandDefinition {
    /// One-line help text
    pub description: String,
    /// Invoked with the raw argument string
    pub handler: Callable,
}

impl CommandDefinition {
    /// Command with the given description and handler
    pub fn new(description: impl Into<String>, handler: Callable) -> Self {
        Self {
            description: description.into(),
            handler,
        }
    }
}

/// A tool an extension exposes to the model
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    /// Tool name as seen by the model
    pub name: String,
    /// Description shown to the model
    pub description: String,
    /// Executor invoked with the tool arguments
    pub execute: Callable,
}

/// A tool together with the extension that registered it
#[derive(Debug, Clone)]
pub struct RegisteredTool {
    /// The tool itself
    pub definition: ToolDefinition,
    /// Identity of the registering extension
    pub extension_path: String,
}

/// The tables a host builds for one extension.
///
/// `None` means this host version has no such collection (or it could not be
/// recognized); the matching surface then stays uninstrumented.
#[derive(Debug, Clone, Default)]
pub struct ExtensionRecord {
    /// Extension identity, usually its source path
    pub path: String,
    /// Event name to handlers, in registration order
    pub handlers: Option<HashMap<String, Vec<Callable>>>,
    /// Command name to definition
    pub commands: Option<HashMap<String, CommandDefinition>>,
    /// Tool name to registered tool
    pub tools: Option<HashMap<String, RegisteredTool>>,
}

impl ExtensionRecord {
    /// Record with all three collections present and empty
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            handlers: Some(HashMap::new()),
            commands: Some(HashMap::new()),
            tools: Some(HashMap::new()),
        }
    }
}

/// Runs right after the host's bind-core entry point with every bound
/// extension's populated tables
pub type BindInterceptor = Arc<dyn Fn(&mut [ExtensionRecord]) + Send + Sync>;

/// Host runtime as seen by the patcher
pub trait HostRuntime: Send + Sync {
    /// Type name used in patch diagnostics
    fn runtime_name(&self) -> &str;

    /// Marker recording that this runtime was already patched
    fn patch_marker(&self) -> &AtomicBool;

    /// Wrap the bind-core entry point.
    ///
    /// After installation the interceptor runs once over the extensions bound
    /// so far, and again after every later bind.
    ///
    /// # Errors
    /// Returns [`crate::RuntimeError::ShapeMismatch`] when the entry point
    /// cannot be found
    fn intercept_bind_core(&self, interceptor: BindInterceptor) -> Result<()>;
}

/// Registration surface a host hands to each extension while it loads
pub trait ExtensionApi {
    /// Register a slash command
    fn register_command(&mut self, name: &str, command: CommandDefinition);

    /// Subscribe to a host event
    fn on(&mut self, event: &str, handler: Callable);

    /// Expose a tool to the model
    fn register_tool(&mut self, tool: ToolDefinition);
}
