//! In-process extension runner.
//!
//! A minimal host runtime: extensions register handlers through an
//! [`ExtensionBuilder`], [`ExtensionRunner::bind_core`] moves the resulting
//! tables into the runner, and the dispatch methods invoke whatever callables
//! the tables hold at that moment. It implements [`HostRuntime`] so the
//! patcher can instrument it.

use crate::callable::{Callable, HandlerResult};
use crate::error::{Result, RuntimeError};
use crate::host::{
    BindInterceptor, CommandDefinition, ExtensionApi, ExtensionRecord, HostRuntime,
    RegisteredTool, ToolDefinition,
};
use extprof_types::SurfaceKind;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Collects one extension's registrations before it is bound
#[derive(Debug)]
pub struct ExtensionBuilder {
    record: ExtensionRecord,
}

impl ExtensionBuilder {
    /// Identity the registrations will be bound under
    #[must_use]
    pub fn path(&self) -> &str {
        &self.record.path
    }
}

impl ExtensionApi for ExtensionBuilder {
    fn register_command(&mut self, name: &str, command: CommandDefinition) {
        if let Some(commands) = self.record.commands.as_mut() {
            commands.insert(name.to_string(), command);
        }
    }

    fn on(&mut self, event: &str, handler: Callable) {
        if let Some(handlers) = self.record.handlers.as_mut() {
            handlers.entry(event.to_string()).or_default().push(handler);
        }
    }

    fn register_tool(&mut self, tool: ToolDefinition) {
        let extension_path = self.record.path.clone();
        if let Some(tools) = self.record.tools.as_mut() {
            tools.insert(
                tool.name.clone(),
                RegisteredTool {
                    definition: tool,
                    extension_path,
                },
            );
        }
    }
}

/// Host runtime holding bound extensions and dispatching to their callables
pub struct ExtensionRunner {
    name: String,
    tools_supported: bool,
    records: Mutex<Vec<ExtensionRecord>>,
    interceptors: Mutex<Vec<BindInterceptor>>,
    patched: AtomicBool,
}

impl ExtensionRunner {
    /// Runner supporting events, commands and tools
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "ExtensionRunner".to_string(),
            tools_supported: true,
            records: Mutex::new(Vec::new()),
            interceptors: Mutex::new(Vec::new()),
            patched: AtomicBool::new(false),
        }
    }

    /// Runner for a host version without tool support; bound extensions
    /// carry no tool table at all
    #[must_use]
    pub fn without_tools() -> Self {
        Self {
            tools_supported: false,
            ..Self::new()
        }
    }

    fn records(&self) -> MutexGuard<'_, Vec<ExtensionRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn interceptors(&self) -> MutexGuard<'_, Vec<BindInterceptor>> {
        self.interceptors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start loading an extension identified by `path`
    #[must_use]
    pub fn load(&self, path: impl Into<String>) -> ExtensionBuilder {
        let mut record = ExtensionRecord::new(path);
        if !self.tools_supported {
            record.tools = None;
        }
        ExtensionBuilder { record }
    }

    /// Bind a loaded extension into the runner's tables, then run every
    /// installed interceptor over all bound extensions
    pub fn bind_core(&self, extension: ExtensionBuilder) {
        // Records first: an interceptor installed after this point still
        // walks the new record once it gets the lock
        let mut records = self.records();
        let interceptors = self.interceptors().clone();
        debug!("Binding extension {}", extension.record.path);
        records.push(extension.record);
        for interceptor in &interceptors {
            interceptor(records.as_mut_slice());
        }
    }

    /// Number of bound extensions
    #[must_use]
    pub fn extension_count(&self) -> usize {
        self.records().len()
    }

    /// Event handlers currently registered for `event`, in bind order
    #[must_use]
    pub fn event_handlers(&self, event: &str) -> Vec<Callable> {
        self.records()
            .iter()
            .filter_map(|record| record.handlers.as_ref())
            .filter_map(|handlers| handlers.get(event))
            .flat_map(|list| list.iter().cloned())
            .collect()
    }

    /// Command handler currently registered under `name`
    #[must_use]
    pub fn command(&self, name: &str) -> Option<Callable> {
        self.records()
            .iter()
            .filter_map(|record| record.commands.as_ref())
            .find_map(|commands| commands.get(name))
            .map(|command| command.handler.clone())
    }

    /// Tool executor currently registered under `name`
    #[must_use]
    pub fn tool(&self, name: &str) -> Option<Callable> {
        self.records()
            .iter()
            .filter_map(|record| record.tools.as_ref())
            .find_map(|tools| tools.get(name))
            .map(|tool| tool.definition.execute.clone())
    }

    /// Invoke every handler for `event` in order, collecting each outcome
    pub async fn emit(&self, event: &str, payload: Value) -> Vec<HandlerResult> {
        let handlers = self.event_handlers(event);
        let mut results = Vec::with_capacity(handlers.len());
        for handler in handlers {
            results.push(handler.call(payload.clone()).await);
        }
        results
    }

    /// Run a registered command
    ///
    /// # Errors
    /// Fails with [`RuntimeError::UnknownHandler`] for an unknown name, or
    /// with whatever the command handler fails with
    pub async fn execute_command(&self, name: &str, args: Value) -> HandlerResult {
        let handler = self.command(name).ok_or_else(|| RuntimeError::UnknownHandler {
            surface: SurfaceKind::Command,
            name: name.to_string(),
        })?;
        handler.call(args).await
    }

    /// Run a registered tool
    ///
    /// # Errors
    /// Fails with [`RuntimeError::UnknownHandler`] for an unknown name, or
    /// with whatever the tool executor fails with
    pub async fn execute_tool(&self, name: &str, args: Value) -> HandlerResult {
        let execute = self.tool(name).ok_or_else(|| RuntimeError::UnknownHandler {
            surface: SurfaceKind::Tool,
            name: name.to_string(),
        })?;
        execute.call(args).await
    }
}

impl fmt::Debug for ExtensionRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionRunner")
            .field("name", &self.name)
            .field("tools_supported", &self.tools_supported)
            .field("extensions", &self.extension_count())
            .field("interceptors", &self.interceptors().len())
            .finish_non_exhaustive()
    }
}

impl Default for ExtensionRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRuntime for ExtensionRunner {
    fn runtime_name(&self) -> &str {
        &self.name
    }

    fn patch_marker(&self) -> &AtomicBool {
        &self.patched
    }

    fn intercept_bind_core(&self, interceptor: BindInterceptor) -> Result<()> {
        self.interceptors().push(interceptor.clone());
        let mut records = self.records();
        interceptor(records.as_mut_slice());
        Ok(())
    }
}
