//! Runtime patcher: substitutes timed callables into a host's tables once

use crate::clock::Clock;
use crate::discovery::{HostLocator, RunnerLoader};
use crate::host::{BindInterceptor, ExtensionRecord, HostRuntime};
use crate::wrap::{RecordGate, TimingWrapper};
use extprof_collector::Collector;
use extprof_types::{Coverage, CoverageState, PatchStatus, SurfaceKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Surfaces that have had at least one callable wrapped, across all binds
#[derive(Debug, Default)]
pub struct CoverageTracker {
    events: AtomicBool,
    commands: AtomicBool,
    tools: AtomicBool,
}

impl CoverageTracker {
    fn flag(&self, surface: SurfaceKind) -> &AtomicBool {
        match surface {
            SurfaceKind::Event => &self.events,
            SurfaceKind::Command => &self.commands,
            SurfaceKind::Tool => &self.tools,
        }
    }

    /// Mark `surface` as instrumented
    pub fn mark(&self, surface: SurfaceKind) {
        self.flag(surface).store(true, Ordering::Release);
    }

    /// Current per-surface coverage
    #[must_use]
    pub fn snapshot(&self) -> Coverage {
        let mut coverage = Coverage::missing();
        for surface in SurfaceKind::ALL {
            let instrumented = self.flag(surface).load(Ordering::Acquire);
            coverage.set(surface, CoverageState::from_bool(instrumented));
        }
        coverage
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct WrapCounts {
    events: usize,
    commands: usize,
    tools: usize,
}

/// Wraps every callable in the given tables. Collections that are absent
/// are skipped; each surface is handled on its own.
fn instrument_records(wrapper: &TimingWrapper, records: &mut [ExtensionRecord]) -> WrapCounts {
    let mut counts = WrapCounts::default();

    for record in records.iter_mut() {
        let extension = record.path.as_str();

        if let Some(handlers) = record.handlers.as_mut() {
            for (event, list) in handlers.iter_mut() {
                for handler in list.iter_mut() {
                    *handler = wrapper.wrap(extension, SurfaceKind::Event, event, handler);
                    counts.events += 1;
                }
            }
        }

        if let Some(commands) = record.commands.as_mut() {
            for (name, command) in commands.iter_mut() {
                command.handler = wrapper.wrap(extension, SurfaceKind::Command, name, &command.handler);
                counts.commands += 1;
            }
        }

        if let Some(tools) = record.tools.as_mut() {
            for (name, tool) in tools.iter_mut() {
                let owner = if tool.extension_path.trim().is_empty() {
                    extension
                } else {
                    tool.extension_path.as_str()
                };
                tool.definition.execute =
                    wrapper.wrap(owner, SurfaceKind::Tool, name, &tool.definition.execute);
                counts.tools += 1;
            }
        }
    }

    counts
}

/// Installs timing wrappers into a host runtime
#[derive(Debug)]
pub struct Patcher {
    wrapper: TimingWrapper,
    coverage: Arc<CoverageTracker>,
}

impl Patcher {
    /// Patcher recording into `collector` with a monotonic clock
    #[must_use]
    pub fn new(collector: Arc<Collector>) -> Self {
        Self {
            wrapper: TimingWrapper::new(collector),
            coverage: Arc::new(CoverageTracker::default()),
        }
    }

    /// Replace the clock used by installed wrappers
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.wrapper = self.wrapper.with_clock(clock);
        self
    }

    /// Gate checked by installed wrappers each time an invocation settles
    #[must_use]
    pub fn with_gate(mut self, gate: RecordGate) -> Self {
        self.wrapper = self.wrapper.with_gate(gate);
        self
    }

    /// Live coverage, updated on every bind after patching
    #[must_use]
    pub fn coverage(&self) -> Coverage {
        self.coverage.snapshot()
    }

    /// Patch `host` so every bound callable is timed.
    ///
    /// Never fails: a second attempt on the same runtime reports
    /// `"already patched"`, and a host whose bind entry point cannot be
    /// intercepted reports the diagnostic with `patched: false`.
    pub fn patch(&self, host: &dyn HostRuntime) -> PatchStatus {
        let marker = host.patch_marker();
        if marker
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("{} already patched; skipping", host.runtime_name());
            return PatchStatus::already_patched();
        }

        let wrapper = self.wrapper.clone();
        let coverage = Arc::clone(&self.coverage);
        let interceptor: BindInterceptor = Arc::new(move |records: &mut [ExtensionRecord]| {
            let counts = instrument_records(&wrapper, records);
            if counts.events > 0 {
                coverage.mark(SurfaceKind::Event);
            }
            if counts.commands > 0 {
                coverage.mark(SurfaceKind::Command);
            }
            if counts.tools > 0 {
                coverage.mark(SurfaceKind::Tool);
            }
            debug!(
                "Instrumented {} extension(s): {} event handler(s), {} command(s), {} tool(s)",
                records.len(),
                counts.events,
                counts.commands,
                counts.tools
            );
        });

        match host.intercept_bind_core(interceptor) {
            Ok(()) => {
                let coverage = self.coverage.snapshot();
                info!(
                    "Patched {} (events={}, commands={}, tools={})",
                    host.runtime_name(),
                    coverage.events,
                    coverage.commands,
                    coverage.tools
                );
                PatchStatus::patched(format!("patched {}", host.runtime_name()), coverage)
            }
            Err(e) => {
                marker.store(false, Ordering::Release);
                warn!("Could not patch {}: {}", host.runtime_name(), e);
                PatchStatus::failed(e.to_string())
            }
        }
    }

    /// Locate the host runtime, then patch it.
    ///
    /// Discovery and loading failures are reported as an unpatched status
    /// carrying the diagnostic.
    pub fn locate_and_patch(&self, locator: &HostLocator, loader: Option<&dyn RunnerLoader>) -> PatchStatus {
        let host = match locator.locate().and_then(|located| located.into_host(loader)) {
            Ok(host) => host,
            Err(e) => {
                warn!("Host runtime unavailable, profiler stays inert: {}", e);
                return PatchStatus::failed(e.to_string());
            }
        };
        self.patch(host.as_ref())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::callable::Callable;
    use crate::error::{Result, RuntimeError};
    use crate::host::{CommandDefinition, ExtensionApi, ToolDefinition};
    use crate::runner::ExtensionRunner;
    use serde_json::Value;

    fn noop() -> Callable {
        Callable::new(|_| async { Ok(Value::Null) })
    }

    fn bind_sample(runner: &ExtensionRunner, path: &str) {
        let mut ext = runner.load(path);
        ext.on("turn_start", noop());
        ext.register_command("greet", CommandDefinition::new("say hi", noop()));
        ext.register_tool(ToolDefinition {
            name: "grep".into(),
            description: "search".into(),
            execute: noop(),
        });
        runner.bind_core(ext);
    }

    struct Opaque {
        marker: AtomicBool,
    }

    impl HostRuntime for Opaque {
        fn runtime_name(&self) -> &str {
            "OpaqueRunner"
        }

        fn patch_marker(&self) -> &AtomicBool {
            &self.marker
        }

        fn intercept_bind_core(&self, _interceptor: BindInterceptor) -> Result<()> {
            Err(RuntimeError::ShapeMismatch("bindCore not found".into()))
        }
    }

    #[tokio::test]
    async fn test_patch_covers_all_surfaces() {
        let collector = Arc::new(Collector::new(100).unwrap());
        let runner = ExtensionRunner::new();
        bind_sample(&runner, "a.ts");

        let patcher = Patcher::new(Arc::clone(&collector));
        let status = patcher.patch(&runner);
        assert!(status.patched);
        assert_eq!(status.reason, "patched ExtensionRunner");
        assert_eq!(status.coverage.events, CoverageState::Instrumented);
        assert_eq!(status.coverage.commands, CoverageState::Instrumented);
        assert_eq!(status.coverage.tools, CoverageState::Instrumented);

        runner.emit("turn_start", Value::Null).await;
        runner.execute_command("greet", Value::Null).await.unwrap();
        runner.execute_tool("grep", Value::Null).await.unwrap();

        let handlers = collector.summarize_by_handler();
        assert_eq!(handlers.len(), 3);
        assert!(handlers.iter().all(|h| h.extension == "a.ts" && h.stats.call_count == 1));
    }

    #[tokio::test]
    async fn test_second_patch_is_rejected_without_double_counting() {
        let collector = Arc::new(Collector::new(100).unwrap());
        let runner = ExtensionRunner::new();
        bind_sample(&runner, "a.ts");

        let patcher = Patcher::new(Arc::clone(&collector));
        assert!(patcher.patch(&runner).patched);

        let second = Patcher::new(Arc::clone(&collector)).patch(&runner);
        assert_eq!(second, PatchStatus::already_patched());

        runner.emit("turn_start", Value::Null).await;
        let handlers = collector.summarize_by_handler();
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].stats.call_count, 1);
    }

    #[tokio::test]
    async fn test_rebinding_does_not_rewrap() {
        let collector = Arc::new(Collector::new(100).unwrap());
        let runner = ExtensionRunner::new();
        let patcher = Patcher::new(Arc::clone(&collector));
        patcher.patch(&runner);

        // Every bind re-walks all tables; earlier wrappers must stay single
        bind_sample(&runner, "a.ts");
        bind_sample(&runner, "b.ts");
        bind_sample(&runner, "c.ts");

        runner.emit("turn_start", Value::Null).await;
        let rows = collector.summarize_by_extension();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row.stats.call_count == 1));
    }

    #[test]
    fn test_coverage_is_per_surface() {
        let collector = Arc::new(Collector::new(100).unwrap());
        let runner = ExtensionRunner::without_tools();
        bind_sample(&runner, "a.ts");

        let status = Patcher::new(collector).patch(&runner);
        assert!(status.patched);
        assert_eq!(status.coverage.events, CoverageState::Instrumented);
        assert_eq!(status.coverage.commands, CoverageState::Instrumented);
        assert_eq!(status.coverage.tools, CoverageState::Missing);
    }

    #[test]
    fn test_live_coverage_follows_later_binds() {
        let collector = Arc::new(Collector::new(100).unwrap());
        let runner = ExtensionRunner::new();
        let patcher = Patcher::new(collector);

        let status = patcher.patch(&runner);
        assert!(status.patched);
        assert_eq!(status.coverage, Coverage::missing());

        let mut ext = runner.load("late.ts");
        ext.on("turn_end", noop());
        runner.bind_core(ext);

        let live = patcher.coverage();
        assert_eq!(live.events, CoverageState::Instrumented);
        assert_eq!(live.commands, CoverageState::Missing);
    }

    #[test]
    fn test_shape_mismatch_fails_soft() {
        let host = Opaque {
            marker: AtomicBool::new(false),
        };
        let patcher = Patcher::new(Arc::new(Collector::new(10).unwrap()));
        let status = patcher.patch(&host);
        assert!(!status.patched);
        assert_eq!(status.reason, "host runtime shape mismatch: bindCore not found");
        assert_eq!(status.coverage, Coverage::missing());
        // A failed attempt does not leave the marker behind
        assert!(!host.marker.load(Ordering::Acquire));
    }
}
