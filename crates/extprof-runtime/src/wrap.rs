//! Timing wrapper for registered callables

use crate::callable::{Callable, HandlerFuture};
use crate::clock::{Clock, MonotonicClock};
use extprof_collector::Collector;
use extprof_types::{Sample, SurfaceKind};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Checked when an invocation settles; `false` skips recording
pub type RecordGate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Produces timed versions of callables that record into one collector
#[derive(Clone)]
pub struct TimingWrapper {
    collector: Arc<Collector>,
    clock: Arc<dyn Clock>,
    gate: Option<RecordGate>,
}

impl TimingWrapper {
    /// Wrapper using a monotonic clock and no gate
    #[must_use]
    pub fn new(collector: Arc<Collector>) -> Self {
        Self {
            collector,
            clock: Arc::new(MonotonicClock::new()),
            gate: None,
        }
    }

    /// Replace the time source
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Only record while `gate` returns true
    #[must_use]
    pub fn with_gate(mut self, gate: RecordGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Collector samples are recorded into
    #[must_use]
    pub fn collector(&self) -> &Arc<Collector> {
        &self.collector
    }

    /// Wrap `original` so each call is timed until its future settles.
    ///
    /// The original is invoked at call time with the arguments unchanged; its
    /// output and error are handed back untouched. A callable that is already
    /// timed is returned as-is.
    #[must_use]
    pub fn wrap(&self, extension: &str, surface: SurfaceKind, name: &str, original: &Callable) -> Callable {
        if original.is_timed() {
            return original.clone();
        }

        let inner = original.clone();
        let collector = Arc::clone(&self.collector);
        let clock = Arc::clone(&self.clock);
        let gate = self.gate.clone();
        let extension: Arc<str> = Arc::from(extension);
        let name: Arc<str> = Arc::from(name);

        Callable::timed(move |args: Value| -> HandlerFuture {
            let start = clock.now_ms();
            let pending = inner.call(args);

            let collector = Arc::clone(&collector);
            let clock = Arc::clone(&clock);
            let gate = gate.clone();
            let extension = Arc::clone(&extension);
            let name = Arc::clone(&name);

            Box::pin(async move {
                let result = pending.await;

                // Floor at zero: a clock adjustment must not produce negative time
                let elapsed = (clock.now_ms() - start).max(0.0);
                if gate.as_ref().map_or(true, |open| open()) {
                    collector.record_invocation(&Sample {
                        extension: extension.to_string(),
                        surface,
                        name: name.to_string(),
                        duration_ms: elapsed,
                        succeeded: result.is_ok(),
                    });
                }

                result
            })
        })
    }
}

impl fmt::Debug for TimingWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimingWrapper")
            .field("clock", &self.clock)
            .field("gated", &self.gate.is_some())
            .finish_non_exhaustive()
    }
}
