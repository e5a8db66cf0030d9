//! Self-measurement of the timing wrapper's cost

use crate::callable::Callable;
use crate::clock::{Clock, MonotonicClock};
use crate::error::Result;
use crate::wrap::TimingWrapper;
use extprof_collector::Collector;
use extprof_types::{OverheadSample, SurfaceKind};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Time `iterations` calls of a no-op callable, raw and wrapped.
///
/// The wrapped run records into a scratch collector, so profiler state is
/// untouched.
///
/// # Errors
/// Only fails if the scratch collector cannot be created
pub async fn calibrate_overhead(iterations: usize) -> Result<OverheadSample> {
    let clock = MonotonicClock::new();
    let noop = Callable::new(|args| async move { Ok(args) });

    let scratch = Arc::new(Collector::new(1)?);
    let wrapped = TimingWrapper::new(scratch).wrap("<calibration>", SurfaceKind::Event, "noop", &noop);

    let baseline_ms = time_calls(&clock, &noop, iterations).await;
    let profiled_ms = time_calls(&clock, &wrapped, iterations).await;

    debug!(
        "Calibrated {} iterations: baseline={:.3}ms profiled={:.3}ms",
        iterations, baseline_ms, profiled_ms
    );

    Ok(OverheadSample {
        baseline_ms,
        profiled_ms,
    })
}

async fn time_calls(clock: &MonotonicClock, callable: &Callable, iterations: usize) -> f64 {
    let start = clock.now_ms();
    for _ in 0..iterations {
        // Outcome is irrelevant; the no-op never fails
        let _ = callable.call(Value::Null).await;
    }
    (clock.now_ms() - start).max(0.0)
}
