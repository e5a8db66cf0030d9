//! Injectable time sources for the timing wrapper

use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// Millisecond time source
pub trait Clock: Send + Sync + Debug {
    /// Current reading in milliseconds from an arbitrary origin
    fn now_ms(&self) -> f64;
}

/// Monotonic clock backed by [`Instant`]
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Start a clock whose origin is now
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock that replays a fixed list of readings.
///
/// Once the list is exhausted the last reading repeats.
#[derive(Debug)]
pub struct ScriptedClock {
    ticks: Mutex<(VecDeque<f64>, f64)>,
}

impl ScriptedClock {
    /// Replay `ticks` in order
    pub fn new(ticks: impl IntoIterator<Item = f64>) -> Self {
        Self {
            ticks: Mutex::new((ticks.into_iter().collect(), 0.0)),
        }
    }
}

impl Clock for ScriptedClock {
    fn now_ms(&self) -> f64 {
        let mut guard = self.ticks.lock().unwrap_or_else(PoisonError::into_inner);
        let (queue, last) = &mut *guard;
        if let Some(tick) = queue.pop_front() {
            *last = tick;
        }
        *last
    }
}
