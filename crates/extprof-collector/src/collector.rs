//! Rolling aggregates keyed by extension and by handler

use crate::error::{CollectorError, Result};
use extprof_types::{
    Aggregate, ExtensionSummary, HandlerAggregate, HandlerKey, Sample, DEFAULT_FALLBACK_IDENTITY,
};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// An aggregate plus the order in which its key was first seen
#[derive(Debug, Clone)]
struct Slot<T> {
    seq: u64,
    value: T,
}

#[derive(Debug, Default)]
struct CollectorState {
    extensions: HashMap<String, Slot<Aggregate>>,
    handlers: HashMap<HandlerKey, Slot<HandlerAggregate>>,
    next_seq: u64,
    dropped_new_keys: u64,
    cardinality_warned: bool,
}

impl CollectorState {
    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// Counters describing how close the collector is to its cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorStats {
    /// Distinct handler keys currently tracked
    pub handler_keys: usize,
    /// Configured maximum number of distinct handler keys
    pub max_handler_keys: usize,
    /// Samples dropped because they would have created a key past the cap
    pub dropped_new_keys: u64,
}

/// Point-in-time copy of all aggregates, taken under the lock
#[derive(Debug, Clone, PartialEq)]
pub struct CollectorSnapshot {
    /// Per-extension totals, most expensive first
    pub extensions: Vec<ExtensionSummary>,
    /// Per-handler totals, most expensive first
    pub handlers: Vec<HandlerAggregate>,
    /// Cap counters at the time of the snapshot
    pub stats: CollectorStats,
}

/// Bounded-cardinality aggregate store.
///
/// Every [`Collector::record_invocation`] updates the per-extension and the
/// per-handler aggregate inside a single critical section, so readers never
/// observe one without the other.
#[derive(Debug)]
pub struct Collector {
    max_handler_keys: usize,
    fallback_identity: String,
    state: Mutex<CollectorState>,
}

impl Collector {
    /// Create a collector with the default fallback identity
    ///
    /// # Errors
    /// Returns [`CollectorError::InvalidCap`] when `max_handler_keys` is zero
    pub fn new(max_handler_keys: usize) -> Result<Self> {
        Self::with_fallback(max_handler_keys, DEFAULT_FALLBACK_IDENTITY)
    }

    /// Create a collector that stores blank identities under `fallback_identity`
    ///
    /// # Errors
    /// Returns [`CollectorError::InvalidCap`] when `max_handler_keys` is zero
    pub fn with_fallback(max_handler_keys: usize, fallback_identity: impl Into<String>) -> Result<Self> {
        if max_handler_keys == 0 {
            return Err(CollectorError::InvalidCap(max_handler_keys));
        }

        let mut fallback_identity = fallback_identity.into();
        if fallback_identity.trim().is_empty() {
            fallback_identity = DEFAULT_FALLBACK_IDENTITY.to_string();
        }

        debug!(
            "Collector created (max_handler_keys={}, fallback={})",
            max_handler_keys, fallback_identity
        );

        Ok(Self {
            max_handler_keys,
            fallback_identity,
            state: Mutex::new(CollectorState::default()),
        })
    }

    /// Configured handler-key cap
    #[must_use]
    pub fn max_handler_keys(&self) -> usize {
        self.max_handler_keys
    }

    /// Identity used for blank extension paths
    #[must_use]
    pub fn fallback_identity(&self) -> &str {
        &self.fallback_identity
    }

    fn lock(&self) -> MutexGuard<'_, CollectorState> {
        // Aggregates stay consistent even if a holder panicked: each update
        // completes before the guard is released.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn normalize<'a>(&'a self, extension: &'a str) -> &'a str {
        if extension.trim().is_empty() {
            &self.fallback_identity
        } else {
            extension
        }
    }

    /// Fold one settled invocation into both aggregate maps.
    ///
    /// A sample whose handler key is new while the collector already tracks
    /// `max_handler_keys` keys is dropped and counted instead. Existing keys
    /// keep updating after the cap is reached.
    pub fn record_invocation(&self, sample: &Sample) {
        let extension = self.normalize(&sample.extension);
        let key = HandlerKey::new(extension, sample.surface, sample.name.as_str());

        let mut state = self.lock();

        if !state.handlers.contains_key(&key) && state.handlers.len() >= self.max_handler_keys {
            state.dropped_new_keys += 1;
            if !state.cardinality_warned {
                state.cardinality_warned = true;
                warn!(
                    "Handler key cap of {} reached; new keys such as {} are dropped",
                    self.max_handler_keys, key
                );
            }
            return;
        }

        if !state.extensions.contains_key(extension) {
            let seq = state.next_seq();
            state.extensions.insert(
                extension.to_string(),
                Slot {
                    seq,
                    value: Aggregate::default(),
                },
            );
        }
        if let Some(slot) = state.extensions.get_mut(extension) {
            slot.value.add(sample.duration_ms, sample.succeeded);
        }

        if !state.handlers.contains_key(&key) {
            let seq = state.next_seq();
            let value = HandlerAggregate::new(&key);
            state.handlers.insert(key.clone(), Slot { seq, value });
        }
        if let Some(slot) = state.handlers.get_mut(&key) {
            slot.value.stats.add(sample.duration_ms, sample.succeeded);
        }
    }

    /// Per-extension totals sorted by total duration, descending.
    /// Ties keep first-seen order.
    #[must_use]
    pub fn summarize_by_extension(&self) -> Vec<ExtensionSummary> {
        let state = self.lock();
        summarize_extensions(&state)
    }

    /// Per-handler totals sorted by total duration, descending.
    /// Ties keep first-seen order.
    #[must_use]
    pub fn summarize_by_handler(&self) -> Vec<HandlerAggregate> {
        let state = self.lock();
        summarize_handlers(&state)
    }

    /// Copy everything out under one lock acquisition
    #[must_use]
    pub fn snapshot(&self) -> CollectorSnapshot {
        let state = self.lock();
        CollectorSnapshot {
            extensions: summarize_extensions(&state),
            handlers: summarize_handlers(&state),
            stats: self.stats_locked(&state),
        }
    }

    /// Current cap counters
    #[must_use]
    pub fn stats(&self) -> CollectorStats {
        let state = self.lock();
        self.stats_locked(&state)
    }

    fn stats_locked(&self, state: &CollectorState) -> CollectorStats {
        CollectorStats {
            handler_keys: state.handlers.len(),
            max_handler_keys: self.max_handler_keys,
            dropped_new_keys: state.dropped_new_keys,
        }
    }

    /// Clear all aggregates and counters. The cap and fallback are kept.
    pub fn reset(&self) {
        let mut state = self.lock();
        *state = CollectorState::default();
        debug!("Collector reset");
    }
}

fn sorted_by_total<K, T: Clone>(
    entries: &HashMap<K, Slot<T>>,
    total: impl Fn(&T) -> f64,
) -> Vec<T> {
    let mut slots: Vec<&Slot<T>> = entries.values().collect();
    slots.sort_by_key(|slot| slot.seq);
    // Stable: equal totals stay in first-seen order
    slots.sort_by(|a, b| total(&b.value).total_cmp(&total(&a.value)));
    slots.into_iter().map(|slot| slot.value.clone()).collect()
}

fn summarize_extensions(state: &CollectorState) -> Vec<ExtensionSummary> {
    let mut slots: Vec<(&String, &Slot<Aggregate>)> = state.extensions.iter().collect();
    slots.sort_by_key(|(_, slot)| slot.seq);
    slots.sort_by(|(_, a), (_, b)| {
        b.value
            .total_duration_ms
            .total_cmp(&a.value.total_duration_ms)
    });
    slots
        .into_iter()
        .map(|(extension, slot)| ExtensionSummary {
            extension: extension.clone(),
            stats: slot.value,
        })
        .collect()
}

fn summarize_handlers(state: &CollectorState) -> Vec<HandlerAggregate> {
    sorted_by_total(&state.handlers, |handler| handler.stats.total_duration_ms)
}
