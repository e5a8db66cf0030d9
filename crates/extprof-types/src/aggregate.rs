use crate::sample::{HandlerKey, SurfaceKind};
use serde::{Deserialize, Serialize};

/// Rolling statistics shared by both aggregation granularities
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub call_count: u64,
    pub total_duration_ms: f64,
    pub max_duration_ms: f64,
    pub error_count: u64,
}

impl Aggregate {
    /// Fold one settled invocation into the aggregate
    pub fn add(&mut self, duration_ms: f64, succeeded: bool) {
        self.call_count += 1;
        self.total_duration_ms += duration_ms;
        if duration_ms > self.max_duration_ms {
            self.max_duration_ms = duration_ms;
        }
        if !succeeded {
            self.error_count += 1;
        }
    }

    /// Mean duration, zero when nothing has been recorded
    pub fn average_ms(&self) -> f64 {
        if self.call_count == 0 {
            0.0
        } else {
            self.total_duration_ms / self.call_count as f64
        }
    }
}

/// Per-extension totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionSummary {
    pub extension: String,
    #[serde(flatten)]
    pub stats: Aggregate,
}

/// Per-handler totals, keyed by (extension, surface, name)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerAggregate {
    pub extension: String,
    pub surface: SurfaceKind,
    pub name: String,
    #[serde(flatten)]
    pub stats: Aggregate,
}

impl HandlerAggregate {
    pub fn new(key: &HandlerKey) -> Self {
        Self {
            extension: key.extension.clone(),
            surface: key.surface,
            name: key.name.clone(),
            stats: Aggregate::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_tracks_max_and_errors() {
        let mut agg = Aggregate::default();
        agg.add(10.0, true);
        agg.add(4.0, false);
        assert_eq!(agg.call_count, 2);
        assert_eq!(agg.error_count, 1);
        assert_eq!(agg.total_duration_ms, 14.0);
        assert_eq!(agg.max_duration_ms, 10.0);
        assert_eq!(agg.average_ms(), 7.0);
    }

    #[test]
    fn test_average_of_empty_is_zero() {
        assert_eq!(Aggregate::default().average_ms(), 0.0);
    }
}
