use crate::sample::SurfaceKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a surface had its callables wrapped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverageState {
    Instrumented,
    #[default]
    Missing,
}

impl CoverageState {
    pub fn from_bool(instrumented: bool) -> Self {
        if instrumented {
            CoverageState::Instrumented
        } else {
            CoverageState::Missing
        }
    }

    pub fn is_instrumented(self) -> bool {
        self == CoverageState::Instrumented
    }
}

impl fmt::Display for CoverageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoverageState::Instrumented => f.write_str("instrumented"),
            CoverageState::Missing => f.write_str("missing"),
        }
    }
}

/// Per-surface coverage, computed independently for each surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub events: CoverageState,
    pub commands: CoverageState,
    pub tools: CoverageState,
}

impl Coverage {
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn get(&self, surface: SurfaceKind) -> CoverageState {
        match surface {
            SurfaceKind::Event => self.events,
            SurfaceKind::Command => self.commands,
            SurfaceKind::Tool => self.tools,
        }
    }

    pub fn set(&mut self, surface: SurfaceKind, state: CoverageState) {
        match surface {
            SurfaceKind::Event => self.events = state,
            SurfaceKind::Command => self.commands = state,
            SurfaceKind::Tool => self.tools = state,
        }
    }
}

/// Outcome of a patch attempt, cached for the process lifetime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchStatus {
    pub patched: bool,
    pub reason: String,
    pub coverage: Coverage,
}

impl PatchStatus {
    pub const ALREADY_PATCHED: &'static str = "already patched";

    pub fn patched(reason: impl Into<String>, coverage: Coverage) -> Self {
        Self {
            patched: true,
            reason: reason.into(),
            coverage,
        }
    }

    /// Unpatched status; coverage is all missing
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            patched: false,
            reason: reason.into(),
            coverage: Coverage::missing(),
        }
    }

    pub fn already_patched() -> Self {
        Self::failed(Self::ALREADY_PATCHED)
    }

    /// Status before any patch attempt was made
    pub fn not_attempted() -> Self {
        Self::failed("not attempted")
    }
}

/// Baseline vs profiled timing of the same workload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OverheadSample {
    pub baseline_ms: f64,
    pub profiled_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_patched_has_no_coverage() {
        let status = PatchStatus::already_patched();
        assert!(!status.patched);
        assert_eq!(status.reason, "already patched");
        assert_eq!(status.coverage, Coverage::missing());
    }

    #[test]
    fn test_coverage_serialization() {
        let mut coverage = Coverage::missing();
        coverage.set(SurfaceKind::Event, CoverageState::Instrumented);
        let json = serde_json::to_value(coverage).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"events": "instrumented", "commands": "missing", "tools": "missing"})
        );
    }
}
