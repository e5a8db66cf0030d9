use serde::{Deserialize, Serialize};
use std::fmt;

/// The three handler kinds a host runtime exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    Event,
    Command,
    Tool,
}

impl SurfaceKind {
    pub const ALL: [SurfaceKind; 3] = [SurfaceKind::Event, SurfaceKind::Command, SurfaceKind::Tool];

    pub fn as_str(self) -> &'static str {
        match self {
            SurfaceKind::Event => "event",
            SurfaceKind::Command => "command",
            SurfaceKind::Tool => "tool",
        }
    }
}

impl fmt::Display for SurfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One settled invocation. Folded into aggregates immediately, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub extension: String,
    pub surface: SurfaceKind,
    pub name: String,
    pub duration_ms: f64,
    pub succeeded: bool,
}

impl Sample {
    pub fn ok(
        extension: impl Into<String>,
        surface: SurfaceKind,
        name: impl Into<String>,
        duration_ms: f64,
    ) -> Self {
        Self {
            extension: extension.into(),
            surface,
            name: name.into(),
            duration_ms,
            succeeded: true,
        }
    }

    pub fn failed(
        extension: impl Into<String>,
        surface: SurfaceKind,
        name: impl Into<String>,
        duration_ms: f64,
    ) -> Self {
        Self {
            succeeded: false,
            ..Self::ok(extension, surface, name, duration_ms)
        }
    }
}

/// Composite key for per-handler aggregates
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub extension: String,
    pub surface: SurfaceKind,
    pub name: String,
}

impl HandlerKey {
    pub fn new(extension: impl Into<String>, surface: SurfaceKind, name: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            surface,
            name: name.into(),
        }
    }
}

impl fmt::Display for HandlerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}:{}", self.extension, self.surface, self.name)
    }
}
