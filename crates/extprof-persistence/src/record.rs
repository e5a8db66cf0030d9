//! Line records of the snapshot format

use chrono::{DateTime, Utc};
use extprof_types::{Coverage, HandlerAggregate, PatchStatus, SurfaceKind, SNAPSHOT_SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// First record of every snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    pub schema_version: u32,
    pub project: String,
    pub patch: String,
    pub patched: bool,
    pub coverage: Coverage,
    pub saved_at: DateTime<Utc>,
    pub overhead_goal_pct: f64,
    pub enabled: bool,
    #[serde(default)]
    pub session_id: Uuid,
}

impl SessionMeta {
    /// Session context for a snapshot taken now
    pub fn new(
        project: impl Into<String>,
        patch: &PatchStatus,
        enabled: bool,
        overhead_goal_pct: f64,
        session_id: Uuid,
    ) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            project: project.into(),
            patch: patch.reason.clone(),
            patched: patch.patched,
            coverage: patch.coverage,
            saved_at: Utc::now(),
            overhead_goal_pct,
            enabled,
            session_id,
        }
    }
}

/// One per-handler aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRecord {
    pub extension_path: String,
    pub surface: SurfaceKind,
    pub name: String,
    pub calls: u64,
    pub total_ms: f64,
    pub max_ms: f64,
    pub error_count: u64,
}

impl From<&HandlerAggregate> for AggregateRecord {
    fn from(handler: &HandlerAggregate) -> Self {
        Self {
            extension_path: handler.extension.clone(),
            surface: handler.surface,
            name: handler.name.clone(),
            calls: handler.stats.call_count,
            total_ms: handler.stats.total_duration_ms,
            max_ms: handler.stats.max_duration_ms,
            error_count: handler.stats.error_count,
        }
    }
}

/// A self-describing snapshot line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotRecord {
    SessionMeta(SessionMeta),
    Aggregate(AggregateRecord),
}
