//! Snapshot persistence for ext-prof
//!
//! Snapshots are newline-delimited JSON: one `session_meta` record followed by
//! one `aggregate` record per handler. Files are written to a temporary
//! sibling and renamed into place, so a reader never sees a partial file.

pub mod error;
pub mod record;

pub use error::{PersistenceError, Result};
pub use record::{AggregateRecord, SessionMeta, SnapshotRecord};

use chrono::{DateTime, SecondsFormat, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

/// Resolves snapshot locations under a profiles directory
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    profiles_dir: PathBuf,
}

impl SnapshotStore {
    /// Store rooted at `profiles_dir`
    pub fn new(profiles_dir: impl Into<PathBuf>) -> Self {
        Self {
            profiles_dir: profiles_dir.into(),
        }
    }

    /// Store rooted at `~/.pi/profiles`
    pub fn in_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or(PersistenceError::HomeDirUnavailable)?;
        Ok(Self::new(home.join(".pi").join("profiles")))
    }

    pub fn profiles_dir(&self) -> &Path {
        &self.profiles_dir
    }

    /// `<profiles>/<project>/<timestamp>.jsonl`, with `:` and `.` in the
    /// timestamp replaced by `-`
    pub fn default_path(&self, project: &str, saved_at: DateTime<Utc>) -> PathBuf {
        let stamp = saved_at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        self.profiles_dir
            .join(sanitize_project(project))
            .join(format!("{stamp}.jsonl"))
    }

    /// Save to `path`, or to the default location derived from `meta`
    pub async fn save(
        &self,
        path: Option<&Path>,
        meta: &SessionMeta,
        rows: &[AggregateRecord],
    ) -> Result<PathBuf> {
        let target = match path {
            Some(path) => path.to_path_buf(),
            None => self.default_path(&meta.project, meta.saved_at),
        };
        save_snapshot(&target, meta, rows).await?;
        Ok(target)
    }
}

fn sanitize_project(project: &str) -> String {
    let cleaned: String = project
        .trim()
        .chars()
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "unknown-project".to_string()
    } else {
        cleaned
    }
}

/// Render records as newline-delimited JSON with a trailing newline
pub fn encode_snapshot(meta: &SessionMeta, rows: &[AggregateRecord]) -> Result<String> {
    let mut out = serde_json::to_string(&SnapshotRecord::SessionMeta(meta.clone()))?;
    out.push('\n');
    for row in rows {
        out.push_str(&serde_json::to_string(&SnapshotRecord::Aggregate(row.clone()))?);
        out.push('\n');
    }
    Ok(out)
}

/// Write a snapshot atomically, creating parent directories as needed
pub async fn save_snapshot(path: &Path, meta: &SessionMeta, rows: &[AggregateRecord]) -> Result<()> {
    let contents = encode_snapshot(meta, rows)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| PersistenceError::io("failed to create directory", parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot.jsonl".to_string());
    let tmp = path.with_file_name(format!(
        ".{file_name}.tmp-{}-{}",
        std::process::id(),
        Uuid::new_v4().simple()
    ));

    debug!("Writing snapshot to temporary file {}", tmp.display());
    if let Err(e) = fs::write(&tmp, contents.as_bytes()).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(PersistenceError::io("failed to write", tmp, e));
    }

    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(PersistenceError::io("failed to rename snapshot into", path, e));
    }

    info!("Saved snapshot with {} aggregate(s) to {}", rows.len(), path.display());
    Ok(())
}

/// Parse a snapshot back into its session metadata and aggregate rows
pub fn decode_snapshot(contents: &str) -> Result<(SessionMeta, Vec<AggregateRecord>)> {
    let mut meta = None;
    let mut rows = Vec::new();

    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: SnapshotRecord =
            serde_json::from_str(line).map_err(|e| PersistenceError::InvalidRecord {
                line: index + 1,
                reason: e.to_string(),
            })?;

        match (record, meta.is_some()) {
            (SnapshotRecord::SessionMeta(m), false) => meta = Some(m),
            (SnapshotRecord::SessionMeta(_), true) => {
                return Err(PersistenceError::InvalidRecord {
                    line: index + 1,
                    reason: "duplicate session_meta".to_string(),
                })
            }
            (SnapshotRecord::Aggregate(_), false) => return Err(PersistenceError::MissingSessionMeta),
            (SnapshotRecord::Aggregate(row), true) => rows.push(row),
        }
    }

    let meta = meta.ok_or(PersistenceError::MissingSessionMeta)?;
    Ok((meta, rows))
}

/// Read and parse a snapshot file
pub async fn load_snapshot(path: &Path) -> Result<(SessionMeta, Vec<AggregateRecord>)> {
    let contents = fs::read_to_string(path)
        .await
        .map_err(|e| PersistenceError::io("failed to read", path, e))?;
    decode_snapshot(&contents)
}
