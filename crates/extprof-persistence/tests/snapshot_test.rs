//! Snapshot files on disk

use extprof_persistence::{load_snapshot, save_snapshot, AggregateRecord, SessionMeta, SnapshotStore};
use extprof_types::{Coverage, CoverageState, PatchStatus, SurfaceKind};
use serde_json::Value;
use tempfile::TempDir;
use uuid::Uuid;

fn rows() -> Vec<AggregateRecord> {
    vec![
        AggregateRecord {
            extension_path: "extensions/a.ts".into(),
            surface: SurfaceKind::Event,
            name: "turn_end".into(),
            calls: 1,
            total_ms: 15.5,
            max_ms: 15.5,
            error_count: 0,
        },
        AggregateRecord {
            extension_path: "extensions/b.ts".into(),
            surface: SurfaceKind::Tool,
            name: "bash".into(),
            calls: 3,
            total_ms: 9.0,
            max_ms: 4.0,
            error_count: 1,
        },
    ]
}

fn patched_meta() -> SessionMeta {
    let mut coverage = Coverage::missing();
    coverage.set(SurfaceKind::Event, CoverageState::Instrumented);
    let status = PatchStatus::patched("patched ExtensionRunner", coverage);
    SessionMeta::new("demo", &status, true, 1.0, Uuid::new_v4())
}

#[tokio::test]
async fn test_round_trip_as_plain_json_lines() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("nested").join("deeper").join("snap.jsonl");

    save_snapshot(&path, &patched_meta(), &rows()).await.expect("save");

    let text = std::fs::read_to_string(&path).expect("read back");
    assert!(text.ends_with('\n'));
    let records: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid json line"))
        .collect();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["type"], "session_meta");
    assert_eq!(records[0]["schemaVersion"], 1);
    assert_eq!(records[0]["patched"], true);
    assert_eq!(records[0]["coverage"]["events"], "instrumented");
    assert_eq!(records[0]["coverage"]["tools"], "missing");
    assert_eq!(records[0]["enabled"], true);
    assert_eq!(records[0]["overheadGoalPct"], 1.0);
    assert!(records[0]["savedAt"].is_string());

    assert_eq!(records[1]["type"], "aggregate");
    assert_eq!(records[1]["extensionPath"], "extensions/a.ts");
    assert_eq!(records[1]["surface"], "event");
    assert_eq!(records[1]["name"], "turn_end");
    assert_eq!(records[1]["calls"], 1);
    assert_eq!(records[1]["totalMs"], 15.5);
    assert_eq!(records[2]["surface"], "tool");
    assert_eq!(records[2]["errorCount"], 1);
    assert_eq!(records[2]["maxMs"], 4.0);

    // No temporary sibling is left behind
    let leftovers: Vec<_> = std::fs::read_dir(path.parent().expect("parent"))
        .expect("list dir")
        .collect();
    assert_eq!(leftovers.len(), 1);
}

#[tokio::test]
async fn test_load_returns_exact_rows() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("snap.jsonl");
    let meta = patched_meta();

    save_snapshot(&path, &meta, &rows()).await.expect("save");
    let (loaded_meta, loaded_rows) = load_snapshot(&path).await.expect("load");

    assert_eq!(loaded_meta, meta);
    assert_eq!(loaded_rows, rows());
}

#[tokio::test]
async fn test_store_uses_default_location() {
    let dir = TempDir::new().expect("tempdir");
    let store = SnapshotStore::new(dir.path());
    let meta = patched_meta();

    let saved = store.save(None, &meta, &[]).await.expect("save");
    assert!(saved.starts_with(dir.path().join("demo")));
    assert_eq!(saved.extension().and_then(|e| e.to_str()), Some("jsonl"));

    let (_, loaded_rows) = load_snapshot(&saved).await.expect("load");
    assert!(loaded_rows.is_empty());
}

#[tokio::test]
async fn test_write_failure_surfaces_io_error() {
    let dir = TempDir::new().expect("tempdir");
    let blocker = dir.path().join("file");
    std::fs::write(&blocker, "x").expect("write blocker");

    // Parent "directory" is a regular file
    let err = save_snapshot(&blocker.join("snap.jsonl"), &patched_meta(), &[])
        .await
        .expect_err("save should fail");
    assert!(err.to_string().starts_with("failed to create directory"));
}

#[tokio::test]
async fn test_concurrent_saves_to_one_path_both_succeed() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("snap.jsonl");
    let meta = patched_meta();
    let rows = rows();

    let (first, second) = tokio::join!(
        save_snapshot(&path, &meta, &rows),
        save_snapshot(&path, &meta, &rows[..1])
    );
    first.expect("first save");
    second.expect("second save");

    let (_, loaded_rows) = load_snapshot(&path).await.expect("load");
    assert!(loaded_rows == rows || loaded_rows == rows[..1]);

    let entries: Vec<_> = std::fs::read_dir(dir.path()).expect("list dir").collect();
    assert_eq!(entries.len(), 1);
}
