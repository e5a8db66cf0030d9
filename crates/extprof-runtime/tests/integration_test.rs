//! End-to-end instrumentation of an in-process runner

use extprof_collector::Collector;
use extprof_runtime::{
    Callable, CommandDefinition, DiscoveryConfig, ExtensionApi, ExtensionRunner, HostLocator,
    Patcher, ScriptedClock, ToolDefinition,
};
use extprof_types::{CoverageState, SurfaceKind};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn sleeper(ms: u64) -> Callable {
    Callable::new(move |args| async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(args)
    })
}

#[tokio::test]
async fn test_async_handlers_timed_to_completion() {
    let collector = Arc::new(Collector::new(100).expect("collector"));
    let runner = Arc::new(ExtensionRunner::new());

    let mut ext = runner.load("extensions/slow.ts");
    ext.on("turn_end", sleeper(20));
    ext.register_tool(ToolDefinition {
        name: "fetch".into(),
        description: "pretend network call".into(),
        execute: sleeper(30),
    });
    runner.bind_core(ext);

    let patcher = Patcher::new(Arc::clone(&collector));
    let status = patcher.patch(runner.as_ref());
    assert!(status.patched);

    let (events, tool) = tokio::join!(
        runner.emit("turn_end", json!({"turn": 1})),
        runner.execute_tool("fetch", json!({"url": "x"}))
    );
    assert_eq!(events.len(), 1);
    assert_eq!(tool.expect("tool result"), json!({"url": "x"}));

    let handlers = collector.summarize_by_handler();
    assert_eq!(handlers.len(), 2);
    let fetch = handlers
        .iter()
        .find(|h| h.surface == SurfaceKind::Tool)
        .expect("tool aggregate");
    assert!(fetch.stats.total_duration_ms >= 30.0);
    let turn_end = handlers
        .iter()
        .find(|h| h.surface == SurfaceKind::Event)
        .expect("event aggregate");
    assert!(turn_end.stats.total_duration_ms >= 20.0);

    let rows = collector.summarize_by_extension();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].stats.call_count, 2);
}

#[tokio::test]
async fn test_failures_reach_the_caller_and_count_as_errors() {
    let collector = Arc::new(Collector::new(100).expect("collector"));
    let runner = ExtensionRunner::new();

    let mut ext = runner.load("extensions/flaky.ts");
    ext.register_command(
        "deploy",
        CommandDefinition::new(
            "deploy things",
            Callable::new(|_| async { Err(anyhow::anyhow!("no credentials")) }),
        ),
    );
    runner.bind_core(ext);

    Patcher::new(Arc::clone(&collector))
        .with_clock(Arc::new(ScriptedClock::new([0.0, 3.0])))
        .patch(&runner);

    let err = runner
        .execute_command("deploy", Value::Null)
        .await
        .expect_err("command should fail");
    assert_eq!(err.to_string(), "no credentials");

    let handlers = collector.summarize_by_handler();
    assert_eq!(handlers[0].name, "deploy");
    assert_eq!(handlers[0].stats.call_count, 1);
    assert_eq!(handlers[0].stats.error_count, 1);
    assert_eq!(handlers[0].stats.total_duration_ms, 3.0);
}

#[tokio::test]
async fn test_gate_toggles_recording_without_repatching() {
    let collector = Arc::new(Collector::new(100).expect("collector"));
    let runner = Arc::new(ExtensionRunner::new());
    let mut ext = runner.load("extensions/a.ts");
    ext.on("turn_start", Callable::new(|_| async { Ok(Value::Null) }));
    runner.bind_core(ext);

    let enabled = Arc::new(AtomicBool::new(true));
    let gate = Arc::clone(&enabled);
    let locator = HostLocator::new(DiscoveryConfig::default()).with_linked(runner.clone());
    let status = Patcher::new(Arc::clone(&collector))
        .with_gate(Arc::new(move || gate.load(Ordering::Relaxed)))
        .locate_and_patch(&locator, None);
    assert!(status.patched);
    assert_eq!(status.coverage.events, CoverageState::Instrumented);
    assert_eq!(status.coverage.tools, CoverageState::Missing);

    runner.emit("turn_start", Value::Null).await;
    enabled.store(false, Ordering::Relaxed);
    runner.emit("turn_start", Value::Null).await;
    enabled.store(true, Ordering::Relaxed);
    runner.emit("turn_start", Value::Null).await;

    assert_eq!(collector.summarize_by_handler()[0].stats.call_count, 2);
}

#[test]
fn test_missing_host_is_inert() {
    let collector = Arc::new(Collector::new(100).expect("collector"));
    let dir = tempfile::TempDir::new().expect("tempdir");
    let locator = HostLocator::new(DiscoveryConfig {
        max_depth: 0,
        ..DiscoveryConfig::default()
    })
    .with_seeds(vec![dir.path().to_path_buf()]);

    let status = Patcher::new(collector).locate_and_patch(&locator, None);
    assert!(!status.patched);
    assert!(status.reason.starts_with("host runtime module not found; checked: "));
    assert_eq!(status.coverage.events, CoverageState::Missing);
}
