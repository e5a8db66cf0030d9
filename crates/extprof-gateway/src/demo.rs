//! Sample extensions bound into the demo host

use anyhow::anyhow;
use extprof_runtime::{Callable, CommandDefinition, ExtensionApi, ExtensionRunner, ToolDefinition};
use serde_json::{json, Value};
use std::time::Duration;

fn sleeper(ms: u64) -> Callable {
    Callable::new(move |payload| async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(payload)
    })
}

/// Bind the sample extensions into `runner`
pub fn bind_sample_extensions(runner: &ExtensionRunner) {
    let mut notes = runner.load("extensions/notes.ts");
    notes.on("session_start", sleeper(5));
    notes.on("turn_start", sleeper(2));
    notes.on("turn_end", sleeper(12));
    notes.register_command(
        "greet",
        CommandDefinition::new(
            "Say hello",
            Callable::new(|args| async move {
                let who = args.as_str().filter(|s| !s.is_empty()).unwrap_or("world").to_string();
                Ok(Value::String(format!("hello, {who}")))
            }),
        ),
    );
    runner.bind_core(notes);

    let mut tools = runner.load("extensions/tools.ts");
    tools.register_tool(ToolDefinition {
        name: "word_count".into(),
        description: "Count words in the `text` argument".into(),
        execute: Callable::new(|args| async move {
            let text = args.get("text").and_then(Value::as_str).unwrap_or_default();
            Ok(json!({ "words": text.split_whitespace().count() }))
        }),
    });
    tools.on("turn_end", sleeper(3));
    runner.bind_core(tools);

    let mut flaky = runner.load("extensions/flaky.ts");
    flaky.on(
        "turn_end",
        Callable::new(|_| async { Err(anyhow!("flaky handler failed")) }),
    );
    runner.bind_core(flaky);
}
