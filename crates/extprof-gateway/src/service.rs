use crate::config::Config;
use crate::controller::{Controller, ControllerSettings};
use crate::demo::bind_sample_extensions;
use crate::extension::{self, COMMAND_NAME, EXTENSION_PATH};
use anyhow::{Context, Result};
use extprof_collector::Collector;
use extprof_persistence::SnapshotStore;
use extprof_runtime::{ExtensionRunner, HandlerResult, HostLocator};
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{debug, error, info};

/// One line of demo host input
#[derive(Debug, Clone, PartialEq)]
enum Input {
    Profiler(String),
    Emit(String, Value),
    Tool(String, Value),
    Quit,
    Empty,
    Unknown(String),
}

const HELP: &str = "commands: /ext-prof [args] | emit <event> [json] | tool <name> [json] | quit";

fn parse_json_arg(rest: &str) -> Value {
    let rest = rest.trim();
    if rest.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(rest).unwrap_or_else(|_| Value::String(rest.to_string()))
}

fn parse_line(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }

    if let Some(args) = line.strip_prefix(&format!("/{COMMAND_NAME}")) {
        if args.is_empty() || args.starts_with(char::is_whitespace) {
            return Input::Profiler(args.trim().to_string());
        }
    }

    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let (name, arg) = rest.trim().split_once(char::is_whitespace).unwrap_or((rest.trim(), ""));

    match verb {
        "quit" | "exit" => Input::Quit,
        "emit" if !name.is_empty() => Input::Emit(name.to_string(), parse_json_arg(arg)),
        "tool" if !name.is_empty() => Input::Tool(name.to_string(), parse_json_arg(arg)),
        _ => Input::Unknown(line.to_string()),
    }
}

fn render(result: HandlerResult) -> String {
    match result {
        Ok(Value::String(text)) => text,
        Ok(Value::Null) => "ok".to_string(),
        Ok(value) => value.to_string(),
        Err(e) => format!("error: {e}"),
    }
}

/// Demo host driving an in-process runner from stdin
pub struct ProfilerService {
    config: Config,
}

impl ProfilerService {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn snapshot_store(&self) -> Result<SnapshotStore> {
        match &self.config.profiler.profiles_dir {
            Some(dir) => Ok(SnapshotStore::new(dir)),
            None => SnapshotStore::in_home().context("Failed to resolve profiles directory"),
        }
    }

    pub async fn run(self) -> Result<()> {
        extprof_logging::init_logging(&self.config.logging.level)?;
        info!("Starting ext-prof demo host");

        let profiler = &self.config.profiler;
        info!(
            "Profiler config: max_handler_keys={}, overhead_goal_pct={}, enable_on_start={}",
            profiler.max_handler_keys, profiler.overhead_goal_pct, profiler.enable_on_start
        );

        let collector = Arc::new(
            Collector::with_fallback(profiler.max_handler_keys, profiler.fallback_identity.clone())
                .context("Invalid profiler.max_handler_keys")?,
        );

        let runner = Arc::new(ExtensionRunner::new());
        bind_sample_extensions(&runner);
        info!("Bound {} sample extension(s)", runner.extension_count());

        let locator = HostLocator::new(self.config.discovery.clone()).with_linked(runner.clone());
        let store = self.snapshot_store()?;
        info!("Snapshots default to {}", store.profiles_dir().display());

        let controller = Arc::new(Controller::new(
            Arc::clone(&collector),
            locator,
            store,
            ControllerSettings {
                project: profiler.project(),
                overhead_goal_pct: profiler.overhead_goal_pct,
            },
        ));

        let mut ext = runner.load(EXTENSION_PATH);
        extension::activate(&mut ext, Arc::clone(&controller), profiler.enable_on_start);
        runner.bind_core(ext);

        let mut stdout = tokio::io::stdout();
        for result in runner.emit("session_start", Value::Null).await {
            if let Ok(Value::String(warning)) = result {
                stdout.write_all(format!("{warning}\n").as_bytes()).await?;
            }
        }
        stdout.write_all(format!("{HELP}\n").as_bytes()).await?;
        stdout.flush().await?;

        let shutdown = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
            }
            info!("Received shutdown signal");
        };

        tokio::select! {
            result = Self::read_loop(&runner) => {
                if let Err(e) = result {
                    error!("Input loop error: {}", e);
                }
            }
            _ = shutdown => {
                info!("Shutting down gracefully...");
            }
        }

        let stats = controller.collector().stats();
        info!(
            "ext-prof stopped (enabled={}, handler keys={}, dropped={})",
            controller.is_enabled(),
            stats.handler_keys,
            stats.dropped_new_keys
        );
        Ok(())
    }

    async fn read_loop(runner: &ExtensionRunner) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        while let Some(line) = lines.next_line().await? {
            let input = parse_line(&line);
            debug!("Input: {:?}", input);

            let reply = match input {
                Input::Empty => continue,
                Input::Quit => break,
                Input::Profiler(args) => {
                    render(runner.execute_command(COMMAND_NAME, Value::String(args)).await)
                }
                Input::Tool(name, args) => render(runner.execute_tool(&name, args).await),
                Input::Emit(event, payload) => {
                    let results = runner.emit(&event, payload).await;
                    let failed = results.iter().filter(|r| r.is_err()).count();
                    format!("{event}: {} handler(s), {failed} failed", results.len())
                }
                Input::Unknown(line) => format!("unrecognized input '{line}'\n{HELP}"),
            };

            stdout.write_all(format!("{reply}\n").as_bytes()).await?;
            stdout.flush().await?;
        }

        info!("Input closed");
        Ok(())
    }
}
