//! The profiler as a host extension: the `/ext-prof` command plus a
//! `session_start` subscription

use crate::controller::Controller;
use extprof_runtime::{Callable, CommandDefinition, ExtensionApi};
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Identity the profiler extension is bound under
pub const EXTENSION_PATH: &str = "builtin:ext-prof";

pub const COMMAND_NAME: &str = "ext-prof";

/// Register the profiler's command and event handlers on `api`.
///
/// The command takes its argument string as a JSON string (or null) and
/// replies with a JSON string. When `enable_on_start` is set, the session
/// start attempts to switch recording on.
pub fn activate(api: &mut dyn ExtensionApi, controller: Arc<Controller>, enable_on_start: bool) {
    let command_controller = Arc::clone(&controller);
    api.register_command(
        COMMAND_NAME,
        CommandDefinition::new(
            "Profile extension handlers: on, off, status, reset, save [path], report, calibrate [n]",
            Callable::new(move |args| {
                let controller = Arc::clone(&command_controller);
                async move {
                    let args = args.as_str().unwrap_or_default().to_string();
                    let reply = controller.handle(&args).await?;
                    Ok(Value::String(reply))
                }
            }),
        ),
    );

    api.on(
        "session_start",
        Callable::new(move |_| {
            let controller = Arc::clone(&controller);
            async move {
                if enable_on_start && !controller.is_enabled() {
                    controller.enable();
                }
                match controller.startup_warning() {
                    Some(warning) => {
                        warn!("{}", warning);
                        Ok(Value::String(warning))
                    }
                    None => Ok(Value::Null),
                }
            }
        }),
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::controller::ControllerSettings;
    use extprof_collector::Collector;
    use extprof_persistence::SnapshotStore;
    use extprof_runtime::{DiscoveryConfig, ExtensionRunner, HostLocator};
    use tempfile::TempDir;

    fn controller(locator: HostLocator, dir: &TempDir) -> Arc<Controller> {
        Arc::new(Controller::new(
            Arc::new(Collector::new(100).unwrap()),
            locator,
            SnapshotStore::new(dir.path()),
            ControllerSettings {
                project: "demo".into(),
                overhead_goal_pct: 1.0,
            },
        ))
    }

    #[tokio::test]
    async fn test_command_dispatches_to_controller() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(ExtensionRunner::new());
        let locator = HostLocator::new(DiscoveryConfig::default()).with_linked(runner.clone());
        let controller = controller(locator, &dir);

        let mut ext = runner.load(EXTENSION_PATH);
        activate(&mut ext, Arc::clone(&controller), false);
        runner.bind_core(ext);

        let reply = runner
            .execute_command(COMMAND_NAME, Value::String("on".into()))
            .await
            .unwrap();
        assert_eq!(reply, Value::String("ext-prof: on\npatch: patched ExtensionRunner".into()));

        // The profiler's own command is a bound handler like any other
        runner.execute_command(COMMAND_NAME, Value::Null).await.unwrap();
        let handlers = controller.collector().summarize_by_handler();
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].extension, EXTENSION_PATH);
        assert_eq!(handlers[0].name, COMMAND_NAME);
    }

    #[tokio::test]
    async fn test_session_start_attempts_enable_and_warns_once() {
        let dir = TempDir::new().unwrap();
        let runner = ExtensionRunner::new();
        let locator = HostLocator::new(DiscoveryConfig {
            max_depth: 0,
            ..DiscoveryConfig::default()
        })
        .with_seeds(vec![dir.path().to_path_buf()]);
        let controller = controller(locator, &dir);

        let mut ext = runner.load(EXTENSION_PATH);
        activate(&mut ext, Arc::clone(&controller), true);
        runner.bind_core(ext);

        let first = runner.emit("session_start", Value::Null).await;
        assert!(!controller.is_enabled());
        assert_eq!(controller.patch_status().reason.split(';').next(), Some("host runtime module not found"));
        let warning = first[0].as_ref().unwrap();
        assert!(warning
            .as_str()
            .unwrap()
            .starts_with("ext-prof: profiling unavailable (host runtime module not found"));

        let second = runner.emit("session_start", Value::Null).await;
        assert_eq!(second[0].as_ref().unwrap(), &Value::Null);
    }
}
