//! `/ext-prof` state machine: on/off toggling, status, reset, save, report

use anyhow::{Context, Result};
use extprof_collector::{
    build_extension_rows, compute_overhead_pct, format_status, format_verbose_report, Collector,
    OverheadView, StatusView,
};
use extprof_persistence::{AggregateRecord, SessionMeta, SnapshotStore};
use extprof_runtime::{calibrate_overhead, HostLocator, Patcher};
use extprof_types::PatchStatus;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::{info, warn};
use uuid::Uuid;

/// Shown for unknown subcommands
pub const USAGE: &str =
    "usage: /ext-prof [on|off|status|reset|save [path]|report|calibrate [iterations]]";

const DEFAULT_CALIBRATION_ITERATIONS: usize = 10_000;

/// Parsed `/ext-prof` arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfilerCommand {
    On,
    Off,
    Status,
    Reset,
    Save(Option<PathBuf>),
    Report,
    Calibrate(usize),
}

impl ProfilerCommand {
    /// Parse the text after `/ext-prof`. An empty string means `status`.
    ///
    /// Returns the usage string for anything unrecognized.
    pub fn parse(args: &str) -> std::result::Result<Self, String> {
        let mut parts = args.split_whitespace();
        let sub = parts.next().unwrap_or("status").to_ascii_lowercase();
        let rest: Vec<&str> = parts.collect();

        let command = match (sub.as_str(), rest.as_slice()) {
            ("on", []) => Self::On,
            ("off", []) => Self::Off,
            ("status", []) => Self::Status,
            ("reset", []) => Self::Reset,
            ("report", []) => Self::Report,
            ("save", []) => Self::Save(None),
            ("save", [path]) => Self::Save(Some(PathBuf::from(path))),
            ("calibrate", []) => Self::Calibrate(DEFAULT_CALIBRATION_ITERATIONS),
            ("calibrate", [n]) => match n.parse::<usize>() {
                Ok(n) if n > 0 => Self::Calibrate(n),
                _ => return Err(USAGE.to_string()),
            },
            _ => return Err(USAGE.to_string()),
        };
        Ok(command)
    }
}

/// Settings the controller needs beyond its collaborators
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub project: String,
    pub overhead_goal_pct: f64,
}

/// Owns the profiler's process state.
///
/// Starts disabled. The first `on` attempts the patch; the outcome is cached
/// for the lifetime of the controller. `off` only closes the recording gate.
pub struct Controller {
    collector: Arc<Collector>,
    patcher: Patcher,
    locator: HostLocator,
    store: SnapshotStore,
    enabled: Arc<AtomicBool>,
    patch_status: OnceLock<PatchStatus>,
    observed_overhead: Mutex<Option<f64>>,
    warned: AtomicBool,
    session_id: Uuid,
    settings: ControllerSettings,
}

impl Controller {
    pub fn new(
        collector: Arc<Collector>,
        locator: HostLocator,
        store: SnapshotStore,
        settings: ControllerSettings,
    ) -> Self {
        let enabled = Arc::new(AtomicBool::new(false));
        let gate = Arc::clone(&enabled);
        let patcher =
            Patcher::new(Arc::clone(&collector)).with_gate(Arc::new(move || gate.load(Ordering::Relaxed)));

        Self {
            collector,
            patcher,
            locator,
            store,
            enabled,
            patch_status: OnceLock::new(),
            observed_overhead: Mutex::new(None),
            warned: AtomicBool::new(false),
            session_id: Uuid::new_v4(),
            settings,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn collector(&self) -> &Arc<Collector> {
        &self.collector
    }

    /// Cached patch outcome, or "not attempted" before the first `on`
    pub fn patch_status(&self) -> PatchStatus {
        self.patch_status
            .get()
            .cloned()
            .unwrap_or_else(PatchStatus::not_attempted)
    }

    /// Open the recording gate, patching the host on first use.
    ///
    /// The gate stays closed when the patch failed.
    pub fn enable(&self) -> PatchStatus {
        let status = self
            .patch_status
            .get_or_init(|| self.patcher.locate_and_patch(&self.locator, None))
            .clone();
        if status.patched {
            self.enabled.store(true, Ordering::Relaxed);
            info!("ext-prof enabled (patch: {})", status.reason);
        } else {
            warn!("ext-prof stays off (patch: {})", status.reason);
        }
        status
    }

    /// Close the recording gate; wrapped callables stay in place
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
        info!("ext-prof disabled");
    }

    /// Diagnostic for a failed patch, returned at most once per controller
    pub fn startup_warning(&self) -> Option<String> {
        let status = self.patch_status.get()?;
        if status.patched {
            return None;
        }
        if self.warned.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(format!("ext-prof: profiling unavailable ({})", status.reason))
    }

    /// Run one `/ext-prof` invocation and render the reply
    pub async fn handle(&self, args: &str) -> Result<String> {
        let command = match ProfilerCommand::parse(args) {
            Ok(command) => command,
            Err(usage) => return Ok(usage),
        };

        match command {
            ProfilerCommand::On => {
                let status = self.enable();
                let state = if self.is_enabled() { "on" } else { "off" };
                Ok(format!("ext-prof: {state}\npatch: {}", status.reason))
            }
            ProfilerCommand::Off => {
                self.disable();
                Ok("ext-prof: off".to_string())
            }
            ProfilerCommand::Status => Ok(self.status()),
            ProfilerCommand::Reset => {
                self.collector.reset();
                info!("ext-prof aggregates reset");
                Ok("ext-prof: aggregates cleared".to_string())
            }
            ProfilerCommand::Save(path) => {
                let saved = self.save(path).await?;
                Ok(format!("ext-prof: saved {}", saved.display()))
            }
            ProfilerCommand::Report => Ok(self.report()),
            ProfilerCommand::Calibrate(iterations) => {
                let sample = calibrate_overhead(iterations)
                    .await
                    .context("Failed to calibrate overhead")?;
                let pct = compute_overhead_pct(sample);
                *self.observed_overhead.lock().unwrap_or_else(PoisonError::into_inner) = Some(pct);
                if pct > self.settings.overhead_goal_pct {
                    warn!(
                        "Observed overhead {:.2}% exceeds goal {:.2}%",
                        pct, self.settings.overhead_goal_pct
                    );
                }
                Ok(format!(
                    "ext-prof: {} calls baseline={:.3}ms profiled={:.3}ms overhead={:.2}%",
                    iterations, sample.baseline_ms, sample.profiled_ms, pct
                ))
            }
        }
    }

    fn status(&self) -> String {
        let patch = self.patch_status();
        format_status(&StatusView {
            enabled: self.is_enabled(),
            patch: &patch,
            coverage: self.patcher.coverage(),
            stats: Some(self.collector.stats()),
        })
    }

    fn report(&self) -> String {
        let snapshot = self.collector.snapshot();
        let rows = build_extension_rows(snapshot.extensions, &snapshot.handlers);
        let observed_pct = *self.observed_overhead.lock().unwrap_or_else(PoisonError::into_inner);
        format_verbose_report(
            &rows,
            &self.patch_status().reason,
            &OverheadView {
                goal_pct: self.settings.overhead_goal_pct,
                observed_pct,
            },
        )
    }

    async fn save(&self, path: Option<PathBuf>) -> Result<PathBuf> {
        let snapshot = self.collector.snapshot();
        let rows: Vec<AggregateRecord> = snapshot.handlers.iter().map(AggregateRecord::from).collect();
        let meta = SessionMeta::new(
            self.settings.project.clone(),
            &self.patch_status(),
            self.is_enabled(),
            self.settings.overhead_goal_pct,
            self.session_id,
        );
        let saved = self.store.save(path.as_deref(), &meta, &rows).await?;
        Ok(saved)
    }
}
