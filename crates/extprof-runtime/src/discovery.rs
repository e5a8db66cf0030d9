//! Locating the host runtime.
//!
//! Strategies are tried in order: a runtime handle linked in by the embedding
//! application, a resolver hook supplied by the host environment, then a
//! bounded upward walk from a few seed directories probing conventional
//! relative paths.

use crate::error::{Result, RuntimeError};
use crate::host::HostRuntime;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

fn default_specifier() -> String {
    "@mariozechner/pi-coding-agent".to_string()
}

fn default_probes() -> Vec<String> {
    vec![
        "node_modules/@mariozechner/pi-coding-agent/dist/core/extensions/runner.js".to_string(),
        "lib/node_modules/@mariozechner/pi-coding-agent/dist/core/extensions/runner.js".to_string(),
        "dist/core/extensions/runner.js".to_string(),
    ]
}

fn default_max_depth() -> usize {
    6
}

/// Host discovery configuration
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct DiscoveryConfig {
    /// Package specifier handed to the resolver hook
    #[serde(default = "default_specifier")]
    pub specifier: String,

    /// Relative paths probed at every directory level
    #[serde(default = "default_probes")]
    pub probes: Vec<String>,

    /// How many parent directories to climb from each seed
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Host install directory, used as an extra seed
    #[serde(default)]
    pub install_dir: Option<PathBuf>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            specifier: default_specifier(),
            probes: default_probes(),
            max_depth: default_max_depth(),
            install_dir: None,
        }
    }
}

/// Module resolution provided by the host environment
pub trait ResolverHook: Send + Sync {
    /// Resolve a package specifier to a module path
    fn resolve(&self, specifier: &str) -> Option<PathBuf>;
}

/// Turns a located module path into a runtime handle
pub trait RunnerLoader: Send + Sync {
    /// Load the host runtime found at `module`
    ///
    /// # Errors
    /// Returns [`RuntimeError::Load`] or [`RuntimeError::ShapeMismatch`] when
    /// the module is not a usable runtime
    fn load(&self, module: &Path) -> Result<Arc<dyn HostRuntime>>;
}

/// Where the host runtime was found
pub enum Located {
    /// Handle linked in directly by the embedding application
    Linked(Arc<dyn HostRuntime>),
    /// Module path returned by the resolver hook
    Resolved(PathBuf),
    /// Module path found by the filesystem walk
    Probed(PathBuf),
}

impl Located {
    /// Obtain a runtime handle, loading the module if needed
    ///
    /// # Errors
    /// Returns [`RuntimeError::NoLoader`] when a path was found but no loader
    /// was supplied, or whatever the loader fails with
    pub fn into_host(self, loader: Option<&dyn RunnerLoader>) -> Result<Arc<dyn HostRuntime>> {
        match self {
            Located::Linked(host) => Ok(host),
            Located::Resolved(path) | Located::Probed(path) => match loader {
                Some(loader) => loader.load(&path),
                None => Err(RuntimeError::NoLoader(path)),
            },
        }
    }
}

impl fmt::Debug for Located {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Located::Linked(host) => f.debug_tuple("Linked").field(&host.runtime_name()).finish(),
            Located::Resolved(path) => f.debug_tuple("Resolved").field(path).finish(),
            Located::Probed(path) => f.debug_tuple("Probed").field(path).finish(),
        }
    }
}

/// Runs the discovery strategies in order
pub struct HostLocator {
    config: DiscoveryConfig,
    linked: Option<Arc<dyn HostRuntime>>,
    hook: Option<Arc<dyn ResolverHook>>,
    seeds: Vec<PathBuf>,
}

impl HostLocator {
    /// Locator seeded from the current directory, the executable's directory
    /// and the configured install directory
    #[must_use]
    pub fn new(config: DiscoveryConfig) -> Self {
        let mut seeds = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            seeds.push(cwd);
        }
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            seeds.push(exe_dir);
        }
        if let Some(install_dir) = &config.install_dir {
            seeds.push(install_dir.clone());
        }

        Self {
            config,
            linked: None,
            hook: None,
            seeds,
        }
    }

    /// Use this runtime handle directly
    #[must_use]
    pub fn with_linked(mut self, host: Arc<dyn HostRuntime>) -> Self {
        self.linked = Some(host);
        self
    }

    /// Consult `hook` before walking the filesystem
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn ResolverHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Replace the seed directories for the filesystem walk
    #[must_use]
    pub fn with_seeds(mut self, seeds: Vec<PathBuf>) -> Self {
        self.seeds = seeds;
        self
    }

    /// Try each strategy in turn.
    ///
    /// # Errors
    /// Returns [`RuntimeError::ModuleNotFound`] listing every probed path
    /// when all strategies are exhausted
    pub fn locate(&self) -> Result<Located> {
        if let Some(host) = &self.linked {
            debug!("Using linked host runtime {}", host.runtime_name());
            return Ok(Located::Linked(Arc::clone(host)));
        }

        let mut checked = Vec::new();

        if let Some(hook) = &self.hook {
            match hook.resolve(&self.config.specifier) {
                Some(path) if path.exists() => {
                    info!("Resolved host runtime via hook: {}", path.display());
                    return Ok(Located::Resolved(path));
                }
                Some(path) => checked.push(path.display().to_string()),
                None => checked.push(format!("resolve({})", self.config.specifier)),
            }
        }

        let mut visited: Vec<&Path> = Vec::new();
        for seed in &self.seeds {
            let mut dir = Some(seed.as_path());
            let mut depth = 0;

            while let Some(current) = dir {
                if depth > self.config.max_depth {
                    break;
                }
                if !visited.contains(&current) {
                    visited.push(current);
                    for probe in &self.config.probes {
                        let candidate = current.join(probe);
                        if candidate.exists() {
                            info!("Found host runtime at {}", candidate.display());
                            return Ok(Located::Probed(candidate));
                        }
                        checked.push(candidate.display().to_string());
                    }
                }
                dir = current.parent();
                depth += 1;
            }
        }

        Err(RuntimeError::ModuleNotFound { checked })
    }
}

impl fmt::Debug for HostLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostLocator")
            .field("config", &self.config)
            .field("linked", &self.linked.as_ref().map(|h| h.runtime_name().to_string()))
            .field("hook", &self.hook.is_some())
            .field("seeds", &self.seeds)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::runner::ExtensionRunner;
    use std::fs;
    use tempfile::TempDir;

    fn config(probes: &[&str], max_depth: usize) -> DiscoveryConfig {
        DiscoveryConfig {
            probes: probes.iter().map(|p| (*p).to_string()).collect(),
            max_depth,
            ..DiscoveryConfig::default()
        }
    }

    struct FixedHook(Option<PathBuf>);

    impl ResolverHook for FixedHook {
        fn resolve(&self, _specifier: &str) -> Option<PathBuf> {
            self.0.clone()
        }
    }

    struct RunnerFromPath;

    impl RunnerLoader for RunnerFromPath {
        fn load(&self, _module: &Path) -> Result<Arc<dyn HostRuntime>> {
            Ok(Arc::new(ExtensionRunner::new()))
        }
    }

    #[test]
    fn test_linked_wins() {
        let locator = HostLocator::new(DiscoveryConfig::default())
            .with_linked(Arc::new(ExtensionRunner::new()))
            .with_seeds(Vec::new());
        assert!(matches!(locator.locate().unwrap(), Located::Linked(_)));
    }

    #[test]
    fn test_hook_before_walk() {
        let dir = TempDir::new().unwrap();
        let module = dir.path().join("runner.js");
        fs::write(&module, "").unwrap();

        let locator = HostLocator::new(config(&["missing.js"], 2))
            .with_hook(Arc::new(FixedHook(Some(module.clone()))))
            .with_seeds(vec![dir.path().to_path_buf()]);
        match locator.locate().unwrap() {
            Located::Resolved(path) => assert_eq!(path, module),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_walks_up_to_first_match() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("a").join("b").join("c");
        fs::create_dir_all(&nested).unwrap();
        let module = root.path().join("a").join("dist").join("runner.js");
        fs::create_dir_all(module.parent().unwrap()).unwrap();
        fs::write(&module, "").unwrap();

        let locator = HostLocator::new(config(&["dist/runner.js"], 6))
            .with_seeds(vec![nested]);
        match locator.locate().unwrap() {
            Located::Probed(path) => assert_eq!(path, module),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_depth_is_bounded_and_checked_paths_reported() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.path().join("runner.js"), "").unwrap();

        let locator = HostLocator::new(config(&["runner.js"], 1))
            .with_hook(Arc::new(FixedHook(None)))
            .with_seeds(vec![nested.clone()]);
        let err = locator.locate().unwrap_err();
        match &err {
            RuntimeError::ModuleNotFound { checked } => {
                assert_eq!(checked.len(), 3);
                assert_eq!(checked[1], nested.join("runner.js").display().to_string());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.to_string().starts_with("host runtime module not found; checked: resolve("));
    }

    #[test]
    fn test_probed_path_needs_loader() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("runner.js"), "").unwrap();
        let locator = HostLocator::new(config(&["runner.js"], 0))
            .with_seeds(vec![root.path().to_path_buf()]);

        let Err(err) = locator.locate().unwrap().into_host(None) else {
            panic!("a probed path without a loader must not yield a host");
        };
        assert!(matches!(err, RuntimeError::NoLoader(_)));

        let host = locator.locate().unwrap().into_host(Some(&RunnerFromPath)).unwrap();
        assert_eq!(host.runtime_name(), "ExtensionRunner");
    }

    #[test]
    fn test_config_from_toml() {
        let config: DiscoveryConfig = toml::from_str(
            r#"
            probes = ["vendor/runner.js"]
            max_depth = 2
            install_dir = "/opt/pi"
        "#,
        )
        .expect("Failed to parse TOML");
        assert_eq!(config.probes, vec!["vendor/runner.js"]);
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.install_dir, Some(PathBuf::from("/opt/pi")));
        assert_eq!(config.specifier, "@mariozechner/pi-coding-agent");
    }
}
