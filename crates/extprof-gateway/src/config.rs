use anyhow::{anyhow, Context};
use extprof_runtime::DiscoveryConfig;
use extprof_types::DEFAULT_FALLBACK_IDENTITY;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Default config template created when no config exists
const DEFAULT_CONFIG: &str = r#"
[profiler]
max_handler_keys = 2000
fallback_identity = "<unknown-extension>"
overhead_goal_pct = 1.0
enable_on_start = false  # or set EXTPROF_ENABLE=1
# project_name = ""      # defaults to the current directory name
# profiles_dir = ""      # defaults to ~/.pi/profiles

[discovery]
max_depth = 6
# install_dir = "/usr/local/lib"

[logging]
level = "info"  # trace, debug, info, warn, error
"#;

fn default_max_handler_keys() -> usize {
    2000
}

fn default_fallback_identity() -> String {
    DEFAULT_FALLBACK_IDENTITY.to_string()
}

fn default_overhead_goal_pct() -> f64 {
    1.0
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProfilerConfig {
    #[serde(default = "default_max_handler_keys")]
    pub max_handler_keys: usize,
    #[serde(default = "default_fallback_identity")]
    pub fallback_identity: String,
    #[serde(default = "default_overhead_goal_pct")]
    pub overhead_goal_pct: f64,
    #[serde(default)]
    pub enable_on_start: bool,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub profiles_dir: Option<PathBuf>,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            max_handler_keys: default_max_handler_keys(),
            fallback_identity: default_fallback_identity(),
            overhead_goal_pct: default_overhead_goal_pct(),
            enable_on_start: false,
            project_name: None,
            profiles_dir: None,
        }
    }
}

impl ProfilerConfig {
    /// Configured project name, or the current directory's name
    pub fn project(&self) -> String {
        self.project_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| {
                env::current_dir()
                    .ok()
                    .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
            })
            .unwrap_or_else(|| "unknown-project".to_string())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub profiler: ProfilerConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Get the global config path: ~/.pi/ext-prof.toml
    fn global_config_path() -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".pi").join("ext-prof.toml"))
    }

    /// Ensure global config directory and file exist, creating defaults if needed
    fn ensure_global_config() -> anyhow::Result<PathBuf> {
        let config_path = Self::global_config_path()?;

        if let Some(config_dir) = config_path.parent() {
            if !config_dir.exists() {
                fs::create_dir_all(config_dir).with_context(|| {
                    format!("Failed to create config directory {}", config_dir.display())
                })?;
                eprintln!("Created config directory: {}", config_dir.display());
            }
        }

        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG.trim())
                .with_context(|| format!("Failed to write {}", config_path.display()))?;
            eprintln!("Created default config: {}", config_path.display());
        }

        Ok(config_path)
    }

    /// Load configuration with layered approach:
    /// 1. Global config: ~/.pi/ext-prof.toml (auto-created if missing)
    /// 2. Local override: ./ext-prof.toml (workspace, optional)
    /// 3. Environment variables with EXTPROF__ prefix
    /// 4. Convenience variables EXTPROF_ENABLE and EXTPROF_LOG (highest priority)
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file from current directory
        dotenvy::dotenv().ok();

        let global_config_path = Self::ensure_global_config()?;

        let mut config_builder = config::Config::builder()
            // Layer 1: Global config (required - we just created it if missing)
            .add_source(config::File::from(global_config_path))
            // Layer 2: Local workspace config (optional override)
            .add_source(config::File::with_name("ext-prof").required(false))
            // Layer 3: Environment variables, e.g. EXTPROF__PROFILER__MAX_HANDLER_KEYS
            .add_source(
                config::Environment::with_prefix("EXTPROF")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        // Layer 4: Convenience overrides
        if let Ok(flag) = env::var("EXTPROF_ENABLE") {
            config_builder = config_builder.set_override("profiler.enable_on_start", parse_flag(&flag))?;
        }

        if let Ok(level) = env::var("EXTPROF_LOG") {
            config_builder = config_builder.set_override("logging.level", level)?;
        }

        let config: Self = config_builder.build()?.try_deserialize()?;
        Ok(config)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
