//! Configuration management for prologtest.
//!
//! Configuration is loaded from multiple sources with the following priority:
//! 1. Command-line flags (applied by the CLI after loading)
//! 2. Environment variables
//! 3. `prologtest.toml` in the workspace root
//! 4. Built-in defaults (lowest priority)

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the project-local configuration file.
pub const CONFIG_FILE_NAME: &str = "prologtest.toml";

/// Default interpreter binary.
pub const DEFAULT_INTERPRETER: &str = "swipl";

/// Default per-test timeout in seconds. `0` disables the timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Source extensions scanned for tests (without leading dot).
pub const DEFAULT_EXTENSIONS: &[&str] = &["pl", "plt"];

/// Dependency and vendor directories skipped during discovery.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &["node_modules", "target", ".git", "vendor", "pack"];

pub const ENV_INTERPRETER: &str = "PROLOGTEST_INTERPRETER";
pub const ENV_TIMEOUT_SECS: &str = "PROLOGTEST_TIMEOUT_SECS";
pub const ENV_EXTENSIONS: &str = "PROLOGTEST_EXTENSIONS";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Which files are scanned for tests.
    pub discovery: DiscoveryConfig,

    /// How the interpreter is invoked.
    pub interpreter: InterpreterConfig,
}

impl Config {
    /// Load configuration for a workspace rooted at `root`.
    ///
    /// Uses `<root>/prologtest.toml` when present, built-in defaults otherwise, then applies environment overrides.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let candidate = root.join(CONFIG_FILE_NAME);
        let mut config = if candidate.is_file() {
            Self::parse_file(&candidate)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file, then apply environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::parse_file(path.as_ref())?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(program) = lookup(ENV_INTERPRETER) {
            self.interpreter.program = program;
        }
        if let Some(secs) = lookup(ENV_TIMEOUT_SECS) {
            match secs.trim().parse() {
                Ok(n) => self.interpreter.timeout_secs = n,
                Err(_) => tracing::warn!("ignoring {}={:?}: not a number of seconds", ENV_TIMEOUT_SECS, secs),
            }
        }
        if let Some(list) = lookup(ENV_EXTENSIONS) {
            self.discovery.extensions = list
                .split(',')
                .map(|ext| ext.trim().trim_start_matches('.').to_string())
                .filter(|ext| !ext.is_empty())
                .collect();
        }
    }

    /// Reject configurations the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interpreter.program.trim().is_empty() {
            return Err(ConfigError::Invalid("interpreter.program must not be empty".to_string()));
        }
        if self.discovery.extensions.is_empty() {
            return Err(ConfigError::Invalid(
                "discovery.extensions must list at least one extension".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a default config file content as a string.
    pub fn default_config_string() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_default()
    }
}

/// Discovery configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// File extensions to scan (without leading dot).
    pub extensions: Vec<String>,

    /// Directory names skipped while walking a workspace root.
    pub exclude_dirs: Vec<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl DiscoveryConfig {
    /// Whether `path` has one of the configured extensions.
    pub fn recognizes(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|known| known == ext))
    }

    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|dir| dir == name)
    }
}

/// Interpreter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Interpreter binary, looked up on `PATH` when not absolute.
    pub program: String,

    /// Extra arguments placed before `-s <file> -g <goal>`.
    pub args: Vec<String>,

    /// Per-test timeout in seconds. `0` disables the timeout.
    pub timeout_secs: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_INTERPRETER.to_string(),
            args: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl InterpreterConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}
