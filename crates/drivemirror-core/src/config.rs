//! Configuration module for Drive Mirror.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, environment overrides and a builder
//! pattern for programmatic use.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::domain::session::{DEFAULT_API_BASE_URL, DEFAULT_TOKEN_URI};

/// Environment variable overriding `mirror.max_units`.
pub const ENV_MAX_UNITS: &str = "DRIVE_MIRROR_PROCS";

/// Environment variable overriding `mirror.sub_concurrency`.
pub const ENV_SUB_CONCURRENCY: &str = "DRIVE_MIRROR_SUB_CONCURRENCY";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Drive Mirror.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mirror: MirrorConfig,
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Mirror run settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Local directory that receives the mirrored tree.
    pub root: PathBuf,
    /// Upper bound on parallel execution units. `None` means one per CPU.
    pub max_units: Option<usize>,
    /// Concurrent transfers inside each execution unit.
    pub sub_concurrency: usize,
    /// How long the consumer waits for a message before checking unit liveness.
    pub recv_timeout_ms: u64,
}

/// Drive API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the Drive v3 REST API.
    pub base_url: String,
    /// OAuth2 token endpoint used for refreshes.
    pub token_uri: String,
    /// Items requested per listing page.
    pub page_size: u32,
    /// Retries for throttled or failed requests before giving up.
    pub max_retries: u32,
}

/// Credential settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// JSON file holding the refreshable session.
    pub token_file: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(error = %e, "Using default configuration");
                Self::default()
            }
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/drivemirror/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        config_home().join("config.yaml")
    }

    /// Apply `DRIVE_MIRROR_PROCS` and `DRIVE_MIRROR_SUB_CONCURRENCY` from the
    /// process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using `lookup` to resolve variable names.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_MAX_UNITS) {
            match raw.trim().parse::<usize>() {
                Ok(n) => self.mirror.max_units = Some(n),
                Err(_) => tracing::warn!(var = ENV_MAX_UNITS, value = %raw, "Ignoring invalid override"),
            }
        }
        if let Some(raw) = lookup(ENV_SUB_CONCURRENCY) {
            match raw.trim().parse::<usize>() {
                Ok(n) => self.mirror.sub_concurrency = n,
                Err(_) => {
                    tracing::warn!(var = ENV_SUB_CONCURRENCY, value = %raw, "Ignoring invalid override")
                }
            }
        }
    }
}

fn config_home() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("drivemirror")
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("DriveMirror"),
            max_units: None,
            sub_concurrency: 24,
            recv_timeout_ms: 1000,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            page_size: 1000,
            max_retries: 5,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_file: config_home().join("token.json"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"mirror.sub_concurrency"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// The listing endpoint refuses larger pages.
const MAX_PAGE_SIZE: u32 = 1000;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            })
        };

        // --- mirror ---
        if self.mirror.root.as_os_str().is_empty() {
            push("mirror.root", "must not be empty".into());
        }
        if self.mirror.max_units == Some(0) {
            push("mirror.max_units", "must be greater than 0".into());
        }
        if self.mirror.sub_concurrency == 0 {
            push("mirror.sub_concurrency", "must be greater than 0".into());
        }
        if self.mirror.recv_timeout_ms == 0 {
            push("mirror.recv_timeout_ms", "must be greater than 0".into());
        }

        // --- api ---
        for (field, value) in [
            ("api.base_url", &self.api.base_url),
            ("api.token_uri", &self.api.token_uri),
        ] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                push(field, format!("must be an http(s) URL, got '{}'", value));
            }
        }
        if self.api.page_size == 0 || self.api.page_size > MAX_PAGE_SIZE {
            push(
                "api.page_size",
                format!("must be between 1 and {}", MAX_PAGE_SIZE),
            );
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use drivemirror_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .mirror_root(PathBuf::from("/srv/drive"))
///     .mirror_max_units(4)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- mirror ---

    pub fn mirror_root(mut self, root: PathBuf) -> Self {
        self.config.mirror.root = root;
        self
    }

    pub fn mirror_max_units(mut self, n: usize) -> Self {
        self.config.mirror.max_units = Some(n);
        self
    }

    pub fn mirror_sub_concurrency(mut self, n: usize) -> Self {
        self.config.mirror.sub_concurrency = n;
        self
    }

    pub fn mirror_recv_timeout_ms(mut self, ms: u64) -> Self {
        self.config.mirror.recv_timeout_ms = ms;
        self
    }

    // --- api ---

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.base_url = url.into();
        self
    }

    pub fn api_token_uri(mut self, url: impl Into<String>) -> Self {
        self.config.api.token_uri = url.into();
        self
    }

    pub fn api_page_size(mut self, n: u32) -> Self {
        self.config.api.page_size = n;
        self
    }

    pub fn api_max_retries(mut self, n: u32) -> Self {
        self.config.api.max_retries = n;
        self
    }

    // --- auth ---

    pub fn auth_token_file(mut self, path: PathBuf) -> Self {
        self.config.auth.token_file = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
