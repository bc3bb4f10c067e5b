//! Application configuration.
//!
//! User config lives at `~/.docintel/docintel.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocIntelError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docintel.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docintel";

/// Port the API listens on inside the container image.
pub const DEFAULT_API_PORT: u16 = 8000;

// ---------------------------------------------------------------------------
// Config structs (matching docintel.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Download policies.
    #[serde(default)]
    pub fetch: FetchPoliciesConfig,

    /// HTTP API settings.
    #[serde(default)]
    pub api: ApiConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Directory holding `data/` and `logs/`.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,

    /// Optional TOML file with extra `[[sources]]` entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_file: Option<String>,

    /// Replace the built-in registry with `sources_file` instead of extending it.
    #[serde(default)]
    pub replace_builtin_sources: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            sources_file: None,
            replace_builtin_sources: false,
        }
    }
}

fn default_workspace_root() -> String {
    ".".into()
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchPoliciesConfig {
    /// Concurrent downloads.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Pause after each completed download, in ms.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_ms: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for FetchPoliciesConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            rate_limit_ms: default_rate_limit(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_concurrency() -> u32 {
    2
}
fn default_rate_limit() -> u64 {
    1000
}
fn default_timeout() -> u64 {
    30
}

/// `[api]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Interface to bind.
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Name of the env var holding the bearer token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Role granted to authenticated callers.
    #[serde(default = "default_role")]
    pub default_role: String,

    /// Audit log path, relative to the workspace root.
    #[serde(default = "default_audit_log")]
    pub audit_log: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            token_env: default_token_env(),
            default_role: default_role(),
            audit_log: default_audit_log(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    DEFAULT_API_PORT
}
fn default_token_env() -> String {
    "DOCINTEL_API_TOKEN".into()
}
fn default_role() -> String {
    "analyst".into()
}
fn default_audit_log() -> String {
    "logs/audit.log".into()
}

// ---------------------------------------------------------------------------
// Fetch config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime download configuration, merged from config file and CLI flags.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum concurrent HTTP requests.
    pub concurrency: u32,
    /// Pause in ms after each completed download.
    pub rate_limit_ms: u64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            concurrency: config.fetch.concurrency.max(1),
            rate_limit_ms: config.fetch.rate_limit_ms,
            timeout_secs: config.fetch.timeout_secs,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docintel/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DocIntelError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docintel/docintel.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocIntelError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocIntelError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocIntelError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocIntelError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocIntelError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API bearer token from the env var named in the config.
///
/// `None` means no token is configured and the API runs in development mode.
pub fn resolve_api_token(config: &AppConfig) -> Option<String> {
    match std::env::var(&config.api.token_env) {
        Ok(val) if !val.is_empty() => Some(val),
        _ => None,
    }
}
