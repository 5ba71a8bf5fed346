//! Configuration loading and settings resolution
//!
//! Each setting is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing default config file is not an error: the tools log a warning and
//! continue with compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Global CAVE server hosting the info service
pub const DEFAULT_GLOBAL_SERVER: &str = "https://global.daf-apis.com";
/// Datastack used when none is configured
pub const DEFAULT_DATASTACK: &str = "brain_and_nerve_cord";
/// Concurrent Stage A lookups
pub const DEFAULT_WORKERS: usize = 20;
/// Per-lookup deadline in seconds
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 120;

pub const ENV_GLOBAL_SERVER: &str = "CAVE_GLOBAL_SERVER";
pub const ENV_DATASTACK: &str = "CAVE_DATASTACK";
pub const ENV_TOKEN: &str = "CAVE_TOKEN";

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TomlConfig {
    pub global_server: Option<String>,
    pub datastack: Option<String>,
    pub token: Option<String>,
    pub workers: Option<usize>,
    pub task_timeout_secs: Option<u64>,
    pub max_requests_per_second: Option<u32>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[logging]` table
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Platform config file location (`~/.config/cgtools/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cgtools").join("config.toml"))
}

/// Load and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    Ok(toml::from_str(&content)?)
}

/// Load the explicitly requested config file, or the default one if present
///
/// An explicit path that does not exist is an error; a missing default file
/// falls back to `TomlConfig::default()`.
pub fn load_config_or_default(explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        let config = load_toml_config(path)?;
        info!("Loaded config from {}", path.display());
        return Ok(config);
    }

    match default_config_path() {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        Some(path) => {
            warn!(
                "No config file at {}; using compiled defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            warn!("Could not determine config directory; using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub global_server: Option<String>,
    pub datastack: Option<String>,
    pub workers: Option<usize>,
    /// Seconds; 0 disables the per-lookup deadline
    pub task_timeout_secs: Option<u64>,
    /// 0 disables client-side rate limiting
    pub max_requests_per_second: Option<u32>,
}

/// Fully resolved run settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub global_server: String,
    pub datastack: String,
    pub token: Option<String>,
    pub workers: usize,
    pub task_timeout: Option<Duration>,
    pub max_requests_per_second: Option<u32>,
    pub log_level: String,
}

impl Settings {
    /// Resolve settings from CLI, environment, TOML, then compiled defaults
    pub fn resolve(cli: &CliOverrides, toml_config: &TomlConfig) -> Result<Self> {
        let global_server = cli
            .global_server
            .clone()
            .or_else(|| non_empty_env(ENV_GLOBAL_SERVER))
            .or_else(|| toml_config.global_server.clone())
            .unwrap_or_else(|| DEFAULT_GLOBAL_SERVER.to_string());

        let datastack = cli
            .datastack
            .clone()
            .or_else(|| non_empty_env(ENV_DATASTACK))
            .or_else(|| toml_config.datastack.clone())
            .unwrap_or_else(|| DEFAULT_DATASTACK.to_string());

        let workers = cli
            .workers
            .or(toml_config.workers)
            .unwrap_or(DEFAULT_WORKERS);
        if workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }

        let timeout_secs = cli
            .task_timeout_secs
            .or(toml_config.task_timeout_secs)
            .unwrap_or(DEFAULT_TASK_TIMEOUT_SECS);
        let task_timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

        let max_requests_per_second = cli
            .max_requests_per_second
            .or(toml_config.max_requests_per_second)
            .filter(|rps| *rps > 0);

        let token = resolve_token(
            non_empty_env(ENV_TOKEN),
            toml_config,
            cave_secret_path().as_deref(),
        );

        Ok(Self {
            global_server: global_server.trim_end_matches('/').to_string(),
            datastack,
            token,
            workers,
            task_timeout,
            max_requests_per_second,
            log_level: toml_config.logging.level.clone(),
        })
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| is_non_blank(v))
}

/// Location of the token file written by CAVEclient/cloudvolume
pub fn cave_secret_path() -> Option<PathBuf> {
    dirs::home_dir().map(|d| {
        d.join(".cloudvolume")
            .join("secrets")
            .join("cave-secret.json")
    })
}

#[derive(Deserialize)]
struct SecretFile {
    token: Option<String>,
}

fn read_secret_file(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<SecretFile>(&content) {
        Ok(secret) => secret.token,
        Err(e) => {
            warn!("Ignoring unreadable secret file {}: {}", path.display(), e);
            None
        }
    }
}

/// Resolve the auth token
///
/// **Priority:** ENV → TOML → secret file. No token at all is allowed for
/// public datastacks.
pub fn resolve_token(
    env_token: Option<String>,
    toml_config: &TomlConfig,
    secret_path: Option<&Path>,
) -> Option<String> {
    let toml_token = toml_config.token.clone().filter(|t| is_valid_token(t));
    let file_token = secret_path
        .and_then(read_secret_file)
        .filter(|t| is_valid_token(t));
    let env_token = env_token.filter(|t| is_valid_token(t));

    let sources: Vec<&str> = [
        env_token.as_ref().map(|_| "environment"),
        toml_token.as_ref().map(|_| "TOML"),
        file_token.as_ref().map(|_| "secret file"),
    ]
    .into_iter()
    .flatten()
    .collect();

    if sources.len() > 1 {
        warn!(
            "Auth token found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    let token = env_token.or(toml_token).or(file_token);
    match sources.first() {
        Some(source) => info!("Auth token loaded from {}", source),
        None => warn!(
            "No auth token configured (set {} or add `token` to config.toml); \
             continuing unauthenticated",
            ENV_TOKEN
        ),
    }
    token
}

/// True when `value` has at least one non-whitespace character
pub fn is_non_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Validate a token (non-empty, non-whitespace)
pub fn is_valid_token(token: &str) -> bool {
    is_non_blank(token)
}
