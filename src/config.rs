//! Server configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ErrorCode;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MODULE_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

/// Separator of the `LAYOUT_MODULES` list.
pub const MODULE_LIST_SEPARATOR: char = ',';

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported SERVER_MODE '{0}' (expected 'serve' or 'check')")]
    UnsupportedMode(String),
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnsupportedMode(_) => "E_CONFIG_MODE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerMode {
    /// Serve until Ctrl-C or SIGTERM.
    #[default]
    Serve,
    /// Bind, report readiness and exit. Used as a deployment smoke test.
    Check,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub mode: ServerMode,
    pub layout_modules: Vec<PathBuf>,
    pub module_handshake_timeout: Duration,
    pub client_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            mode: ServerMode::Serve,
            layout_modules: Vec::new(),
            module_handshake_timeout: Duration::from_millis(DEFAULT_MODULE_HANDSHAKE_TIMEOUT_MS),
            client_dir: None,
        }
    }
}

impl ServerConfig {
    /// Build typed server config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 8080
    /// - `SERVER_MODE`: `serve` (default) or `check`
    /// - `LAYOUT_MODULES`: comma-separated version module executables; empty
    ///   or absent disables every selector except `current`
    /// - `MODULE_HANDSHAKE_TIMEOUT_MS`: default 10000
    /// - `CLIENT_DIR`: static client files served for unmatched paths
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when `SERVER_MODE` names an unknown mode.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode = parse_mode(std::env::var("SERVER_MODE").ok().as_deref())?;
        let layout_modules = parse_module_list(std::env::var("LAYOUT_MODULES").ok().as_deref());
        let client_dir = std::env::var("CLIENT_DIR")
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            port: env_parse("PORT", DEFAULT_PORT),
            mode,
            layout_modules,
            module_handshake_timeout: Duration::from_millis(env_parse(
                "MODULE_HANDSHAKE_TIMEOUT_MS",
                DEFAULT_MODULE_HANDSHAKE_TIMEOUT_MS,
            )),
            client_dir,
        })
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn parse_mode(raw: Option<&str>) -> Result<ServerMode, ConfigError> {
    match raw.map(str::trim).unwrap_or("serve").to_ascii_lowercase().as_str() {
        "" | "serve" => Ok(ServerMode::Serve),
        "check" => Ok(ServerMode::Check),
        other => Err(ConfigError::UnsupportedMode(other.to_owned())),
    }
}

fn parse_module_list(raw: Option<&str>) -> Vec<PathBuf> {
    raw.unwrap_or_default()
        .split(MODULE_LIST_SEPARATOR)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
