//! Client configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`), each with a sensible default: fixed
//! 1.5 s reconnect, no pull timeout, one shared upstream connection.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::SyncError;
use crate::transport::{ReconnectPolicy, ReconnectStrategy};

/// How subscriptions reach the push channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// One upstream connection multiplexed across every subscription.
    Shared,
    /// One upstream connection per subscription.
    Dedicated,
}

/// Top-level client configuration.
///
/// Loaded once at startup via [`SyncConfig::from_env`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the REST backend (e.g. `http://localhost:3000/api`).
    pub api_base_url: String,

    /// WebSocket endpoint of the push channel.
    pub ws_url: String,

    /// Reconnect behaviour of the push channel.
    pub reconnect: ReconnectPolicy,

    /// Pull timeout; `None` waits indefinitely.
    pub pull_timeout: Option<Duration>,

    /// Whether subscriptions share one upstream connection.
    pub transport_mode: TransportMode,

    /// Capacity of the shared transport's frame bus.
    pub frame_bus_capacity: usize,

    /// Location of the persisted settings document.
    pub settings_path: PathBuf,
}

impl SyncConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if a URL or enumerated setting
    /// is present but unusable.
    pub fn from_env() -> Result<Self, SyncError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if a URL or enumerated setting
    /// is present but unusable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_base_url = normalize_url(
            "TURNOS_API_URL",
            lookup("TURNOS_API_URL").unwrap_or_else(|| "http://localhost:3000/api".to_string()),
            &["http://", "https://"],
        )?;
        let ws_url = normalize_url(
            "TURNOS_WS_URL",
            lookup("TURNOS_WS_URL").unwrap_or_else(|| "ws://localhost:3000".to_string()),
            &["ws://", "wss://"],
        )?;

        let strategy = match lookup("TURNOS_RECONNECT_STRATEGY")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("" | "fixed") => ReconnectStrategy::Fixed,
            Some("exponential") => ReconnectStrategy::Exponential,
            Some(other) => {
                return Err(SyncError::InvalidConfig(format!(
                    "TURNOS_RECONNECT_STRATEGY must be `fixed` or `exponential`, got `{other}`"
                )));
            }
        };
        let reconnect = ReconnectPolicy {
            strategy,
            base_delay: Duration::from_millis(parse_var(&lookup, "TURNOS_RECONNECT_DELAY_MS", 1_500)),
            max_delay: Duration::from_millis(parse_var(
                &lookup,
                "TURNOS_RECONNECT_MAX_DELAY_MS",
                30_000,
            )),
            jitter: parse_var_bool(&lookup, "TURNOS_RECONNECT_JITTER", false),
        };

        let pull_timeout = match parse_var::<u64, _>(&lookup, "TURNOS_PULL_TIMEOUT_SECS", 0) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let transport_mode = match lookup("TURNOS_TRANSPORT")
            .map(|v| v.trim().to_ascii_lowercase())
            .as_deref()
        {
            None | Some("" | "shared") => TransportMode::Shared,
            Some("dedicated") => TransportMode::Dedicated,
            Some(other) => {
                return Err(SyncError::InvalidConfig(format!(
                    "TURNOS_TRANSPORT must be `shared` or `dedicated`, got `{other}`"
                )));
            }
        };

        let frame_bus_capacity = parse_var(&lookup, "TURNOS_FRAME_BUS_CAPACITY", 1_024);

        let settings_path = lookup("TURNOS_SETTINGS_PATH")
            .filter(|p| !p.trim().is_empty())
            .map_or_else(default_settings_path, PathBuf::from);

        Ok(Self {
            api_base_url,
            ws_url,
            reconnect,
            pull_timeout,
            transport_mode,
            frame_bus_capacity,
            settings_path,
        })
    }
}

fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("turnos")
        .join("settings.json")
}

fn normalize_url(key: &str, raw: String, schemes: &[&str]) -> Result<String, SyncError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SyncError::InvalidConfig(format!("{key} must not be empty")));
    }
    if !schemes.iter().any(|s| trimmed.starts_with(s)) {
        return Err(SyncError::InvalidConfig(format!(
            "{key} must start with one of {}",
            schemes.join(", ")
        )));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Parses a variable as `T`, returning `default` on missing or invalid values.
fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses a variable as a boolean. Accepts `"true"`, `"1"`, `"false"`, `"0"`
/// (case-insensitive). Returns `default` otherwise.
fn parse_var_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
