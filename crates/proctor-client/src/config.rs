//! Client configuration and backend factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use proctor_core::model::{TimerConfig, AUTO_SUBMITTED_MESSAGE};
use proctor_core::traits::AttemptBackend;

use crate::http::{HttpBackend, DEFAULT_TIMEOUT_SECS};

/// Top-level proctor configuration.
///
/// Note: Custom Debug impl masks the token to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProctorConfig {
    /// Root URL of the LMS API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer token sent with every request.
    #[serde(default)]
    pub token: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Countdown length used when `--duration` is not given.
    #[serde(default = "default_duration")]
    pub default_duration_secs: u64,
    /// Local decrement period in milliseconds.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Resync period in milliseconds.
    #[serde(default = "default_resync_interval")]
    pub resync_interval_ms: u64,
    /// Message the server sends after auto-submitting an attempt.
    #[serde(default = "default_auto_submit_message")]
    pub auto_submit_message: String,
    /// Max retries for a failed attempt start.
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    /// Delay before the first start retry in milliseconds (doubles each retry).
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl std::fmt::Debug for ProctorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProctorConfig")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("default_duration_secs", &self.default_duration_secs)
            .field("tick_interval_ms", &self.tick_interval_ms)
            .field("resync_interval_ms", &self.resync_interval_ms)
            .field("auto_submit_message", &self.auto_submit_message)
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .finish()
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_request_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}
fn default_duration() -> u64 {
    3600
}
fn default_tick_interval() -> u64 {
    1000
}
fn default_resync_interval() -> u64 {
    10_000
}
fn default_auto_submit_message() -> String {
    AUTO_SUBMITTED_MESSAGE.to_string()
}
fn default_retries() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}

impl Default for ProctorConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token: None,
            request_timeout_secs: default_request_timeout(),
            default_duration_secs: default_duration(),
            tick_interval_ms: default_tick_interval(),
            resync_interval_ms: default_resync_interval(),
            auto_submit_message: default_auto_submit_message(),
            max_retries: default_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl ProctorConfig {
    /// Timer settings for an attempt of `duration_secs` seconds.
    pub fn timer_config(&self, duration_secs: u64) -> TimerConfig {
        TimerConfig::new(duration_secs)
            .with_tick_interval(Duration::from_millis(self.tick_interval_ms))
            .with_resync_interval(Duration::from_millis(self.resync_interval_ms))
            .with_auto_submit_message(self.auto_submit_message.clone())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    expand_vars(s, |name| std::env::var(name).ok())
}

/// Substitute each `${VAR}` once. Inserted values are not rescanned.
fn expand_vars(s: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        result.push_str(&lookup(&rest[start + 2..start + end]).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

/// Apply `PROCTOR_API_URL` / `PROCTOR_TOKEN` style overrides from `lookup`.
fn apply_env_overrides(config: &mut ProctorConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("PROCTOR_API_URL") {
        config.base_url = url;
    }
    if let Some(token) = lookup("PROCTOR_TOKEN") {
        config.token = Some(token);
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `proctor.toml` in the current directory
/// 2. `~/.config/proctor/config.toml`
///
/// Environment variable overrides: `PROCTOR_API_URL`, `PROCTOR_TOKEN`.
pub fn load_config() -> Result<ProctorConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<ProctorConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("proctor.toml");
        if local.exists() {
            Some(local)
        } else if let Some(home) = dirs_path() {
            let global = home.join("config.toml");
            if global.exists() {
                Some(global)
            } else {
                None
            }
        } else {
            None
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<ProctorConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => ProctorConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    config.base_url = resolve_env_vars(&config.base_url);
    config.token = config
        .token
        .as_deref()
        .map(resolve_env_vars)
        .filter(|t| !t.is_empty());

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("proctor"))
}

/// Create the HTTP backend described by `config`.
pub fn create_backend(config: &ProctorConfig) -> Result<Arc<dyn AttemptBackend>> {
    let backend = HttpBackend::new(
        &config.base_url,
        config.token.clone(),
        config.request_timeout_secs,
    )?;
    Ok(Arc::new(backend))
}
