//! Configuration management for the Alice gateway client.
//!
//! The client reads a single configuration file at `~/.alice/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (ALICE_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `ALICE_GATEWAY_URL` → gateway.url
//! - `ALICE_MAX_TEARDOWN_RETRIES` → gateway.max_teardown_retries
//! - `ALICE_LANGUAGE` → client.language
//! - `ALICE_APP_VERSION` → client.app_version
//! - `ALICE_LOG_LEVEL` → observability.log_level
//! - `ALICE_LOG_FORMAT` → observability.log_format

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::validation::Validate;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".alice"),
        |dirs| dirs.home_dir().join(".alice"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Gateway Configuration
// ============================================================================

/// Gateway connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// WebSocket endpoint of the gateway.
    #[serde(default = "default_gateway_url")]
    pub url: String,

    /// Seconds allowed for opening the connection.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Seconds to wait for a single reply before giving up.
    #[serde(default = "default_reply_timeout_secs")]
    pub reply_timeout_secs: u64,

    /// How many times a question is re-submitted after a teardown signal.
    #[serde(default = "default_max_teardown_retries")]
    pub max_teardown_retries: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: default_gateway_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
            reply_timeout_secs: default_reply_timeout_secs(),
            max_teardown_retries: default_max_teardown_retries(),
        }
    }
}

impl GatewayConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_secs(self.reply_timeout_secs)
    }
}

fn default_gateway_url() -> String {
    "wss://uniproxy.alice.ya.ru/uni.ws".into()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_reply_timeout_secs() -> u64 {
    60
}

fn default_max_teardown_retries() -> u32 {
    1
}

// ============================================================================
// Client Configuration
// ============================================================================

/// Which `prev_req_id` convention the initial envelope follows.
///
/// Gateway snapshots disagree: some expect a freshly generated id on the first
/// turn, others expect `null`. Deployments pin one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrevRequestIdMode {
    /// Embed a synthetic, freshly generated previous-request id.
    #[default]
    Synthetic,
    /// Send `null`.
    Null,
}

/// Client identity and protocol settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Conversation language tag sent with every envelope.
    #[serde(default = "default_language")]
    pub language: String,

    /// Client version used when the landing page cannot be scraped.
    #[serde(default = "default_app_version")]
    pub app_version: String,

    /// Scrape the landing page for the current client version on startup.
    #[serde(default = "default_true")]
    pub resolve_version: bool,

    /// Landing page carrying the production client version.
    #[serde(default = "default_version_source_url")]
    pub version_source_url: String,

    /// Timeout for the landing page fetch.
    #[serde(default = "default_version_fetch_timeout_secs")]
    pub version_fetch_timeout_secs: u64,

    /// `prev_req_id` convention of the first envelope of each question.
    #[serde(default)]
    pub prev_request_id: PrevRequestIdMode,

    /// Send a `SynchronizeState` handshake after every connect.
    ///
    /// The handshake is fire-and-forget: no reply is awaited. Against a gateway
    /// that acknowledges it, the acknowledgement is read as the reply to the
    /// first question. Leave this off unless the gateway stays silent.
    #[serde(default)]
    pub synchronize_state: bool,

    /// IANA timezone reported in the application block.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            app_version: default_app_version(),
            resolve_version: default_true(),
            version_source_url: default_version_source_url(),
            version_fetch_timeout_secs: default_version_fetch_timeout_secs(),
            prev_request_id: PrevRequestIdMode::default(),
            synchronize_state: false,
            timezone: default_timezone(),
        }
    }
}

impl ClientConfig {
    pub fn version_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.version_fetch_timeout_secs)
    }
}

fn default_language() -> String {
    "ru-RU".into()
}

fn default_app_version() -> String {
    "1.0.281-home-static/alice-web/15".into()
}

fn default_version_source_url() -> String {
    "https://ya.ru/alisa_davay_pridumaem?utm_source=landing".into()
}

fn default_version_fetch_timeout_secs() -> u64 {
    5
}

fn default_timezone() -> String {
    "Europe/Moscow".into()
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets pinned to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration (default path or `path`) with environment overrides applied.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("ALICE_GATEWAY_URL") {
            self.gateway.url = url;
        }
        if let Some(retries) = lookup("ALICE_MAX_TEARDOWN_RETRIES") {
            match retries.parse() {
                Ok(n) => self.gateway.max_teardown_retries = n,
                Err(_) => tracing::warn!(value = %retries, "Ignoring invalid ALICE_MAX_TEARDOWN_RETRIES"),
            }
        }
        if let Some(language) = lookup("ALICE_LANGUAGE") {
            self.client.language = language;
        }
        if let Some(version) = lookup("ALICE_APP_VERSION") {
            self.client.app_version = version;
            self.client.resolve_version = false;
        }
        if let Some(level) = lookup("ALICE_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("ALICE_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }

    /// Load and validate configuration.
    pub fn load_and_validate(path: Option<&Path>) -> Result<Self> {
        let config = Self::load_with_env(path)?;
        config.validate()?;
        Ok(config)
    }
}
