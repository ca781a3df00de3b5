//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (PRECACHE_*)
//! 2. TOML config file (if PRECACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (PRECACHE_*)
/// 2. TOML config file (if PRECACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Name of the current cache generation.
    ///
    /// Bumping it is the only way to invalidate cached resources.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin the intercepted application is served from.
    ///
    /// Requests to any other origin are treated as external.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Resources written into the generation on install, in order.
    ///
    /// Relative entries resolve against `origin`.
    #[serde(default = "default_seed_urls")]
    pub seed_urls: Vec<String>,

    /// URL substrings whose responses are never persisted.
    #[serde(default = "default_excluded_patterns")]
    pub excluded_patterns: Vec<String>,

    /// Cached document served to navigations while offline.
    #[serde(default = "default_navigation_fallback")]
    pub navigation_fallback: String,

    /// Fail install when any seed cannot be fetched.
    ///
    /// When false, seed failures are reported and the rest are still cached.
    #[serde(default = "default_true")]
    pub strict_install: bool,

    /// Trigger tag that runs the deferred todo reconciliation.
    #[serde(default = "default_sync_tag")]
    pub sync_tag: String,

    /// Path to SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// How long shutdown waits for pending cache writes.
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,
}

fn default_cache_version() -> String {
    "todo-app-v3".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_seed_urls() -> Vec<String> {
    ["./", "./index.html", "./manifest.json", "./browserconfig.xml"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_excluded_patterns() -> Vec<String> {
    ["analytics", "tracking", "gtag", "facebook.com", "google-analytics.com"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_navigation_fallback() -> String {
    "./index.html".into()
}

fn default_sync_tag() -> String {
    "background-sync-todos".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./precache.sqlite")
}

fn default_user_agent() -> String {
    "precache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_drain_timeout_ms() -> u64 {
    2_000
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_version: default_cache_version(),
            origin: default_origin(),
            seed_urls: default_seed_urls(),
            excluded_patterns: default_excluded_patterns(),
            navigation_fallback: default_navigation_fallback(),
            strict_install: true,
            sync_tag: default_sync_tag(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            drain_timeout_ms: default_drain_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Upper bound on waiting for background writes at shutdown.
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Parsed serving origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<url::Url, ConfigError> {
        let parsed = url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            scheme => Err(ConfigError::Invalid {
                field: "origin".into(),
                reason: format!("unsupported scheme: {scheme}"),
            }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `PRECACHE_`
    /// 2. TOML file from `PRECACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("PRECACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("PRECACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(figment)
    }

    /// Extract and validate a configuration from a prepared figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
