//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (DASHCACHE_*)
//! 2. TOML config file (if DASHCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::classify::{CrossOriginPolicy, DEFAULT_API_PATHS};
use crate::manifest::{DEFAULT_STATIC_MANIFEST, DEFAULT_TICKER_ENDPOINTS};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (DASHCACHE_*)
/// 2. TOML config file (if DASHCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the proxy listens on.
    ///
    /// Set via DASHCACHE_LISTEN_ADDR environment variable.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Dashboard origin that origin-form requests are resolved against.
    ///
    /// Set via DASHCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path to SQLite cache database.
    ///
    /// Set via DASHCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Prefix of the versioned store name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Semantic version embedded in the store name. Bumping it discards
    /// every older store at activation.
    ///
    /// Set via DASHCACHE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// User-Agent string for outgoing requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes to fetch per request.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Period of the expired-entry sweep, in seconds.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Age after which cached API responses are evicted, in seconds.
    #[serde(default = "default_api_max_age_secs")]
    pub api_max_age_secs: u64,

    /// Allow-listed API path prefixes (network-first).
    #[serde(default = "default_api_paths")]
    pub api_paths: Vec<String>,

    /// Assets seeded into the store at install.
    #[serde(default = "default_static_manifest")]
    pub static_manifest: Vec<String>,

    /// Endpoint templates pre-warmed by CACHE_TICKER; `{ticker}` is
    /// replaced by the symbol.
    #[serde(default = "default_ticker_endpoints")]
    pub ticker_endpoints: Vec<String>,

    /// Classification of cross-origin requests.
    #[serde(default)]
    pub cross_origin_policy: CrossOriginPolicy,

    /// Refuse cross-origin fetches that resolve to private or reserved
    /// addresses.
    #[serde(default = "default_true")]
    pub block_private_cross_origin: bool,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".into()
}

fn default_origin() -> String {
    "http://127.0.0.1:5000".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./dashcache.sqlite")
}

fn default_cache_prefix() -> String {
    "stock-dashboard".into()
}

fn default_cache_version() -> String {
    "1.2.0".into()
}

fn default_user_agent() -> String {
    "dashcache/0.1".into()
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_sweep_interval_secs() -> u64 {
    60 * 60
}

fn default_api_max_age_secs() -> u64 {
    24 * 60 * 60
}

fn default_api_paths() -> Vec<String> {
    DEFAULT_API_PATHS.iter().map(|s| s.to_string()).collect()
}

fn default_static_manifest() -> Vec<String> {
    DEFAULT_STATIC_MANIFEST.iter().map(|s| s.to_string()).collect()
}

fn default_ticker_endpoints() -> Vec<String> {
    DEFAULT_TICKER_ENDPOINTS.iter().map(|s| s.to_string()).collect()
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            origin: default_origin(),
            db_path: default_db_path(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
            api_max_age_secs: default_api_max_age_secs(),
            api_paths: default_api_paths(),
            static_manifest: default_static_manifest(),
            ticker_endpoints: default_ticker_endpoints(),
            cross_origin_policy: CrossOriginPolicy::default(),
            block_private_cross_origin: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Age past which cached API entries are evicted, capped at 365 days.
    pub fn api_max_age(&self) -> chrono::Duration {
        let secs = self.api_max_age_secs.min(validation::MAX_API_MAX_AGE_SECS);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
    }

    /// Versioned store name, e.g. `stock-dashboard-v1.2.0`.
    pub fn cache_name(&self) -> String {
        format!("{}-v{}", self.cache_prefix, self.cache_version)
    }

    /// Parsed dashboard origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(url),
            _ => Err(ConfigError::Invalid { field: "origin".into(), reason: "must be an http(s) URL with a host".into() }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `DASHCACHE_`
    /// 2. TOML file from `DASHCACHE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("DASHCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("DASHCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
