//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use crate::manifest::TICKER_PLACEHOLDER;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

const MAX_SWEEP_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;
pub(crate) const MAX_API_MAX_AGE_SECS: u64 = 365 * 24 * 60 * 60;

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `origin` is not an http(s) URL
    /// - `cache_prefix` is empty or `cache_version` is not `MAJOR.MINOR.PATCH`
    /// - `max_bytes` is 0 or exceeds 100MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `sweep_interval_secs` is 0 or exceeds a week
    /// - `api_max_age_secs` is under a minute or exceeds a year
    /// - a ticker endpoint lacks the `{ticker}` placeholder
    ///
    /// Returns `ConfigError::Missing` if the static manifest is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.origin_url()?;

        if self.cache_prefix.trim().is_empty() {
            return Err(invalid("cache_prefix", "must not be empty"));
        }
        if !is_semver(&self.cache_version) {
            return Err(invalid("cache_version", "must be MAJOR.MINOR.PATCH"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 100 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 100MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.sweep_interval_secs == 0 {
            return Err(invalid("sweep_interval_secs", "must be at least 1 second"));
        }
        if self.sweep_interval_secs > MAX_SWEEP_INTERVAL_SECS {
            return Err(invalid("sweep_interval_secs", "must not exceed 7 days (604800s)"));
        }
        if self.api_max_age_secs < 60 {
            return Err(invalid("api_max_age_secs", "must be at least 60 seconds"));
        }
        if self.api_max_age_secs > MAX_API_MAX_AGE_SECS {
            return Err(invalid("api_max_age_secs", "must not exceed 365 days (31536000s)"));
        }

        if self.static_manifest.is_empty() {
            return Err(ConfigError::Missing {
                field: "static_manifest".into(),
                hint: "list at least the dashboard entry page, e.g. \"/\"".into(),
            });
        }
        if self.static_manifest.iter().any(|entry| entry.trim().is_empty()) {
            return Err(invalid("static_manifest", "entries must not be empty"));
        }

        if let Some(template) = self.ticker_endpoints.iter().find(|t| !t.contains(TICKER_PLACEHOLDER)) {
            return Err(invalid("ticker_endpoints", format!("{template} has no {TICKER_PLACEHOLDER} placeholder")));
        }

        if self.api_paths.iter().any(|p| !p.starts_with("/api/")) {
            return Err(invalid("api_paths", "every prefix must start with /api/"));
        }

        if self.ticker_endpoints.is_empty() {
            tracing::warn!("ticker_endpoints is empty; CACHE_TICKER messages will cache nothing");
        }

        Ok(())
    }
}

fn is_semver(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}
