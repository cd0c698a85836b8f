//! Configuration validation rules.
//!
//! Applied after loading, before any component sees the config.

use crate::config::AppConfig;
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

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_name_prefix` or `cache_version` is empty or contains `@`
    /// - `origin` is not an absolute http(s) URL with a host
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("cache_name_prefix", &self.cache_name_prefix),
            ("cache_version", &self.cache_version),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Invalid { field: field.into(), reason: "must not be empty".into() });
            }
            if value.contains('@') {
                // '@' separates the two halves of a generation name
                return Err(ConfigError::Invalid { field: field.into(), reason: "must not contain '@'".into() });
            }
        }

        match url::Url::parse(&self.origin) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some() => {}
            Ok(parsed) => {
                return Err(ConfigError::Invalid {
                    field: "origin".into(),
                    reason: format!("must be an http(s) URL with a host, got scheme {}", parsed.scheme()),
                });
            }
            Err(e) => {
                return Err(ConfigError::Invalid { field: "origin".into(), reason: e.to_string() });
            }
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !self.precache_always.contains(&self.offline_page) {
            tracing::warn!(
                offline_page = %self.offline_page,
                "offline_page is not in precache_always; the offline short-circuit will miss"
            );
        }
        for (resource, fallback) in &self.fallbacks {
            if !self.precache_always.contains(fallback) {
                tracing::warn!(
                    resource = %resource,
                    fallback = %fallback,
                    "fallback URL is not in precache_always; fallback lookups will miss"
                );
            }
        }

        Ok(())
    }
}
