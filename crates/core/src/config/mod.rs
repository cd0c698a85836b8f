//! Application configuration with layered loading.
//!
//! Configuration is assembled once at startup and passed by reference into
//! every component; nothing reads ambient mutable globals. Loading uses
//! figment with the following precedence:
//!
//! 1. Environment variables (OVERCAST_*)
//! 2. TOML config file (if OVERCAST_CONFIG_FILE set)
//! 3. Built-in defaults

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::resource::ResourceType;

mod validation;

pub use validation::ConfigError;

/// Immutable application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Cache generations are named `{cache_name_prefix}@{cache_version}`.
    #[serde(default = "default_cache_name_prefix")]
    pub cache_name_prefix: String,

    /// Version half of the generation name. The build pipeline bakes a new
    /// value here per deployment rollout.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Path to the SQLite cache database.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// The single logical origin this layer fronts. Origin-relative paths
    /// (manifest, precache list, fallbacks) resolve against it.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Location of the versioned asset manifest, relative to `origin`.
    #[serde(default = "default_manifest_path")]
    pub manifest_path: String,

    /// Hosts other than the origin whose requests are still admitted.
    #[serde(default)]
    pub allowed_hosts: Vec<String>,

    /// URLs precached at install regardless of manifest contents. The
    /// offline page and fallback assets belong here.
    #[serde(default = "default_precache_always")]
    pub precache_always: Vec<String>,

    /// Page served by the offline short-circuit. Must be precached.
    #[serde(default = "default_offline_page")]
    pub offline_page: String,

    /// Extension (without the dot) to resource type, for classification.
    #[serde(default = "default_resource_extensions")]
    pub resource_extensions: BTreeMap<String, ResourceType>,

    /// Fallback URL per resource type, served when a strategy result is
    /// unusable. Fallback URLs must be precached.
    #[serde(default = "default_fallbacks")]
    pub fallbacks: BTreeMap<ResourceType, String>,

    /// Match cached entries ignoring the query string.
    #[serde(default)]
    pub ignore_query_on_match: bool,

    /// User-Agent string for outgoing fetches.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum bytes fetched (and therefore cached) per response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network fetch timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_cache_name_prefix() -> String {
    "overcast".into()
}

fn default_cache_version() -> String {
    "1".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./overcast-cache.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8000".into()
}

fn default_manifest_path() -> String {
    "/rev-manifest.json".into()
}

fn default_precache_always() -> Vec<String> {
    vec!["/offline.html".into(), "/assets/blank.png".into()]
}

fn default_offline_page() -> String {
    "/offline.html".into()
}

fn default_resource_extensions() -> BTreeMap<String, ResourceType> {
    let mut map = BTreeMap::new();
    map.insert("html".into(), ResourceType::Page);
    map.insert("css".into(), ResourceType::Stylesheet);
    map.insert("js".into(), ResourceType::Script);
    map.insert("mjs".into(), ResourceType::Script);
    for ext in ["png", "gif", "jpg", "jpeg", "svg", "webp"] {
        map.insert(ext.into(), ResourceType::Image);
    }
    map
}

fn default_fallbacks() -> BTreeMap<ResourceType, String> {
    let mut map = BTreeMap::new();
    map.insert(ResourceType::Page, "/offline.html".into());
    map.insert(ResourceType::Image, "/assets/blank.png".into());
    map
}

fn default_user_agent() -> String {
    "overcast/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_timeout_ms() -> u64 {
    20_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_name_prefix: default_cache_name_prefix(),
            cache_version: default_cache_version(),
            db_path: default_db_path(),
            origin: default_origin(),
            manifest_path: default_manifest_path(),
            allowed_hosts: Vec::new(),
            precache_always: default_precache_always(),
            offline_page: default_offline_page(),
            resource_extensions: default_resource_extensions(),
            fallbacks: default_fallbacks(),
            ignore_query_on_match: false,
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OVERCAST_`
    /// 2. TOML file from `OVERCAST_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a source cannot be read or validation
    /// fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("OVERCAST_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OVERCAST_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Resolve a possibly origin-relative path against the configured origin.
    ///
    /// Absolute URLs pass through untouched.
    pub fn resolve_url(&self, path_or_url: &str) -> Result<String, Error> {
        if path_or_url.contains("://") {
            return Ok(path_or_url.to_string());
        }
        let base = url::Url::parse(&self.origin).map_err(|e| Error::InvalidUrl(format!("origin: {e}")))?;
        let joined = base
            .join(path_or_url)
            .map_err(|e| Error::InvalidUrl(format!("{path_or_url}: {e}")))?;
        Ok(joined.to_string())
    }

    /// Absolute URL of the asset manifest.
    pub fn manifest_url(&self) -> Result<String, Error> {
        self.resolve_url(&self.manifest_path)
    }

    /// Host component of the configured origin.
    pub fn origin_host(&self) -> Option<String> {
        url::Url::parse(&self.origin)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }

    /// The full generation name for this deployment.
    pub fn generation_name(&self) -> String {
        format!("{}@{}", self.cache_name_prefix, self.cache_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cache_name_prefix, "overcast");
        assert_eq!(config.db_path, PathBuf::from("./overcast-cache.sqlite"));
        assert_eq!(config.manifest_path, "/rev-manifest.json");
        assert_eq!(config.precache_always, vec!["/offline.html", "/assets/blank.png"]);
        assert_eq!(config.offline_page, "/offline.html");
        assert!(!config.ignore_query_on_match);
        assert_eq!(config.max_bytes, 5_242_880);
        assert_eq!(config.timeout_ms, 20_000);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), Duration::from_millis(20_000));
    }

    #[test]
    fn test_resolve_url_relative() {
        let config = AppConfig { origin: "https://example.com".into(), ..Default::default() };
        let url = config.resolve_url("/assets/main-ab12.css").unwrap();
        assert_eq!(url, "https://example.com/assets/main-ab12.css");
    }

    #[test]
    fn test_resolve_url_absolute_passthrough() {
        let config = AppConfig::default();
        let url = config.resolve_url("https://cdn.example.com/font.woff2").unwrap();
        assert_eq!(url, "https://cdn.example.com/font.woff2");
    }

    #[test]
    fn test_manifest_url_joins_origin() {
        let config = AppConfig { origin: "https://example.com".into(), ..Default::default() };
        assert_eq!(config.manifest_url().unwrap(), "https://example.com/rev-manifest.json");
    }

    #[test]
    fn test_generation_name() {
        let config =
            AppConfig { cache_name_prefix: "site".into(), cache_version: "0.3.1".into(), ..Default::default() };
        assert_eq!(config.generation_name(), "site@0.3.1");
    }

    #[test]
    fn test_default_routing_tables() {
        let config = AppConfig::default();
        assert_eq!(config.resource_extensions.get("css"), Some(&ResourceType::Stylesheet));
        assert_eq!(config.resource_extensions.get("svg"), Some(&ResourceType::Image));
        assert_eq!(config.fallbacks.get(&ResourceType::Page).unwrap(), "/offline.html");
        assert!(!config.fallbacks.contains_key(&ResourceType::Script));
    }

    #[test]
    fn test_file_layer_overrides_defaults() {
        let figment = Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::string(
            r#"
                cache_version = "7"
                ignore_query_on_match = true
                allowed_hosts = ["fonts.gstatic.com"]
            "#,
        ));
        let config: AppConfig = figment.extract().unwrap();
        assert_eq!(config.cache_version, "7");
        assert!(config.ignore_query_on_match);
        assert_eq!(config.allowed_hosts, vec!["fonts.gstatic.com"]);
        // untouched keys keep their defaults
        assert_eq!(config.cache_name_prefix, "overcast");
    }
}
