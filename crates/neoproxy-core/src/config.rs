//! Interception configuration.
//!
//! Holds the handful of constants the classifier, rewriter and asset
//! resolver depend on. Defaults target the Neopets origin.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default origin domain that interesting URLs must mention.
pub const DEFAULT_ORIGIN_DOMAIN: &str = "neopets.com";

/// Default host rewrite targets are redirected to.
pub const DEFAULT_ASSET_HOST: &str = "images.neopets.com";

/// Default asset store root.
pub const DEFAULT_ASSET_ROOT: &str = "assets/swfs";

/// Default cache-busting query parameter.
pub const DEFAULT_CACHE_BUSTER_PARAM: &str = "_nocache";

/// Configuration for the interception pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterceptConfig {
    /// Domain that game-page, asset and play-flash URLs must contain.
    pub origin_domain: String,
    /// Host that SWF and config requests are rewritten to.
    pub asset_host: String,
    /// Root directory of substitute payloads (`<root>/<name>/<file>`).
    pub asset_root: PathBuf,
    /// Name of the query parameter carrying the cache-busting timestamp.
    pub cache_buster_param: String,
}

impl Default for InterceptConfig {
    fn default() -> Self {
        Self {
            origin_domain: DEFAULT_ORIGIN_DOMAIN.to_string(),
            asset_host: DEFAULT_ASSET_HOST.to_string(),
            asset_root: PathBuf::from(DEFAULT_ASSET_ROOT),
            cache_buster_param: DEFAULT_CACHE_BUSTER_PARAM.to_string(),
        }
    }
}

impl InterceptConfig {
    /// Loads a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Sets the origin domain.
    pub fn with_origin_domain(mut self, domain: impl Into<String>) -> Self {
        self.origin_domain = domain.into();
        self
    }

    /// Sets the asset host.
    pub fn with_asset_host(mut self, host: impl Into<String>) -> Self {
        self.asset_host = host.into();
        self
    }

    /// Sets the asset store root.
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = root.into();
        self
    }

    /// Sets the cache-busting parameter name.
    pub fn with_cache_buster_param(mut self, param: impl Into<String>) -> Self {
        self.cache_buster_param = param.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_target_neopets() {
        let config = InterceptConfig::default();
        assert_eq!(config.origin_domain, "neopets.com");
        assert_eq!(config.asset_host, "images.neopets.com");
        assert_eq!(config.asset_root, PathBuf::from("assets/swfs"));
        assert_eq!(config.cache_buster_param, "_nocache");
    }

    #[test]
    fn builder_setters() {
        let config = InterceptConfig::default()
            .with_origin_domain("example.com")
            .with_asset_host("cdn.example.com")
            .with_asset_root("/srv/swfs")
            .with_cache_buster_param("_cb");
        assert_eq!(config.origin_domain, "example.com");
        assert_eq!(config.asset_host, "cdn.example.com");
        assert_eq!(config.asset_root, PathBuf::from("/srv/swfs"));
        assert_eq!(config.cache_buster_param, "_cb");
    }

    #[test]
    fn from_json_file_fills_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"asset_root": "/tmp/swfs"}}"#).unwrap();

        let config = InterceptConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.asset_root, PathBuf::from("/tmp/swfs"));
        assert_eq!(config.origin_domain, DEFAULT_ORIGIN_DOMAIN);
    }

    #[test]
    fn from_json_file_rejects_unknown_fields() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"asset_rot": "/tmp/swfs"}}"#).unwrap();

        let result = InterceptConfig::from_json_file(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn from_json_file_missing_file() {
        let result = InterceptConfig::from_json_file("/definitely/not/here.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
