//! Oracle configuration.
//!
//! Configuration is read once at process start, from the environment or a
//! JSON file, and is immutable afterwards.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::oracle::fetchers::HttpFetcherConfig;
use crate::oracle::price::Price;
use crate::oracle::sources::{FeedDescriptor, FeedRegistry};
use crate::utils::constants::*;

/// Configuration for the price oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// How long a fetched price stays fresh, in milliseconds
    pub cache_ttl_ms: u64,
    /// Last-resort price when every feed fails and nothing is cached
    pub static_fallback_price: Option<Price>,
    /// HTTP fetcher configuration
    pub http: HttpFetcherConfig,
    /// Feed overrides; the built-in ETH/USD registry is used when absent
    pub feeds: Option<Vec<FeedDescriptor>>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: DEFAULT_CACHE_TTL_MS,
            static_fallback_price: None,
            http: HttpFetcherConfig::default(),
            feeds: None,
        }
    }
}

impl OracleConfig {
    /// Set the cache TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_ms = ttl.as_millis() as u64;
        self
    }

    /// Set the static fallback price
    pub fn with_static_fallback(mut self, price: Price) -> Self {
        self.static_fallback_price = Some(price);
        self
    }

    /// Set the per-provider timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.http.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Replace the feed list
    pub fn with_feeds(mut self, feeds: Vec<FeedDescriptor>) -> Self {
        self.feeds = Some(feeds);
        self
    }

    /// Cache TTL as a duration
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Registry built from the configured feeds
    pub fn registry(&self) -> Result<FeedRegistry> {
        match &self.feeds {
            Some(feeds) => FeedRegistry::try_new(feeds.clone()),
            None => Ok(FeedRegistry::eth_usd()),
        }
    }

    /// Load from environment variables, keeping defaults for anything unset or unusable
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_CACHE_TTL) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.cache_ttl_ms = ms,
                _ => warn!(var = ENV_CACHE_TTL, value = %raw, "Ignoring invalid cache TTL"),
            }
        }

        if let Some(raw) = lookup(ENV_FALLBACK_PRICE) {
            if !raw.trim().is_empty() {
                match raw.parse::<Price>() {
                    Ok(price) => config.static_fallback_price = Some(price),
                    Err(e) => warn!(var = ENV_FALLBACK_PRICE, value = %raw, error = %e, "Ignoring invalid fallback price"),
                }
            }
        }

        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.http.timeout_ms = ms,
                _ => warn!(var = ENV_REQUEST_TIMEOUT, value = %raw, "Ignoring invalid request timeout"),
            }
        }

        config
    }

    /// Load from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::Config(e.to_string()))?;
        }

        std::fs::write(path, content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache_ttl_ms == 0 {
            return Err(Error::InvalidParameter {
                name: "cache_ttl_ms".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if self.http.timeout_ms == 0 {
            return Err(Error::InvalidParameter {
                name: "http.timeout_ms".into(),
                reason: "must be greater than 0".into(),
            });
        }

        self.registry().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = OracleConfig::default();
        assert_eq!(config.cache_ttl(), Duration::from_secs(300));
        assert_eq!(config.http.timeout(), Duration::from_secs(5));
        assert!(config.static_fallback_price.is_none());
        assert_eq!(config.registry().unwrap().len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env_values() {
        let config = OracleConfig::from_lookup(lookup(&[
            (ENV_CACHE_TTL, "60000"),
            (ENV_FALLBACK_PRICE, "2500.00"),
            (ENV_REQUEST_TIMEOUT, "1500"),
        ]));
        assert_eq!(config.cache_ttl_ms, 60_000);
        assert_eq!(config.static_fallback_price.unwrap().value(), dec!(2500));
        assert_eq!(config.http.timeout_ms, 1_500);
    }

    #[test]
    fn test_from_env_ignores_garbage() {
        let config = OracleConfig::from_lookup(lookup(&[
            (ENV_CACHE_TTL, "five minutes"),
            (ENV_FALLBACK_PRICE, "-3"),
            (ENV_REQUEST_TIMEOUT, "0"),
        ]));
        assert_eq!(config, OracleConfig::default());
    }

    #[test]
    fn test_empty_fallback_is_unset() {
        let config = OracleConfig::from_lookup(lookup(&[(ENV_FALLBACK_PRICE, "  ")]));
        assert!(config.static_fallback_price.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(OracleConfig::default().with_ttl(Duration::ZERO).validate().is_err());
        assert!(OracleConfig::default()
            .with_request_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(OracleConfig::default().with_feeds(vec![]).validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("oracle.json");
        let config = OracleConfig::default()
            .with_ttl(Duration::from_secs(30))
            .with_static_fallback(Price::new(dec!(2500)).unwrap())
            .with_feeds(vec![FeedDescriptor::binance_eth_usdt()]);

        config.save(&path).unwrap();
        let loaded = OracleConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oracle.json");
        std::fs::write(&path, r#"{"static_fallback_price": 1999.5}"#).unwrap();

        let loaded = OracleConfig::load(&path).unwrap();
        assert_eq!(loaded.cache_ttl_ms, DEFAULT_CACHE_TTL_MS);
        assert_eq!(loaded.static_fallback_price.unwrap().value(), dec!(1999.5));
    }

    #[test]
    fn test_load_rejects_non_positive_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oracle.json");
        std::fs::write(&path, r#"{"static_fallback_price": 0}"#).unwrap();
        assert!(matches!(OracleConfig::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let err = OracleConfig::load(Path::new("/nonexistent/oracle.json")).unwrap_err();
        assert_eq!(err.code(), 5002);
    }
}
