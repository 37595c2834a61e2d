//! Oracle module for the reference asset's USD price.
//!
//! This module provides:
//! - A priority-ordered registry of quote providers
//! - Sequential, timeout-bounded fetching (first valid price wins)
//! - A single-entry TTL cache
//! - The oracle service and its fallback chain
//! - USD conversion for payment amounts
//!
//! ## Usage
//!
//! ```rust,ignore
//! use price_oracle::oracle::{OracleConfig, OracleService};
//!
//! let service = OracleService::new(OracleConfig::from_env())?;
//! let price = service.get_price().await?;
//! let status = service.cache_status();
//! ```

pub mod cache;
pub mod config;
pub mod conversion;
pub mod fetchers;
pub mod price;
pub mod service;
pub mod sources;

pub use cache::{CacheEntry, CacheState, PriceCache};
pub use config::OracleConfig;
pub use conversion::UsdConversion;
pub use fetchers::{FeedFetcher, FetchedPrice, HttpClient, HttpFetcherConfig, ReqwestClient};
pub use price::Price;
pub use service::{
    CacheStatus, OracleService, OracleServiceBuilder, OracleStatistics, PriceQuote, QuoteSource,
};
pub use sources::{FeedDescriptor, FeedRegistry, PriceParser};
