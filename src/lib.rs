//! # Price Oracle
//!
//! Answers "what is one unit of the reference asset (ETH) worth in USD right
//! now?" for a payment flow, by querying several independent quote providers
//! in priority order.
//!
//! ## Architecture
//!
//! - **Sources**: static, priority-ordered catalogue of providers
//! - **Fetchers**: sequential provider walk with a per-provider timeout
//! - **Cache**: single last-known-good price with a TTL
//! - **Service**: fallback chain (fresh cache, live fetch, stale cache,
//!   static price) with single-flight fetching
//!
//! ## Example
//!
//! ```rust,ignore
//! use price_oracle::prelude::*;
//!
//! let oracle = OracleService::new(OracleConfig::from_env())?;
//! let eth_usd = oracle.get_price().await?;
//! let charge = oracle.convert_to_usd(nft_price_eth).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    trivial_casts,
    unused_lifetimes,
    unused_qualifications
)]

pub mod error;
pub mod oracle;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, ProviderError, ProviderFailure, Result};
    pub use crate::oracle::{
        config::OracleConfig,
        price::Price,
        service::{CacheStatus, OracleService, PriceQuote, QuoteSource},
        sources::{FeedDescriptor, FeedRegistry, PriceParser},
    };
    pub use crate::utils::clock::{Clock, ManualClock, SystemClock};
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name used in logs and health checks
pub const SERVICE_NAME: &str = "price-oracle";
