//! Quote provider definitions and the feed registry.
//!
//! This module defines:
//! - [`PriceParser`]: how to pull a price out of a provider's JSON response
//! - [`FeedDescriptor`]: one provider (endpoint, parse rule, priority)
//! - [`FeedRegistry`]: the immutable, priority-ordered catalogue of providers

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, ProviderError, Result};
use crate::oracle::price::Price;

// ═══════════════════════════════════════════════════════════════════════════════
// RESPONSE PARSING
// ═══════════════════════════════════════════════════════════════════════════════

/// Rule for extracting a price from a JSON response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceParser {
    /// Walk object keys (or numeric array indices) down to a number or numeric string
    FieldPath(Vec<String>),
}

impl PriceParser {
    /// Build a field path parser from `a.b.c` notation
    pub fn path(dotted: &str) -> Self {
        PriceParser::FieldPath(dotted.split('.').map(str::to_string).collect())
    }

    /// Extract and validate a price from a response body
    pub fn parse(&self, body: &Value) -> std::result::Result<Price, ProviderError> {
        match self {
            PriceParser::FieldPath(path) => {
                let mut node = body;
                for segment in path {
                    node = match node {
                        Value::Object(map) => map.get(segment),
                        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                        _ => None,
                    }
                    .ok_or_else(|| ProviderError::MissingField(path.join(".")))?;
                }
                coerce_price(node)
            }
        }
    }
}

/// Coerce a JSON leaf into a positive price
fn coerce_price(node: &Value) -> std::result::Result<Price, ProviderError> {
    let raw = match node {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => {
            return Err(ProviderError::InvalidPrice(format!(
                "expected number or numeric string, got {}",
                other
            )))
        }
    };
    raw.parse::<Price>()
        .map_err(|e| ProviderError::InvalidPrice(e.to_string()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEED DESCRIPTOR
// ═══════════════════════════════════════════════════════════════════════════════

/// A single quote provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedDescriptor {
    /// Provider name, used in logs and failure reports
    pub name: String,
    /// HTTPS endpoint returning JSON
    pub endpoint: String,
    /// How to read the price from the response
    pub parser: PriceParser,
    /// Lower is tried first
    pub priority: u32,
}

impl FeedDescriptor {
    /// Create a new feed descriptor
    pub fn new(
        name: impl Into<String>,
        endpoint: impl Into<String>,
        parser: PriceParser,
        priority: u32,
    ) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            parser,
            priority,
        }
    }

    /// CoinGecko simple price: `{"ethereum":{"usd":3521.47}}`
    pub fn coingecko_eth_usd() -> Self {
        Self::new(
            "coingecko",
            "https://api.coingecko.com/api/v3/simple/price?ids=ethereum&vs_currencies=usd",
            PriceParser::path("ethereum.usd"),
            1,
        )
    }

    /// Coinbase exchange rates: `{"data":{"currency":"ETH","rates":{"USD":"3521.47"}}}`
    pub fn coinbase_eth_usd() -> Self {
        Self::new(
            "coinbase",
            "https://api.coinbase.com/v2/exchange-rates?currency=ETH",
            PriceParser::path("data.rates.USD"),
            2,
        )
    }

    /// Binance ticker: `{"symbol":"ETHUSDT","price":"3521.47000000"}`
    pub fn binance_eth_usdt() -> Self {
        Self::new(
            "binance",
            "https://api.binance.com/api/v3/ticker/price?symbol=ETHUSDT",
            PriceParser::path("price"),
            3,
        )
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEED REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable, priority-ordered list of providers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedRegistry {
    feeds: Vec<FeedDescriptor>,
}

impl FeedRegistry {
    /// Build a registry; equal priorities keep registration order
    pub fn new(mut feeds: Vec<FeedDescriptor>) -> Self {
        feeds.sort_by_key(|feed| feed.priority);
        Self { feeds }
    }

    /// Build a registry, rejecting an empty list and duplicate names
    pub fn try_new(feeds: Vec<FeedDescriptor>) -> Result<Self> {
        if feeds.is_empty() {
            return Err(Error::InvalidParameter {
                name: "feeds".into(),
                reason: "at least one feed is required".into(),
            });
        }
        for (i, feed) in feeds.iter().enumerate() {
            if feed.name.trim().is_empty() {
                return Err(Error::InvalidParameter {
                    name: "feeds".into(),
                    reason: format!("feed #{} has an empty name", i),
                });
            }
            if feeds[..i].iter().any(|other| other.name == feed.name) {
                return Err(Error::InvalidParameter {
                    name: "feeds".into(),
                    reason: format!("duplicate feed name {:?}", feed.name),
                });
            }
        }
        Ok(Self::new(feeds))
    }

    /// Built-in ETH/USD providers
    pub fn eth_usd() -> Self {
        Self::new(vec![
            FeedDescriptor::coingecko_eth_usd(),
            FeedDescriptor::coinbase_eth_usd(),
            FeedDescriptor::binance_eth_usdt(),
        ])
    }

    /// Feeds in attempt order
    pub fn list(&self) -> &[FeedDescriptor] {
        &self.feeds
    }

    /// Get number of feeds
    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    /// Look up a feed by name
    pub fn get(&self, name: &str) -> Option<&FeedDescriptor> {
        self.feeds.iter().find(|feed| feed.name == name)
    }
}

impl Default for FeedRegistry {
    fn default() -> Self {
        Self::eth_usd()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
