//! Oracle service: the price facade used by the payment flow.
//!
//! [`OracleService::get_price`] answers with the first tier of the fallback
//! chain that has a price:
//!
//! 1. fresh cache (no network I/O)
//! 2. live fetch across the feed registry, in priority order
//! 3. stale cache (timestamp left untouched, so the next call fetches again)
//! 4. static fallback price from configuration
//!
//! and fails with [`Error::OracleUnavailable`] when none does.
//!
//! Live fetches are single-flight: callers that arrive while a fetch is in
//! progress wait for it and share its outcome instead of hitting providers
//! again.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use price_oracle::oracle::{OracleConfig, OracleService};
//!
//! let service = OracleService::new(OracleConfig::from_env())?;
//! let eth_usd = service.get_price().await?;
//!
//! // Force the next read to go to the network
//! service.clear_cache();
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{Error, ProviderFailure, Result};
use crate::oracle::cache::{CacheState, PriceCache};
use crate::oracle::config::OracleConfig;
use crate::oracle::conversion::{self, UsdConversion};
use crate::oracle::fetchers::{FeedFetcher, FetchedPrice, HttpClient, ReqwestClient};
use crate::oracle::price::Price;
use crate::oracle::sources::FeedRegistry;
use crate::utils::clock::{Clock, SystemClock};

// ═══════════════════════════════════════════════════════════════════════════════
// QUOTES
// ═══════════════════════════════════════════════════════════════════════════════

/// Which tier of the fallback chain produced a price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSource {
    /// Cached value within its TTL
    FreshCache,
    /// Fetched from a provider during this call
    LiveFetch,
    /// Cached value past its TTL, served because every provider failed
    StaleCache,
    /// Configured static price
    StaticFallback,
}

impl QuoteSource {
    /// Tiers in evaluation order
    pub const CHAIN: [QuoteSource; 4] = [
        QuoteSource::FreshCache,
        QuoteSource::LiveFetch,
        QuoteSource::StaleCache,
        QuoteSource::StaticFallback,
    ];

    /// Returns true for tiers that answer with possibly outdated data
    pub fn is_degraded(&self) -> bool {
        matches!(self, QuoteSource::StaleCache | QuoteSource::StaticFallback)
    }
}

impl std::fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QuoteSource::FreshCache => "fresh_cache",
            QuoteSource::LiveFetch => "live_fetch",
            QuoteSource::StaleCache => "stale_cache",
            QuoteSource::StaticFallback => "static_fallback",
        };
        f.write_str(name)
    }
}

/// A price together with where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriceQuote {
    /// USD per unit of the reference asset
    pub price: Price,
    /// Tier that answered
    pub source: QuoteSource,
    /// Feed name, for live fetches
    pub provider: Option<String>,
    /// When the quote was served
    pub served_at: DateTime<Utc>,
}

/// Cache diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatus {
    /// A value has been fetched at some point
    pub has_value: bool,
    /// The value is within its TTL
    pub is_fresh: bool,
    /// Empty, fresh or stale
    pub state: CacheState,
    /// Seconds since the value was fetched; `None` when empty or invalidated
    pub age_seconds: Option<f64>,
    /// Configured TTL in seconds
    pub ttl_seconds: f64,
    /// Last known value
    pub current_value: Option<Price>,
    /// When the value was fetched
    pub fetched_at: Option<DateTime<Utc>>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATISTICS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
struct Counters {
    fresh_hits: AtomicU64,
    live_fetches: AtomicU64,
    stale_fallbacks: AtomicU64,
    static_fallbacks: AtomicU64,
    unavailable: AtomicU64,
    coalesced: AtomicU64,
    provider_failures: AtomicU64,
}

impl Counters {
    fn record(&self, source: QuoteSource) {
        let counter = match source {
            QuoteSource::FreshCache => &self.fresh_hits,
            QuoteSource::LiveFetch => &self.live_fetches,
            QuoteSource::StaleCache => &self.stale_fallbacks,
            QuoteSource::StaticFallback => &self.static_fallbacks,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Oracle service statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleStatistics {
    /// Answers served from a fresh cache
    pub fresh_hits: u64,
    /// Answers served from a live fetch
    pub live_fetches: u64,
    /// Answers served from a stale cache
    pub stale_fallbacks: u64,
    /// Answers served from the static price
    pub static_fallbacks: u64,
    /// Calls that ended in `OracleUnavailable`
    pub unavailable: u64,
    /// Calls that joined another caller's in-flight fetch
    pub coalesced: u64,
    /// Individual provider attempts that failed
    pub provider_failures: u64,
}

impl OracleStatistics {
    /// Total answered calls
    pub fn total_served(&self) -> u64 {
        self.fresh_hits + self.live_fetches + self.stale_fallbacks + self.static_fallbacks
    }

    /// Share of answered calls that used a degraded tier, as a percentage
    pub fn degraded_rate(&self) -> f64 {
        let total = self.total_served();
        if total == 0 {
            0.0
        } else {
            (self.stale_fallbacks + self.static_fallbacks) as f64 / total as f64 * 100.0
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE SERVICE
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of one fetch pass, shared with coalesced callers
type FetchOutcome = std::result::Result<FetchedPrice, Vec<ProviderFailure>>;

/// Last completed pass, tagged with the invalidation epoch it started in
#[derive(Debug, Clone)]
struct CompletedPass {
    epoch: u64,
    outcome: FetchOutcome,
}

/// Price oracle with TTL cache, prioritized feeds and fallbacks
pub struct OracleService {
    /// Configuration
    config: OracleConfig,
    /// Feeds in priority order
    registry: FeedRegistry,
    /// Provider walker
    fetcher: FeedFetcher,
    /// Time source for cache freshness
    clock: Arc<dyn Clock>,
    /// Single-entry price cache
    cache: RwLock<PriceCache>,
    /// Bumped each time a fetch pass completes
    fetch_generation: AtomicU64,
    /// Bumped by every `clear_cache`
    invalidation_epoch: AtomicU64,
    /// Held for the duration of a fetch pass; stores the latest outcome
    in_flight: Mutex<Option<CompletedPass>>,
    /// Usage counters
    counters: Counters,
}

impl OracleService {
    /// Create a service with the reqwest client and the system clock
    pub fn new(config: OracleConfig) -> Result<Self> {
        let client = ReqwestClient::new(&config.http)?;
        Self::builder(config).client(Arc::new(client)).build()
    }

    /// Start a builder for injecting a client, clock or registry
    pub fn builder(config: OracleConfig) -> OracleServiceBuilder {
        OracleServiceBuilder {
            config,
            client: None,
            clock: None,
            registry: None,
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Feeds in attempt order
    pub fn registry(&self) -> &FeedRegistry {
        &self.registry
    }

    /// Current USD price of one unit of the reference asset
    pub async fn get_price(&self) -> Result<Price> {
        self.quote().await.map(|quote| quote.price)
    }

    /// Current price along with the tier that produced it
    pub async fn quote(&self) -> Result<PriceQuote> {
        let mut failures = Vec::new();

        for tier in QuoteSource::CHAIN {
            let quote = match tier {
                QuoteSource::FreshCache => self.fresh_cache(),
                QuoteSource::LiveFetch => match self.live_fetch().await {
                    Ok(quote) => Some(quote),
                    Err(reasons) => {
                        failures = reasons;
                        None
                    }
                },
                QuoteSource::StaleCache => self.stale_cache(),
                QuoteSource::StaticFallback => self.static_fallback(),
            };

            if let Some(quote) = quote {
                self.counters.record(quote.source);
                return Ok(quote);
            }
        }

        self.counters.unavailable.fetch_add(1, Ordering::Relaxed);
        error!(
            failed_feeds = failures.len(),
            "No price available from feeds, cache or static fallback"
        );
        Err(Error::OracleUnavailable { failures })
    }

    /// Invalidate the cache so the next read goes to the network
    ///
    /// The last value is kept and still serves as the stale fallback. A fetch
    /// already in flight neither satisfies later callers nor marks its result
    /// fresh.
    pub fn clear_cache(&self) {
        let mut cache = self.cache_mut();
        self.invalidation_epoch.fetch_add(1, Ordering::AcqRel);
        cache.invalidate();
        drop(cache);
        info!("Price cache cleared");
    }

    /// Invalidate the cache and resolve a new price
    pub async fn refresh(&self) -> Result<PriceQuote> {
        self.clear_cache();
        self.quote().await
    }

    /// Snapshot of the cache
    pub fn cache_status(&self) -> CacheStatus {
        let now = self.clock.now();
        let cache = self.cache_ref();
        let entry = cache.get();

        CacheStatus {
            has_value: entry.is_some(),
            is_fresh: cache.is_fresh(now),
            state: cache.state(now),
            age_seconds: entry.and_then(|e| e.age(now)).map(|age| age.as_secs_f64()),
            ttl_seconds: cache.ttl().as_secs_f64(),
            current_value: entry.map(|e| e.value),
            fetched_at: entry.and_then(|e| e.fetched_at),
        }
    }

    /// Usage counters
    pub fn statistics(&self) -> OracleStatistics {
        let c = &self.counters;
        OracleStatistics {
            fresh_hits: c.fresh_hits.load(Ordering::Relaxed),
            live_fetches: c.live_fetches.load(Ordering::Relaxed),
            stale_fallbacks: c.stale_fallbacks.load(Ordering::Relaxed),
            static_fallbacks: c.static_fallbacks.load(Ordering::Relaxed),
            unavailable: c.unavailable.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            provider_failures: c.provider_failures.load(Ordering::Relaxed),
        }
    }

    /// Price an amount of the reference asset in USD
    ///
    /// `OracleUnavailable` propagates so the caller cannot charge an
    /// unpriced amount.
    pub async fn convert_to_usd(&self, asset_amount: Decimal) -> Result<UsdConversion> {
        let quote = self.quote().await?;
        conversion::convert(asset_amount, &quote)
    }

    // ───────────────────────────────────────────────────────────────────────
    // Fallback tiers
    // ───────────────────────────────────────────────────────────────────────

    fn fresh_cache(&self) -> Option<PriceQuote> {
        let now = self.clock.now();
        let cache = self.cache_ref();
        if !cache.is_fresh(now) {
            return None;
        }
        let entry = cache.get()?;
        debug!(price = %entry.value, "Using cached price");
        Some(PriceQuote {
            price: entry.value,
            source: QuoteSource::FreshCache,
            provider: None,
            served_at: now,
        })
    }

    async fn live_fetch(&self) -> std::result::Result<PriceQuote, Vec<ProviderFailure>> {
        let epoch = self.invalidation_epoch.load(Ordering::Acquire);
        let observed = self.fetch_generation.load(Ordering::Acquire);
        let mut slot = self.in_flight.lock().await;

        // A pass that started after our view of the cache finished while we
        // waited: take its outcome
        if self.fetch_generation.load(Ordering::Acquire) != observed {
            if let Some(pass) = slot.as_ref().filter(|pass| pass.epoch >= epoch) {
                self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                debug!("Joined in-flight price fetch");
                return pass.outcome.clone().map(|fetched| self.live_quote(fetched));
            }
        }

        // A pass finished between the freshness check and reading the generation
        if let Some(quote) = self.fresh_cache() {
            return Ok(quote);
        }

        let started = self.invalidation_epoch.load(Ordering::Acquire);
        let requested_at = self.clock.now();
        let outcome: FetchOutcome = match self.fetcher.fetch_best(&self.registry).await {
            Ok(fetched) => {
                let mut cache = self.cache_mut();
                // Age counts from when the pass was requested
                cache.put(fetched.price, requested_at);
                // Cleared mid-pass: keep the value as a stale fallback only
                if self.invalidation_epoch.load(Ordering::Acquire) != started {
                    debug!("Price cache cleared during fetch, result stored as stale");
                    cache.invalidate();
                }
                drop(cache);
                Ok(fetched)
            }
            Err(e) => Err(e.provider_failures().to_vec()),
        };

        let failed = match &outcome {
            Ok(fetched) => fetched.failures.len(),
            Err(failures) => failures.len(),
        };
        self.counters
            .provider_failures
            .fetch_add(failed as u64, Ordering::Relaxed);

        *slot = Some(CompletedPass {
            epoch: started,
            outcome: outcome.clone(),
        });
        self.fetch_generation.fetch_add(1, Ordering::Release);
        drop(slot);

        outcome.map(|fetched| self.live_quote(fetched))
    }

    fn stale_cache(&self) -> Option<PriceQuote> {
        let entry = self.cache_ref().get()?;
        warn!(price = %entry.value, "All price feeds failed, using stale cached price");
        Some(PriceQuote {
            price: entry.value,
            source: QuoteSource::StaleCache,
            provider: None,
            served_at: self.clock.now(),
        })
    }

    fn static_fallback(&self) -> Option<PriceQuote> {
        let price = self.config.static_fallback_price?;
        warn!(%price, "All price feeds failed, using static fallback price");
        Some(PriceQuote {
            price,
            source: QuoteSource::StaticFallback,
            provider: None,
            served_at: self.clock.now(),
        })
    }

    fn live_quote(&self, fetched: FetchedPrice) -> PriceQuote {
        PriceQuote {
            price: fetched.price,
            source: QuoteSource::LiveFetch,
            provider: Some(fetched.provider),
            served_at: self.clock.now(),
        }
    }

    fn cache_ref(&self) -> RwLockReadGuard<'_, PriceCache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn cache_mut(&self) -> RwLockWriteGuard<'_, PriceCache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for OracleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleService")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("fetcher", &self.fetcher)
            .finish_non_exhaustive()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

/// Builder for [`OracleService`]
pub struct OracleServiceBuilder {
    config: OracleConfig,
    client: Option<Arc<dyn HttpClient>>,
    clock: Option<Arc<dyn Clock>>,
    registry: Option<FeedRegistry>,
}

impl OracleServiceBuilder {
    /// Use this HTTP client instead of reqwest
    pub fn client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Use this clock instead of the system clock
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use this registry instead of the configured feeds
    pub fn registry(mut self, registry: FeedRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Validate the configuration and build the service
    pub fn build(self) -> Result<OracleService> {
        self.config.validate()?;

        let registry = match self.registry {
            Some(registry) => registry,
            None => self.config.registry()?,
        };
        let client: Arc<dyn HttpClient> = match self.client {
            Some(client) => client,
            None => Arc::new(ReqwestClient::new(&self.config.http)?),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let fetcher = FeedFetcher::new(client, self.config.http.timeout());
        let cache = PriceCache::new(self.config.cache_ttl());

        info!(
            feeds = registry.len(),
            ttl_ms = self.config.cache_ttl_ms,
            static_fallback = self.config.static_fallback_price.is_some(),
            "Price oracle initialized"
        );

        Ok(OracleService {
            config: self.config,
            registry,
            fetcher,
            clock,
            cache: RwLock::new(cache),
            fetch_generation: AtomicU64::new(0),
            invalidation_epoch: AtomicU64::new(0),
            in_flight: Mutex::new(None),
            counters: Counters::default(),
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
