//! Single-entry price cache.
//!
//! The cache holds the last known good price and when it was obtained. It is
//! in one of three states:
//!
//! - `Empty`: nothing ever fetched
//! - `Fresh`: `now - fetched_at < ttl`
//! - `Stale`: a value exists but is past its TTL, or was invalidated
//!
//! Invalidation clears the timestamp only, so the value stays available as a
//! fallback until the next successful fetch overwrites it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::oracle::price::Price;
use crate::utils::clock::elapsed;

/// Freshness state of the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// No value ever stored
    Empty,
    /// Value within its TTL
    Fresh,
    /// Value retained past its TTL or after invalidation
    Stale,
}

/// The cached price and its timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Last successfully fetched price
    pub value: Price,
    /// When it was fetched; `None` after invalidation
    pub fetched_at: Option<DateTime<Utc>>,
    /// Time-to-live applied to this entry
    pub ttl: Duration,
}

impl CacheEntry {
    /// Age of the entry, if it still has a timestamp
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.fetched_at.map(|at| elapsed(at, now))
    }

    /// Check if the entry is within its TTL
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.age(now).is_some_and(|age| age < self.ttl)
    }
}

/// Single-entry TTL cache
#[derive(Debug, Clone)]
pub struct PriceCache {
    entry: Option<CacheEntry>,
    ttl: Duration,
}

impl PriceCache {
    /// Create an empty cache
    pub fn new(ttl: Duration) -> Self {
        Self { entry: None, ttl }
    }

    /// Configured TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current entry, fresh or stale
    pub fn get(&self) -> Option<CacheEntry> {
        self.entry
    }

    /// True iff an entry exists and is within its TTL
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.entry.is_some_and(|entry| entry.is_fresh(now))
    }

    /// Current state at `now`
    pub fn state(&self, now: DateTime<Utc>) -> CacheState {
        match self.entry {
            None => CacheState::Empty,
            Some(entry) if entry.is_fresh(now) => CacheState::Fresh,
            Some(_) => CacheState::Stale,
        }
    }

    /// Store a freshly fetched value
    pub fn put(&mut self, value: Price, now: DateTime<Utc>) {
        self.entry = Some(CacheEntry {
            value,
            fetched_at: Some(now),
            ttl: self.ttl,
        });
    }

    /// Drop the timestamp, keeping the value as a fallback
    pub fn invalidate(&mut self) {
        if let Some(entry) = self.entry.as_mut() {
            entry.fetched_at = None;
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
