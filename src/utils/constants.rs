//! Oracle constants and defaults.
//!
//! Every tunable default lives here so it can be audited in one place.

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default cache time-to-live in milliseconds (5 minutes)
pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;

// ═══════════════════════════════════════════════════════════════════════════════
// FETCH CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Default timeout for a single provider request in milliseconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// User agent sent to quote providers
pub const DEFAULT_USER_AGENT: &str = "price-oracle/0.1";

// ═══════════════════════════════════════════════════════════════════════════════
// ENVIRONMENT VARIABLES
// ═══════════════════════════════════════════════════════════════════════════════

/// Cache TTL override, milliseconds
pub const ENV_CACHE_TTL: &str = "ETH_PRICE_CACHE_TTL";

/// Static last-resort price in USD
pub const ENV_FALLBACK_PRICE: &str = "ETH_FALLBACK_PRICE";

/// Per-provider timeout override, milliseconds
pub const ENV_REQUEST_TIMEOUT: &str = "ETH_PRICE_FEED_TIMEOUT_MS";

// ═══════════════════════════════════════════════════════════════════════════════
// PAYMENT CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Cents per US dollar
pub const CENTS_PER_USD: u32 = 100;

/// Decimal places kept for USD amounts
pub const USD_DECIMALS: u32 = 2;
