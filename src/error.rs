//! Error types for the price oracle.
//!
//! Provider-level failures ([`ProviderError`]) never leave the fetcher on
//! their own; they are collected into [`ProviderFailure`] lists carried by the
//! aggregate oracle errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for oracle operations
pub type Result<T> = std::result::Result<T, Error>;

// ═══════════════════════════════════════════════════════════════════════════════
// PROVIDER ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Failure of a single quote provider during one fetch attempt
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProviderError {
    /// Transport-level failure (DNS, TLS, connection reset, ...)
    #[error("request failed: {0}")]
    Request(String),

    /// No response within the per-provider timeout
    #[error("timed out after {after_ms}ms")]
    Timeout {
        /// Timeout that elapsed, in milliseconds
        after_ms: u64,
    },

    /// Non-success HTTP status
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    /// Body was not the JSON document we expected
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The configured field path does not exist in the response
    #[error("missing field `{0}`")]
    MissingField(String),

    /// A value was extracted but is not a positive price
    #[error("invalid price: {0}")]
    InvalidPrice(String),
}

/// A provider error tagged with the provider that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    /// Feed name as registered
    pub provider: String,
    /// What went wrong
    pub error: ProviderError,
}

impl ProviderFailure {
    /// Create a new provider failure
    pub fn new(provider: impl Into<String>, error: ProviderError) -> Self {
        Self {
            provider: provider.into(),
            error,
        }
    }
}

impl std::fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

fn join_failures(failures: &[ProviderFailure]) -> String {
    if failures.is_empty() {
        return "no feeds configured".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Main error type for the price oracle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Oracle Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Every configured feed failed in one fetch pass
    #[error("All price feeds failed: {}", join_failures(.failures))]
    AllFeedsFailed {
        /// Per-provider reasons, in attempt order
        failures: Vec<ProviderFailure>,
    },

    /// No live price, no cached price and no static fallback
    #[error("Price oracle unavailable: {}", join_failures(.failures))]
    OracleUnavailable {
        /// Per-provider reasons from the last fetch pass
        failures: Vec<ProviderFailure>,
    },

    /// Value is not a positive finite price
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    // ═══════════════════════════════════════════════════════════════════
    // Configuration Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Configuration could not be read or written
    #[error("Configuration error: {0}")]
    Config(String),

    // ═══════════════════════════════════════════════════════════════════
    // Conversion Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Amount to convert is zero, negative or rounds to nothing
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Internal error (should not happen in production)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if the caller may retry later and expect a different answer
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::AllFeedsFailed { .. } | Error::OracleUnavailable { .. }
        )
    }

    /// Returns true if this is a critical error requiring immediate attention
    pub fn is_critical(&self) -> bool {
        matches!(self, Error::Internal(_) | Error::Overflow { .. })
    }

    /// Provider failures carried by the error, if any
    pub fn provider_failures(&self) -> &[ProviderFailure] {
        match self {
            Error::AllFeedsFailed { failures } | Error::OracleUnavailable { failures } => failures,
            _ => &[],
        }
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Oracle errors: 3xxx
            Error::AllFeedsFailed { .. } => 3001,
            Error::OracleUnavailable { .. } => 3002,
            Error::InvalidPrice(_) => 3003,

            // Configuration errors: 5xxx
            Error::InvalidParameter { .. } => 5001,
            Error::Config(_) => 5002,

            // Conversion errors: 6xxx
            Error::InvalidAmount(_) => 6001,
            Error::Overflow { .. } => 6002,

            // Internal errors: 9xxx
            Error::Internal(_) => 9001,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let codes = vec![
            Error::AllFeedsFailed { failures: vec![] }.code(),
            Error::OracleUnavailable { failures: vec![] }.code(),
            Error::InvalidPrice("".into()).code(),
            Error::InvalidParameter { name: "".into(), reason: "".into() }.code(),
            Error::Config("".into()).code(),
            Error::InvalidAmount("".into()).code(),
            Error::Overflow { operation: "".into() }.code(),
            Error::Internal("".into()).code(),
        ];

        let mut unique_codes = codes.clone();
        unique_codes.sort();
        unique_codes.dedup();

        assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    }

    #[test]
    fn test_unavailable_lists_every_provider() {
        let err = Error::OracleUnavailable {
            failures: vec![
                ProviderFailure::new("coingecko", ProviderError::Timeout { after_ms: 5000 }),
                ProviderFailure::new("binance", ProviderError::HttpStatus(451)),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("coingecko: timed out after 5000ms"));
        assert!(msg.contains("binance: unexpected HTTP status 451"));
        assert_eq!(err.provider_failures().len(), 2);
    }

    #[test]
    fn test_empty_failure_list_display() {
        let err = Error::AllFeedsFailed { failures: vec![] };
        assert!(err.to_string().contains("no feeds configured"));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::OracleUnavailable { failures: vec![] }.is_recoverable());
        assert!(!Error::Internal("test".into()).is_recoverable());
    }

    #[test]
    fn test_is_critical() {
        assert!(Error::Internal("test".into()).is_critical());
        assert!(!Error::InvalidAmount("0".into()).is_critical());
    }

    #[test]
    fn test_provider_error_serializes_tagged() {
        let json = serde_json::to_value(ProviderError::HttpStatus(503)).unwrap();
        assert_eq!(json["kind"], "http_status");
        assert_eq!(json["detail"], 503);
    }
}
