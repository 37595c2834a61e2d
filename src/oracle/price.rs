//! Price value type.
//!
//! A [`Price`] is USD per one unit of the reference asset. Only positive
//! values can be constructed, so anything holding a `Price` never carries a
//! zero, negative or non-numeric quote.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// A validated, strictly positive USD price
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Create a price, rejecting zero and negative values
    pub fn new(value: Decimal) -> Result<Self> {
        if value <= Decimal::ZERO {
            return Err(Error::InvalidPrice(format!("{} is not positive", value)));
        }
        Ok(Self(value.normalize()))
    }

    /// Create a price from a float, rejecting NaN and infinities
    pub fn from_f64(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(Error::InvalidPrice(format!("{} is not finite", value)));
        }
        let decimal = Decimal::from_f64(value)
            .ok_or_else(|| Error::InvalidPrice(format!("{} is out of range", value)))?;
        Self::new(decimal)
    }

    /// Underlying decimal value
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Lossy float view, for display and metrics
    pub fn as_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or_default()
    }

    /// Format as dollars with two decimals
    pub fn format_usd(&self) -> String {
        format!("${:.2}", self.0)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let value = Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map_err(|e| Error::InvalidPrice(format!("{:?} is not a number: {}", s, e)))?;
        Self::new(value)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = Error;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = <Decimal as Deserialize<'de>>::deserialize(deserializer)?;
        Price::new(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_rejects_non_positive() {
        assert!(Price::new(dec!(0)).is_err());
        assert!(Price::new(dec!(-1.5)).is_err());
        assert!(Price::new(dec!(0.0001)).is_ok());
    }

    #[test]
    fn test_from_f64_rejects_non_finite() {
        assert!(Price::from_f64(f64::NAN).is_err());
        assert!(Price::from_f64(f64::INFINITY).is_err());
        assert!(Price::from_f64(-0.0).is_err());
        assert_eq!(Price::from_f64(2500.5).unwrap().value(), dec!(2500.5));
    }

    #[test]
    fn test_parse_string_forms() {
        assert_eq!("3521.47".parse::<Price>().unwrap().value(), dec!(3521.47));
        assert_eq!(" 42 ".parse::<Price>().unwrap().value(), dec!(42));
        assert_eq!("2.5e3".parse::<Price>().unwrap().value(), dec!(2500));
        assert!("NaN".parse::<Price>().is_err());
        assert!("".parse::<Price>().is_err());
        assert!("-3".parse::<Price>().is_err());
    }

    #[test]
    fn test_format_usd() {
        let price = Price::new(dec!(2500)).unwrap();
        assert_eq!(price.format_usd(), "$2500.00");
    }

    #[test]
    fn test_deserialize_validates() {
        let price: Price = serde_json::from_str("2500.0").unwrap();
        assert_eq!(price.value(), dec!(2500));
        assert!(serde_json::from_str::<Price>("0").is_err());
        assert!(serde_json::from_str::<Price>("-10").is_err());
    }

    proptest! {
        #[test]
        fn prop_non_positive_rejected(mantissa in i64::MIN..=0i64, scale in 0u32..=10) {
            let value = Decimal::new(mantissa, scale);
            prop_assert!(Price::new(value).is_err());
            prop_assert!(value.to_string().parse::<Price>().is_err());
        }

        #[test]
        fn prop_positive_display_parse_roundtrip(mantissa in 1i64..=i64::MAX, scale in 0u32..=10) {
            let price = Price::new(Decimal::new(mantissa, scale)).unwrap();
            let parsed: Price = price.to_string().parse().unwrap();
            prop_assert_eq!(parsed, price);
        }
    }
}
