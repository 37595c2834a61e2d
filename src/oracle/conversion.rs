//! USD conversion for payment amounts.
//!
//! Turns an amount of the reference asset into a USD charge. A charge is
//! only ever produced from a [`Price`], so it can never be computed from a
//! missing, zero or negative rate, and a result that rounds to zero cents is
//! rejected.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::oracle::price::Price;
use crate::oracle::service::{PriceQuote, QuoteSource};
use crate::utils::constants::{CENTS_PER_USD, USD_DECIMALS};

/// A priced amount, ready to be charged
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsdConversion {
    /// Amount of the reference asset
    pub asset_amount: Decimal,
    /// USD per unit used for the conversion
    pub rate: Price,
    /// Exact USD amount
    pub usd_amount: Decimal,
    /// Amount rounded to whole cents
    pub usd_cents: u64,
    /// Tier that produced the rate
    pub source: QuoteSource,
}

/// Exact USD value of `asset_amount` at `price`
pub fn usd_amount(asset_amount: Decimal, price: Price) -> Result<Decimal> {
    if asset_amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(format!(
            "asset amount {} must be positive",
            asset_amount
        )));
    }
    asset_amount
        .checked_mul(price.value())
        .ok_or_else(|| Error::Overflow {
            operation: "usd_amount".into(),
        })
}

/// USD value of `asset_amount` at `price`, rounded half away from zero to cents
pub fn usd_cents(asset_amount: Decimal, price: Price) -> Result<u64> {
    let usd = usd_amount(asset_amount, price)?;
    let cents = usd
        .round_dp_with_strategy(USD_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(Decimal::from(CENTS_PER_USD))
        .and_then(|c| c.to_u64())
        .ok_or_else(|| Error::Overflow {
            operation: "usd_cents".into(),
        })?;

    if cents == 0 {
        return Err(Error::InvalidAmount(format!(
            "{} at {} is less than one cent",
            asset_amount, price
        )));
    }
    Ok(cents)
}

/// Convert using a resolved quote
pub fn convert(asset_amount: Decimal, quote: &PriceQuote) -> Result<UsdConversion> {
    let usd_amount = usd_amount(asset_amount, quote.price)?;
    let usd_cents = usd_cents(asset_amount, quote.price)?;
    Ok(UsdConversion {
        asset_amount,
        rate: quote.price,
        usd_amount,
        usd_cents,
        source: quote.source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn price(v: Decimal) -> Price {
        Price::new(v).unwrap()
    }

    #[test]
    fn test_usd_amount() {
        assert_eq!(usd_amount(dec!(0.05), price(dec!(3000))).unwrap(), dec!(150));
    }

    #[test]
    fn test_usd_cents_rounding() {
        // 0.0123 * 3521.47 = 43.3140810 -> $43.31
        assert_eq!(usd_cents(dec!(0.0123), price(dec!(3521.47))).unwrap(), 4331);
        // exactly half a cent rounds up
        assert_eq!(usd_cents(dec!(1), price(dec!(0.005))).unwrap(), 1);
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        assert!(matches!(usd_cents(dec!(0), price(dec!(3000))), Err(Error::InvalidAmount(_))));
        assert!(matches!(usd_cents(dec!(-1), price(dec!(3000))), Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn test_rejects_sub_cent_charge() {
        assert!(matches!(
            usd_cents(dec!(0.000001), price(dec!(3000))),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_convert_carries_source() {
        let quote = PriceQuote {
            price: price(dec!(2500)),
            source: QuoteSource::StaticFallback,
            provider: None,
            served_at: chrono::Utc::now(),
        };
        let conversion = convert(dec!(0.1), &quote).unwrap();
        assert_eq!(conversion.usd_cents, 25_000);
        assert_eq!(conversion.usd_amount, dec!(250));
        assert_eq!(conversion.source, QuoteSource::StaticFallback);
    }
}
