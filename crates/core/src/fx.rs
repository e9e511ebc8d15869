//! Currency conversion into the organization's base currency.
//!
//! Rates carry at least six decimal places so rounding error does not
//! compound across many small postings; base amounts are rounded per line,
//! half-to-even, at the base currency's scale.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};
use crate::money::{Currency, Money};

/// Minimum scale carried by an fx rate.
pub const FX_RATE_SCALE: u32 = 6;

/// Exchange rate from a transaction currency to the base currency.
///
/// Always strictly positive; construction rejects zero and negative rates,
/// and deserialization funnels through the same check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct FxRate(Decimal);

impl TryFrom<Decimal> for FxRate {
    type Error = LedgerError;

    fn try_from(rate: Decimal) -> Result<Self, Self::Error> {
        Self::new(rate)
    }
}

impl From<FxRate> for Decimal {
    fn from(rate: FxRate) -> Self {
        rate.0
    }
}

impl FxRate {
    pub fn new(rate: Decimal) -> LedgerResult<Self> {
        if rate <= Decimal::ZERO {
            return Err(LedgerError::InvalidRate(rate));
        }
        let mut rate = rate;
        if rate.scale() < FX_RATE_SCALE {
            rate.rescale(FX_RATE_SCALE);
        }
        Ok(Self(rate))
    }

    /// Rate of exactly 1, used for base-currency entries.
    pub fn unity() -> Self {
        let mut one = Decimal::ONE;
        one.rescale(FX_RATE_SCALE);
        Self(one)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_unity(&self) -> bool {
        self.0 == Decimal::ONE
    }
}

impl core::fmt::Display for FxRate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Projects transaction-currency amounts into the base currency.
///
/// This is the only sanctioned path between currencies; `Money` arithmetic
/// itself refuses cross-currency combination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyConverter {
    base: Currency,
}

impl CurrencyConverter {
    pub fn new(base: Currency) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Currency {
        &self.base
    }

    /// Convert `money` at `rate`, rounding half-to-even at the base scale.
    pub fn to_base(&self, money: &Money, rate: FxRate) -> LedgerResult<Money> {
        let product = money
            .amount()
            .checked_mul(rate.value())
            .ok_or_else(|| LedgerError::validation("fx conversion overflow"))?;
        Ok(Money::new(product, self.base.clone()).rounded())
    }
}
