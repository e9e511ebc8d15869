//! Fixed-point money: a decimal amount bound to a currency.
//!
//! All monetary arithmetic goes through `Money`; combining amounts of
//! different currencies is a typed error, never an implicit conversion.
//! Rounding is explicit and uses round-half-to-even at the currency's scale.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// ISO-style currency: uppercase code plus the number of decimal places of
/// its minor unit (2 for most currencies).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCurrency")]
pub struct Currency {
    code: String,
    decimals: u32,
}

/// Unvalidated wire form; deserialization funnels through `Currency::new`.
#[derive(Deserialize)]
struct RawCurrency {
    code: String,
    decimals: u32,
}

impl TryFrom<RawCurrency> for Currency {
    type Error = LedgerError;

    fn try_from(raw: RawCurrency) -> Result<Self, Self::Error> {
        Currency::new(raw.code, raw.decimals)
    }
}

impl Currency {
    pub const MAX_DECIMALS: u32 = 6;

    pub fn new(code: impl Into<String>, decimals: u32) -> LedgerResult<Self> {
        let code: String = code.into();
        if code.is_empty() || code.len() > 8 || !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(LedgerError::validation(format!(
                "currency code must be 1..=8 alphanumeric characters, got {code:?}"
            )));
        }
        if decimals > Self::MAX_DECIMALS {
            return Err(LedgerError::validation(format!(
                "currency decimals must be <= {}, got {decimals}",
                Self::MAX_DECIMALS
            )));
        }
        Ok(Self {
            code: code.to_ascii_uppercase(),
            decimals,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.code)
    }
}

/// A fixed-point decimal amount in a single currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    fn ensure_same_currency(&self, other: &Money) -> LedgerResult<()> {
        if self.currency != other.currency {
            return Err(LedgerError::CurrencyMismatch {
                left: self.currency.code().to_string(),
                right: other.currency.code().to_string(),
            });
        }
        Ok(())
    }

    /// Add two amounts of the same currency; cross-currency is an error.
    pub fn checked_add(&self, other: &Money) -> LedgerResult<Money> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| LedgerError::validation("money addition overflow"))?;
        Ok(Money::new(amount, self.currency.clone()))
    }

    /// Subtract two amounts of the same currency; cross-currency is an error.
    pub fn checked_sub(&self, other: &Money) -> LedgerResult<Money> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or_else(|| LedgerError::validation("money subtraction overflow"))?;
        Ok(Money::new(amount, self.currency.clone()))
    }

    /// Round half-to-even at the currency's scale.
    pub fn rounded(&self) -> Money {
        Money::new(
            self.amount.round_dp_with_strategy(
                self.currency.decimals(),
                RoundingStrategy::MidpointNearestEven,
            ),
            self.currency.clone(),
        )
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
