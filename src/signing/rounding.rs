//! Tick-size rounding profiles and maker/taker amount derivation

use super::contracts::TOKEN_DECIMALS;
use super::Side;
use crate::error::{Error, Result};
use alloy::primitives::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum price increment class of a market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TickSize {
    #[serde(rename = "0.1")]
    Tenth,
    #[default]
    #[serde(rename = "0.01")]
    Hundredth,
    #[serde(rename = "0.001")]
    Thousandth,
    #[serde(rename = "0.0001")]
    TenThousandth,
}

impl TickSize {
    /// Parse the exchange's string form; unknown values fall back to 0.01
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "0.1" => TickSize::Tenth,
            "0.001" => TickSize::Thousandth,
            "0.0001" => TickSize::TenThousandth,
            _ => TickSize::Hundredth,
        }
    }

    /// Classify a decimal tick (e.g. from an order book summary)
    pub fn from_decimal(tick: Decimal) -> Self {
        Self::parse(&tick.normalize().to_string())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TickSize::Tenth => "0.1",
            TickSize::Hundredth => "0.01",
            TickSize::Thousandth => "0.001",
            TickSize::TenThousandth => "0.0001",
        }
    }

    pub fn as_decimal(&self) -> Decimal {
        match self {
            TickSize::Tenth => Decimal::new(1, 1),
            TickSize::Hundredth => Decimal::new(1, 2),
            TickSize::Thousandth => Decimal::new(1, 3),
            TickSize::TenThousandth => Decimal::new(1, 4),
        }
    }

    /// Decimal-place limits the exchange enforces for this tick class
    pub fn round_config(&self) -> RoundConfig {
        match self {
            TickSize::Tenth => RoundConfig::new(1, 2, 3),
            TickSize::Hundredth => RoundConfig::new(2, 2, 4),
            TickSize::Thousandth => RoundConfig::new(3, 2, 5),
            TickSize::TenThousandth => RoundConfig::new(4, 2, 6),
        }
    }
}

impl fmt::Display for TickSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decimal-place limits for price, size and notional amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundConfig {
    pub price: u32,
    pub size: u32,
    pub amount: u32,
}

impl RoundConfig {
    pub const fn new(price: u32, size: u32, amount: u32) -> Self {
        Self {
            price,
            size,
            amount,
        }
    }
}

/// Maker and taker amounts in token base units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderAmounts {
    pub maker: U256,
    pub taker: U256,
}

/// Round half away from zero (half-up for prices)
pub fn round_normal(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Truncate toward zero
pub fn round_down(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
}

/// Truncate at `dp` places then add one unit in the last place
pub fn round_up(value: Decimal, dp: u32) -> Decimal {
    round_down(value, dp) + Decimal::new(1, dp)
}

/// Number of significant decimal places
pub fn decimal_places(value: Decimal) -> u32 {
    value.normalize().scale()
}

/// Clamp a derived amount to `limit` decimal places.
///
/// The round-up attempt at `limit + 4` places always runs first; only if the
/// result is still too precise does it fall back to rounding down.
fn fit_amount(raw: Decimal, limit: u32) -> Decimal {
    if decimal_places(raw) <= limit {
        return raw;
    }
    let widened = round_up(raw, limit + 4);
    if decimal_places(widened) > limit {
        round_down(widened, limit)
    } else {
        widened
    }
}

/// Scale to 10^6 base units, dropping anything past six places
pub fn to_units(value: Decimal) -> Result<U256> {
    let scaled = (value * Decimal::from(10u64.pow(TOKEN_DECIMALS))).trunc();
    let units = scaled
        .to_u128()
        .ok_or_else(|| Error::InvalidAmount(format!("{value} is out of range")))?;
    Ok(U256::from(units))
}

fn ensure_positive(name: &str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(Error::InvalidAmount(format!(
            "{name} resolves to {value} after rounding"
        )));
    }
    Ok(())
}

/// Amounts for a limit order of `size` shares at `price`
pub fn limit_order_amounts(
    side: Side,
    size: Decimal,
    price: Decimal,
    tick: TickSize,
) -> Result<OrderAmounts> {
    let cfg = tick.round_config();
    let price = round_normal(price, cfg.price);
    ensure_positive("price", price)?;

    let shares = round_down(size, cfg.size);
    ensure_positive("size", shares)?;

    let notional = fit_amount(shares * price, cfg.amount);
    ensure_positive("amount", notional)?;

    let (maker, taker) = match side {
        Side::Buy => (notional, shares),
        Side::Sell => (shares, notional),
    };
    Ok(OrderAmounts {
        maker: to_units(maker)?,
        taker: to_units(taker)?,
    })
}

/// Amounts for a market order.
///
/// A BUY spends `amount` collateral; a SELL sells `amount` shares. The
/// price is rounded down, and a zero price is treated as 1.
pub fn market_order_amounts(
    side: Side,
    amount: Decimal,
    price: Decimal,
    tick: TickSize,
) -> Result<OrderAmounts> {
    let cfg = tick.round_config();
    let price = if price.is_zero() { Decimal::ONE } else { price };
    let price = round_down(price, cfg.price);
    ensure_positive("price", price)?;

    let maker = round_down(amount, cfg.size);
    ensure_positive("amount", maker)?;

    let raw_taker = match side {
        Side::Buy => maker / price,
        Side::Sell => maker * price,
    };
    let taker = fit_amount(raw_taker, cfg.amount);
    ensure_positive("amount", taker)?;

    Ok(OrderAmounts {
        maker: to_units(maker)?,
        taker: to_units(taker)?,
    })
}
