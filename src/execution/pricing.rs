//! Hedge pricing: quote checks, paired prices and trade size

use crate::clob::BookSummary;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

/// Tick used when a book does not advertise one
pub const DEFAULT_TICK: Decimal = dec!(0.01);

/// Top of book for the YES instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    /// Best bid, zero when the bid side is empty
    pub bid: Decimal,
    /// Best ask, one when the ask side is empty
    pub ask: Decimal,
}

impl Quote {
    pub fn new(bid: Option<Decimal>, ask: Option<Decimal>) -> Self {
        Self {
            bid: bid.unwrap_or(Decimal::ZERO),
            ask: ask.unwrap_or(Decimal::ONE),
        }
    }

    pub fn from_book(book: &BookSummary) -> Self {
        Self::new(book.best_bid(), book.best_ask())
    }

    /// A missing side leaves nothing to price against
    pub fn is_incomplete(&self) -> bool {
        self.bid.is_zero() || self.ask == Decimal::ONE
    }

    /// Whole ticks between bid and ask
    pub fn spread_ticks(&self, tick: Decimal) -> i64 {
        if tick <= Decimal::ZERO {
            return 0;
        }
        ((self.ask - self.bid) / tick)
            .floor()
            .to_i64()
            .unwrap_or(0)
    }

    pub fn meets_spread(&self, tick: Decimal, min_ticks: u32) -> bool {
        !self.is_incomplete() && self.spread_ticks(tick) >= i64::from(min_ticks)
    }
}

/// Round down to a multiple of `tick`
pub fn floor_to_tick(value: Decimal, tick: Decimal) -> Decimal {
    if tick <= Decimal::ZERO {
        return value;
    }
    ((value / tick).floor() * tick).normalize()
}

/// Paired prices that sum to exactly one
///
/// The YES leg improves the best bid by one tick; the NO leg takes the
/// complement at 4 decimals.
pub fn hedge_prices(quote: &Quote, tick: Decimal) -> (Decimal, Decimal) {
    let yes = floor_to_tick(quote.bid + tick, tick);
    let no = (Decimal::ONE - yes)
        .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
        .normalize();
    (yes, no)
}

/// Common size both legs can afford, capped by `max`, aligned down to tick
///
/// Returns `None` when the result is smaller than one tick.
pub fn trade_amount(
    max: Decimal,
    balance_a: Decimal,
    balance_b: Decimal,
    yes_price: Decimal,
    no_price: Decimal,
    tick: Decimal,
) -> Option<Decimal> {
    if yes_price <= Decimal::ZERO || no_price <= Decimal::ZERO {
        return None;
    }
    let affordable = max.min(balance_a / yes_price).min(balance_b / no_price);
    let amount = floor_to_tick(affordable, tick);
    (amount >= tick).then_some(amount)
}
