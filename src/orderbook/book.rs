//! Order book state management

use super::PriceLevel;
use crate::signing::Side;
use crate::ws::Level;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;

/// L2 aggregated order book for a token
///
/// Both sides are ordered by price, so best bid/ask are the map ends.
/// Zero-size levels are never stored. Prices and sizes keep the scale they
/// arrived with (`"0.50"` stays `0.50`).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBook {
    /// Token identifier
    pub token_id: String,
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

fn parse_level(price: &str, size: &str) -> Option<(Decimal, Decimal)> {
    let price = Decimal::from_str(price.trim()).ok()?;
    let size = Decimal::from_str(size.trim()).ok()?;
    Some((price, size))
}

fn load_side(levels: &[Level]) -> BTreeMap<Decimal, Decimal> {
    levels
        .iter()
        .filter_map(|level| {
            let parsed = parse_level(&level.price, &level.size);
            if parsed.is_none() {
                tracing::debug!(price = %level.price, size = %level.size, "Skipping unparsable level");
            }
            parsed
        })
        .filter(|(_, size)| !size.is_zero())
        .collect()
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new(token_id: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Replace both sides wholesale
    pub fn apply_snapshot(&mut self, bids: &[Level], asks: &[Level]) {
        self.bids = load_side(bids);
        self.asks = load_side(asks);
        self.updated_at = Utc::now();
    }

    /// Upsert or delete one level; BUY touches bids, SELL touches asks
    ///
    /// Returns `false` when the level could not be parsed.
    pub fn apply_delta(&mut self, side: Side, price: &str, size: &str) -> bool {
        let Some((price, size)) = parse_level(price, size) else {
            return false;
        };
        let levels = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        if size.is_zero() {
            levels.remove(&price);
        } else {
            levels.insert(price, size);
        }
        self.updated_at = Utc::now();
        true
    }

    /// Highest bid
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids
            .last_key_value()
            .map(|(&price, &size)| PriceLevel { price, size })
    }

    /// Lowest ask
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks
            .first_key_value()
            .map(|(&price, &size)| PriceLevel { price, size })
    }

    /// Get mid price
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid.price + ask.price) / Decimal::TWO),
            _ => None,
        }
    }

    /// Get spread
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Bid levels, best (highest) first
    pub fn bids(&self) -> impl Iterator<Item = PriceLevel> + '_ {
        self.bids
            .iter()
            .rev()
            .map(|(&price, &size)| PriceLevel { price, size })
    }

    /// Ask levels, best (lowest) first
    pub fn asks(&self) -> impl Iterator<Item = PriceLevel> + '_ {
        self.asks
            .iter()
            .map(|(&price, &size)| PriceLevel { price, size })
    }

    pub fn bid_depth(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_depth(&self) -> usize {
        self.asks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}
