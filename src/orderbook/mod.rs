//! Order book module
//!
//! Per-instrument books reconciled from the market channel

mod book;
mod store;

pub use book::OrderBook;
pub use store::OrderBookStore;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price level in the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price at this level
    pub price: Decimal,
    /// Total size available
    pub size: Decimal,
}
