//! Exchange REST payloads

use crate::signing::SignedOrder;
use crate::ws::Level;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Exchange REST base URL
pub const CLOB_API_URL: &str = "https://clob.polymarket.com";

/// Time-in-force for a posted order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Good till cancelled
    #[default]
    Gtc,
    /// Fill or kill
    Fok,
    /// Good till date
    Gtd,
    /// Fill and kill
    Fak,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Gtc => "GTC",
            OrderType::Fok => "FOK",
            OrderType::Gtd => "GTD",
            OrderType::Fak => "FAK",
        }
    }
}

/// `GET /book` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookSummary {
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub bids: Vec<Level>,
    #[serde(default)]
    pub asks: Vec<Level>,
    #[serde(default)]
    pub min_order_size: String,
    #[serde(default)]
    pub tick_size: String,
    #[serde(default)]
    pub neg_risk: bool,
    #[serde(default)]
    pub hash: String,
}

fn prices(levels: &[Level]) -> impl Iterator<Item = Decimal> + '_ {
    levels
        .iter()
        .filter_map(|l| Decimal::from_str(l.price.trim()).ok())
}

impl BookSummary {
    /// Highest bid price, regardless of level order in the payload
    pub fn best_bid(&self) -> Option<Decimal> {
        prices(&self.bids).max()
    }

    /// Lowest ask price
    pub fn best_ask(&self) -> Option<Decimal> {
        prices(&self.asks).min()
    }

    /// Tick size advertised with the book, if it parses and is positive
    pub fn tick(&self) -> Option<Decimal> {
        Decimal::from_str(self.tick_size.trim())
            .ok()
            .filter(|t| t.is_sign_positive() && !t.is_zero())
    }
}

/// `POST /order` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, rename = "errorMsg")]
    pub error_msg: String,
    #[serde(default, rename = "orderID")]
    pub order_id: String,
    #[serde(default, rename = "transactionsHashes")]
    pub transactions_hashes: Vec<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "takingAmount")]
    pub taking_amount: String,
    #[serde(default, rename = "makingAmount")]
    pub making_amount: String,
}

/// `GET /data/order/{id}` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenOrder {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub maker_address: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub original_size: String,
    #[serde(default)]
    pub size_matched: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub associate_trades: Vec<String>,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub created_at: i64,
    #[serde(default)]
    pub expiration: String,
    #[serde(default)]
    pub order_type: String,
}

impl OpenOrder {
    /// Matched size; unparsable or missing counts as nothing filled
    pub fn filled(&self) -> Decimal {
        Decimal::from_str(self.size_matched.trim()).unwrap_or(Decimal::ZERO)
    }
}

/// `DELETE /orders` response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelResponse {
    #[serde(default)]
    pub canceled: Vec<String>,
    #[serde(default)]
    pub not_canceled: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TickSizeResponse {
    pub minimum_tick_size: Decimal,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NegRiskResponse {
    pub neg_risk: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct PostOrderRequest<'a> {
    pub order: &'a SignedOrder,
    pub owner: &'a str,
    #[serde(rename = "orderType")]
    pub order_type: OrderType,
}

#[derive(Debug, Serialize)]
pub(crate) struct CancelRequest<'a> {
    pub ids: &'a [String],
}
