//! Wire types for the market and user channels
//!
//! Outbound requests are explicit serde structs. Inbound frames are decoded
//! by their `event_type` discriminator; the market channel may batch several
//! events in one JSON array and a `price_change` event may carry several
//! level changes.

use crate::auth::ApiCredentials;
use crate::signing::Side;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Initial subscription payload sent right after connecting
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Subscription {
    Market {
        assets_ids: Vec<String>,
    },
    User {
        auth: ApiCredentials,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        markets: Vec<String>,
    },
}

impl Subscription {
    pub fn market(assets_ids: Vec<String>) -> Self {
        Subscription::Market { assets_ids }
    }

    pub fn user(auth: ApiCredentials, markets: Vec<String>) -> Self {
        Subscription::User { auth, markets }
    }
}

/// Dynamic subscription change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Subscribe,
    Unsubscribe,
}

/// Standalone control frame adding or removing instruments
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlRequest {
    pub assets_ids: Vec<String>,
    pub operation: Operation,
}

/// One price level as sent on the wire
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Level {
    pub price: String,
    pub size: String,
}

/// Full book snapshot for one instrument
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BookSnapshot {
    pub asset_id: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub bids: Vec<Level>,
    #[serde(default)]
    pub asks: Vec<Level>,
}

/// A single level change; BUY touches bids, SELL touches asks
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceChange {
    pub asset_id: String,
    #[serde(default)]
    pub market: String,
    pub price: String,
    pub size: String,
    pub side: Side,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub best_bid: String,
    #[serde(default)]
    pub best_ask: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LastTradePrice {
    pub asset_id: String,
    #[serde(default)]
    pub market: String,
    pub price: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub fee_rate_bps: String,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TickSizeChange {
    pub asset_id: String,
    #[serde(default)]
    pub market: String,
    pub old_tick_size: String,
    pub new_tick_size: String,
    #[serde(default)]
    pub timestamp: String,
}

/// Order lifecycle update on the user channel
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OrderUpdate {
    pub id: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub asset_id: String,
    /// PLACEMENT, UPDATE or CANCELLATION
    #[serde(default, rename = "type")]
    pub update_type: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub original_size: String,
    #[serde(default)]
    pub size_matched: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub associate_trades: Vec<String>,
    #[serde(default)]
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MakerOrder {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub matched_amount: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub owner: String,
}

/// Trade notification on the user channel
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TradeNotification {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub trade_id: String,
    #[serde(default)]
    pub market: String,
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub taker_order_id: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default, rename = "matchtime")]
    pub match_time: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub maker_orders: Vec<MakerOrder>,
}

impl TradeNotification {
    /// Identity used for deduplication (`id`, falling back to `trade_id`)
    pub fn dedup_key(&self) -> Option<&str> {
        [self.id.as_str(), self.trade_id.as_str()]
            .into_iter()
            .find(|id| !id.is_empty())
    }
}

/// Decoded market-channel event
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    Book(BookSnapshot),
    PriceChange(PriceChange),
    LastTradePrice(LastTradePrice),
    TickSizeChange(TickSizeChange),
}

impl MarketEvent {
    pub fn asset_id(&self) -> &str {
        match self {
            MarketEvent::Book(e) => &e.asset_id,
            MarketEvent::PriceChange(e) => &e.asset_id,
            MarketEvent::LastTradePrice(e) => &e.asset_id,
            MarketEvent::TickSizeChange(e) => &e.asset_id,
        }
    }
}

/// Decoded user-channel event
#[derive(Debug, Clone, PartialEq)]
pub enum UserEvent {
    Order(OrderUpdate),
    Trade(TradeNotification),
}

fn objects(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.into_iter().filter(Value::is_object).collect(),
        obj @ Value::Object(_) => vec![obj],
        _ => Vec::new(),
    }
}

fn event_type(value: &Value) -> String {
    value
        .get("event_type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Decode one market-channel frame into zero or more events
///
/// A frame that is not JSON is an error; individual events that fail to
/// decode or carry an unknown `event_type` are skipped.
pub fn parse_market_frame(text: &str) -> Result<Vec<MarketEvent>, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    let mut events = Vec::new();

    for obj in objects(value) {
        match event_type(&obj).as_str() {
            "book" => push_decoded(&mut events, obj, MarketEvent::Book),
            "price_change" => {
                let market = obj
                    .get("market")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let Some(Value::Array(changes)) = obj.get("price_changes").cloned() else {
                    continue;
                };
                for change in changes {
                    match serde_json::from_value::<PriceChange>(change) {
                        Ok(mut change) => {
                            if change.market.is_empty() {
                                change.market = market.clone();
                            }
                            events.push(MarketEvent::PriceChange(change));
                        }
                        Err(e) => tracing::debug!(error = %e, "Skipping malformed price change"),
                    }
                }
            }
            "last_trade_price" => push_decoded(&mut events, obj, MarketEvent::LastTradePrice),
            "tick_size_change" => push_decoded(&mut events, obj, MarketEvent::TickSizeChange),
            other => tracing::trace!(event_type = other, "Ignoring market event"),
        }
    }

    Ok(events)
}

/// Decode one user-channel frame into zero or more events
pub fn parse_user_frame(text: &str) -> Result<Vec<UserEvent>, serde_json::Error> {
    let value: Value = serde_json::from_str(text)?;
    let mut events = Vec::new();

    for obj in objects(value) {
        match event_type(&obj).as_str() {
            "order" => push_decoded(&mut events, obj, UserEvent::Order),
            "trade" => push_decoded(&mut events, obj, UserEvent::Trade),
            other => tracing::trace!(event_type = other, "Ignoring user event"),
        }
    }

    Ok(events)
}

fn push_decoded<T, E>(out: &mut Vec<E>, value: Value, wrap: impl FnOnce(T) -> E)
where
    T: serde::de::DeserializeOwned,
{
    match serde_json::from_value::<T>(value) {
        Ok(event) => out.push(wrap(event)),
        Err(e) => tracing::debug!(error = %e, "Skipping malformed event"),
    }
}
