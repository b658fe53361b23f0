//! Streaming session for the exchange's WebSocket feed
//!
//! Provides a session with a text heartbeat, linear-backoff reconnection,
//! dynamic market subscriptions and typed event decoding.

mod dedup;
mod messages;
mod session;
mod types;

pub use dedup::TradeDedup;
pub use messages::{
    parse_market_frame, parse_user_frame, BookSnapshot, ControlRequest, LastTradePrice, Level,
    MakerOrder, MarketEvent, Operation, OrderUpdate, PriceChange, Subscription, TickSizeChange,
    TradeNotification, UserEvent,
};
pub use session::{StreamEvent, StreamSession};
pub use types::{Channel, SessionState, WsConfig, WsError, DEFAULT_WS_BASE_URL};
