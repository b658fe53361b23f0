//! Exchange REST collaborator
//!
//! Order book lookups, order placement, status and cancellation against the
//! central limit order book API.

mod client;
mod types;

pub use client::{ClobClient, ClobConfig};
pub use types::{
    BookSummary, CancelResponse, OpenOrder, OrderResponse, OrderType, CLOB_API_URL,
};

use crate::error::Result;
use crate::signing::{LimitOrderArgs, OrderOptions, TickSize};
use async_trait::async_trait;

/// Order-side operations the execution engine needs from an exchange
#[async_trait]
pub trait Exchange: Send + Sync {
    async fn order_book(&self, token_id: &str) -> Result<BookSummary>;

    async fn tick_size(&self, token_id: &str) -> Result<TickSize>;

    async fn neg_risk(&self, token_id: &str) -> Result<bool>;

    /// Sign and submit a limit order
    async fn place_limit_order(
        &self,
        args: &LimitOrderArgs,
        options: OrderOptions,
        order_type: OrderType,
    ) -> Result<OrderResponse>;

    async fn get_order(&self, order_id: &str) -> Result<OpenOrder>;

    async fn cancel_orders(&self, order_ids: &[String]) -> Result<CancelResponse>;
}
