//! Concurrent per-instrument book storage

use super::{OrderBook, PriceLevel};
use crate::telemetry::{self, GaugeMetric};
use crate::ws::{BookSnapshot, MarketEvent, PriceChange};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type SharedBook = Arc<RwLock<OrderBook>>;

/// Books for the instruments currently being tracked
///
/// Each book sits behind its own lock: writers on one instrument never
/// block readers on another. Events for untracked instruments are ignored.
#[derive(Debug, Default)]
pub struct OrderBookStore {
    books: RwLock<HashMap<String, SharedBook>>,
}

impl OrderBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking instruments with empty books (existing books are kept)
    pub async fn track(&self, token_ids: &[String]) {
        let mut books = self.books.write().await;
        for id in token_ids {
            books
                .entry(id.clone())
                .or_insert_with(|| Arc::new(RwLock::new(OrderBook::new(id.clone()))));
        }
        telemetry::set_gauge(GaugeMetric::TrackedBooks, books.len() as f64);
    }

    /// Drop books not in `token_ids`
    pub async fn retain(&self, token_ids: &[String]) {
        let mut books = self.books.write().await;
        books.retain(|id, _| token_ids.contains(id));
        telemetry::set_gauge(GaugeMetric::TrackedBooks, books.len() as f64);
    }

    /// Discard everything and track `token_ids` with fresh books
    pub async fn reset(&self, token_ids: &[String]) {
        let mut books = self.books.write().await;
        books.clear();
        for id in token_ids {
            books.insert(id.clone(), Arc::new(RwLock::new(OrderBook::new(id.clone()))));
        }
        telemetry::set_gauge(GaugeMetric::TrackedBooks, books.len() as f64);
    }

    async fn book(&self, token_id: &str) -> Option<SharedBook> {
        self.books.read().await.get(token_id).cloned()
    }

    /// Replace a tracked book with a snapshot
    pub async fn apply_snapshot(&self, snapshot: &BookSnapshot) -> bool {
        let Some(book) = self.book(&snapshot.asset_id).await else {
            return false;
        };
        let mut book = book.write().await;
        book.apply_snapshot(&snapshot.bids, &snapshot.asks);
        tracing::debug!(
            token_id = %snapshot.asset_id,
            bid_count = book.bid_depth(),
            ask_count = book.ask_depth(),
            "Applied book snapshot"
        );
        true
    }

    /// Apply one level change to a tracked book
    pub async fn apply_delta(&self, change: &PriceChange) -> bool {
        let Some(book) = self.book(&change.asset_id).await else {
            return false;
        };
        let applied = book
            .write()
            .await
            .apply_delta(change.side, &change.price, &change.size);
        if !applied {
            tracing::debug!(
                token_id = %change.asset_id,
                price = %change.price,
                size = %change.size,
                "Skipping unparsable price change"
            );
        }
        applied
    }

    /// Route a market event; returns whether a book changed
    pub async fn apply_event(&self, event: &MarketEvent) -> bool {
        match event {
            MarketEvent::Book(snapshot) => self.apply_snapshot(snapshot).await,
            MarketEvent::PriceChange(change) => self.apply_delta(change).await,
            MarketEvent::LastTradePrice(_) | MarketEvent::TickSizeChange(_) => false,
        }
    }

    pub async fn best_bid(&self, token_id: &str) -> Option<PriceLevel> {
        self.book(token_id).await?.read().await.best_bid()
    }

    pub async fn best_ask(&self, token_id: &str) -> Option<PriceLevel> {
        self.book(token_id).await?.read().await.best_ask()
    }

    /// Copy of a tracked book
    pub async fn snapshot(&self, token_id: &str) -> Option<OrderBook> {
        Some(self.book(token_id).await?.read().await.clone())
    }

    pub async fn is_tracked(&self, token_id: &str) -> bool {
        self.books.read().await.contains_key(token_id)
    }

    pub async fn tracked(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.books.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.books.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.books.read().await.is_empty()
    }
}
