//! Execution types

use crate::clob::Exchange;
use crate::relayer::Wallet;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Which account of a pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Leg {
    /// Buys the YES/UP instrument
    A,
    /// Buys the NO/DOWN instrument
    B,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Leg::A => f.write_str("A"),
            Leg::B => f.write_str("B"),
        }
    }
}

/// Collaborators for one leg, ready to trade
#[derive(Clone)]
pub struct HedgeLeg {
    pub exchange: Arc<dyn Exchange>,
    pub wallet: Arc<dyn Wallet>,
}

/// Tunables for a hedge run
#[derive(Debug, Clone)]
pub struct HedgeParams {
    /// Upper bound on the per-leg size
    pub max_trade_amount: Decimal,
    pub min_spread_ticks: u32,
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Wait between placing both legs and polling fills
    pub fill_wait: Duration,
}

impl Default for HedgeParams {
    fn default() -> Self {
        Self {
            max_trade_amount: Decimal::TEN,
            min_spread_ticks: 2,
            max_retries: 10,
            retry_delay: Duration::from_secs(3),
            fill_wait: Duration::from_secs(3),
        }
    }
}

/// An order that reached the exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedOrder {
    pub leg: Leg,
    pub order_id: String,
    pub token_id: String,
    pub price: Decimal,
    pub size: Decimal,
    pub attempt: u32,
}

/// Terminal record of one pair run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionResult {
    pub index: u32,
    pub success: bool,
    pub filled_a: Decimal,
    pub filled_b: Decimal,
    pub error: Option<String>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    /// Slug of the market that was traded
    pub market: Option<String>,
    pub attempts: u32,
    /// Every order placed, including one-sided placements
    pub orders: Vec<PlacedOrder>,
}

impl ExecutionResult {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    /// Whether any attempt left only one leg on the book
    pub fn has_partial_placement(&self) -> bool {
        let mut attempts: Vec<u32> = self.orders.iter().map(|o| o.attempt).collect();
        attempts.sort_unstable();
        attempts.dedup();
        attempts.iter().any(|&attempt| {
            self.orders
                .iter()
                .filter(|o| o.attempt == attempt)
                .count()
                == 1
        })
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Outcome of running every pair in a batch
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub results: Vec<ExecutionResult>,
    pub elapsed: Duration,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.results.iter().filter(|r| !r.success)
    }
}
