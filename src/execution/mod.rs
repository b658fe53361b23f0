//! Paired hedge execution
//!
//! Two accounts buy opposite outcomes of the same market at prices that sum
//! to one, so the pair is flat whatever the result. Each pair runs to a
//! terminal [`ExecutionResult`]; a batch runs pairs one after another.

mod engine;
pub mod pricing;
mod runner;
mod types;

pub use engine::ExecutionEngine;
pub use pricing::{floor_to_tick, hedge_prices, trade_amount, Quote, DEFAULT_TICK};
pub use runner::{run_batch, LegConnector, LiveConnector};
pub use types::{
    BatchSummary, ExecutionResult, HedgeLeg, HedgeParams, Leg, PlacedOrder,
};
