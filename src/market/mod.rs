//! Market discovery and round rollover
//!
//! Resolves up/down rounds through the Gamma API and keeps the order book
//! stream pointed at the live round.

mod gamma;
mod round;
mod scheduler;

pub use gamma::{
    parse_market_slug, parse_token_ids, round_from_event, GammaClient, GammaConfig, GammaEvent,
    GammaMarket, GAMMA_API_URL,
};
pub(crate) use gamma::proxy_url;
pub use round::{
    align_start, next_start, round_slug, startup_start, Instrument, Outcome, Period, Round, Symbol,
};
pub use scheduler::{RoundScheduler, SchedulerConfig, SchedulerEvent, SwitchoverFallback};

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of round metadata
#[async_trait]
pub trait RoundDirectory: Send + Sync {
    /// Resolve the round identified by `slug` starting at `start`
    ///
    /// Fails when the round has fewer than two tradable instruments.
    async fn fetch_round(&self, slug: &str, start: DateTime<Utc>) -> Result<Round>;
}

/// Resolves hedge candidates from market page URLs
#[async_trait]
pub trait MarketLookup: Send + Sync {
    async fn market_by_url(&self, market_url: &str) -> Result<GammaMarket>;
}
