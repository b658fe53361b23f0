//! Watch command implementation

use crate::config::Config;
use crate::market::{GammaClient, Period, RoundScheduler, SchedulerEvent, Symbol};
use crate::orderbook::OrderBookStore;
use crate::telemetry::{self, GaugeMetric};
use crate::ws::StreamEvent;
use clap::Args;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Asset symbol (btc, eth, sol, xrp); defaults to the config value
    #[arg(long)]
    pub symbol: Option<Symbol>,

    /// Round period (15m, 1h, 4h, daily); defaults to the config value
    #[arg(long)]
    pub period: Option<Period>,
}

impl WatchArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut scheduler_config = config.scheduler_config();
        if let Some(symbol) = self.symbol {
            scheduler_config.symbol = symbol;
        }
        if let Some(period) = self.period {
            scheduler_config.period = period;
        }
        tracing::info!(
            symbol = %scheduler_config.symbol,
            period = %scheduler_config.period,
            fallback = ?scheduler_config.fallback,
            "Watching rounds"
        );

        let store = Arc::new(OrderBookStore::new());
        let directory = Arc::new(GammaClient::new(config.gamma_config())?);
        let (scheduler, mut events) =
            RoundScheduler::new(scheduler_config, config.ws_config(), directory, store.clone());

        let cancel = CancellationToken::new();
        let mut task = tokio::spawn(scheduler.run(cancel.clone()));

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Interrupt received, stopping");
                    cancel.cancel();
                    break;
                }
                result = &mut task => {
                    result??;
                    return Ok(());
                }
                event = events.recv() => match event {
                    Some(event) => log_event(&store, event).await,
                    None => break,
                },
            }
        }

        task.await??;
        Ok(())
    }
}

async fn log_event(store: &OrderBookStore, event: SchedulerEvent) {
    match event {
        SchedulerEvent::Activated(round) => {
            tracing::info!(slug = %round.slug, end = %round.end, "Round active");
        }
        SchedulerEvent::PreSubscribed(round) => {
            tracing::info!(slug = %round.slug, "Next round subscribed");
        }
        SchedulerEvent::Switched { from, to } => {
            tracing::info!(from = %from, to = %to.slug, "Round switched");
        }
        SchedulerEvent::Fallback(round) => {
            tracing::warn!(slug = %round.slug, "Round switched by resubscribing");
        }
        SchedulerEvent::RoundFailed { slug, error } => {
            tracing::error!(slug = %slug, error = %error, "Round failed");
        }
        SchedulerEvent::BookUpdated { token_id } => {
            let bid = store.best_bid(&token_id).await;
            let ask = store.best_ask(&token_id).await;
            tracing::info!(
                token_id = %token_id,
                bid = ?bid.map(|l| l.price),
                ask = ?ask.map(|l| l.price),
                "Book"
            );
            telemetry::set_gauge(GaugeMetric::TrackedBooks, store.len().await as f64);
        }
        SchedulerEvent::Stream(StreamEvent::Reconnecting { attempt, delay }) => {
            tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "Stream reconnecting");
        }
        SchedulerEvent::Stream(event) => {
            tracing::debug!(?event, "Stream event");
        }
    }
}
