//! Hedge command implementation

use crate::account::load_accounts;
use crate::config::{Config, HedgeConfig};
use crate::execution::{run_batch, ExecutionEngine, LiveConnector};
use crate::market::GammaClient;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug)]
pub struct HedgeArgs {
    /// Hedge strategy file (JSON)
    #[arg(short, long, default_value = "strategy.json")]
    pub strategy: PathBuf,

    /// Seconds to wait for fills after placing both legs
    #[arg(long, default_value_t = 3)]
    pub fill_wait_secs: u64,

    /// Print per-pair results as JSON when done
    #[arg(long)]
    pub json: bool,
}

impl HedgeArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let strategy = HedgeConfig::load(&self.strategy)?;
        let accounts = load_accounts(&strategy.accounts_file)?;
        tracing::info!(
            strategy = %self.strategy.display(),
            accounts_file = %strategy.accounts_file.display(),
            pairs = accounts.len(),
            markets = strategy.market_urls.len(),
            max_trade_amount = %strategy.max_trade_amount,
            min_spread_ticks = strategy.min_spread_ticks,
            "Hedge batch loaded"
        );
        if config.builder.is_none() {
            tracing::warn!("No [builder] credentials; missing approvals cannot be submitted");
        }

        let mut params = strategy.params();
        params.fill_wait = Duration::from_secs(self.fill_wait_secs);

        let gamma = Arc::new(GammaClient::new(config.gamma_config())?);
        let engine = ExecutionEngine::new(params, gamma);
        let connector = LiveConnector::new(config.clob_config(), config.relayer_config());

        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping");
                on_signal.cancel();
            }
        });

        let summary = run_batch(
            &engine,
            &connector,
            &accounts,
            &strategy.market_urls,
            &cancel,
        )
        .await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summary.results)?);
        }
        Ok(())
    }
}
