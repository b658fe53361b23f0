//! Leg setup and the sequential batch runner

use super::engine::ExecutionEngine;
use super::types::{BatchSummary, ExecutionResult, HedgeLeg, Leg};
use crate::account::AccountPair;
use crate::clob::{ClobClient, ClobConfig};
use crate::error::Result;
use crate::relayer::{RelayerClient, RelayerConfig, Wallet};
use crate::signing::{OrderSigner, SignatureType};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Builds ready-to-trade collaborators for one leg of a pair
#[async_trait]
pub trait LegConnector: Send + Sync {
    async fn connect(&self, pair: &AccountPair, leg: Leg) -> Result<HedgeLeg>;
}

/// Connects legs to the live exchange and relayer
///
/// Each leg trades from its Safe: the relayer client derives the Safe, a
/// key-only exchange client mints API credentials, and the trading client
/// signs as a Gnosis Safe owner with the Safe as funder.
#[derive(Debug, Clone)]
pub struct LiveConnector {
    pub clob: ClobConfig,
    pub relayer: RelayerConfig,
}

impl LiveConnector {
    pub fn new(clob: ClobConfig, relayer: RelayerConfig) -> Self {
        Self { clob, relayer }
    }
}

#[async_trait]
impl LegConnector for LiveConnector {
    async fn connect(&self, pair: &AccountPair, leg: Leg) -> Result<HedgeLeg> {
        let (key, proxy) = match leg {
            Leg::A => (&pair.private_key_a, &pair.proxy_a),
            Leg::B => (&pair.private_key_b, &pair.proxy_b),
        };

        let relayer = RelayerClient::new(
            RelayerConfig {
                proxy: proxy.clone(),
                ..self.relayer.clone()
            },
            key,
        )?;
        let safe = relayer.safe_address();
        tracing::info!(pair = pair.index, %leg, owner = %relayer.owner(), %safe, "Leg wallet");

        let clob_config = ClobConfig {
            proxy: proxy.clone(),
            ..self.clob.clone()
        };
        let bootstrap = ClobClient::new(
            clob_config.clone(),
            OrderSigner::new(key, SignatureType::Eoa, None)?,
        )?;
        let creds = bootstrap.create_or_derive_api_key().await?;

        let exchange = ClobClient::new(
            clob_config,
            OrderSigner::new(key, SignatureType::GnosisSafe, Some(safe))?,
        )?
        .with_credentials(creds);

        Ok(HedgeLeg {
            exchange: Arc::new(exchange),
            wallet: Arc::new(relayer),
        })
    }
}

/// Run every pair in order and log a summary
///
/// A pair whose legs cannot be set up is recorded as failed and the batch
/// moves on. Cancellation stops the batch after the pair in flight.
pub async fn run_batch(
    engine: &ExecutionEngine,
    connector: &dyn LegConnector,
    pairs: &[AccountPair],
    market_urls: &[String],
    cancel: &CancellationToken,
) -> BatchSummary {
    let started = Instant::now();
    let mut results = Vec::with_capacity(pairs.len());

    for (i, pair) in pairs.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::warn!(remaining = pairs.len() - i, "Batch cancelled");
            break;
        }
        tracing::info!(pair = pair.index, position = i + 1, total = pairs.len(), "Starting pair");

        let pair_started = Instant::now();
        let legs = tokio::try_join!(
            connector.connect(pair, Leg::A),
            connector.connect(pair, Leg::B)
        );
        let result = match legs {
            Ok((a, b)) => engine.execute(pair.index, &a, &b, market_urls, cancel).await,
            Err(e) => {
                tracing::warn!(pair = pair.index, error = %e, "Leg setup failed");
                ExecutionResult {
                    error: Some(format!("setup: {e}")),
                    duration: pair_started.elapsed(),
                    ..ExecutionResult::new(pair.index)
                }
            }
        };

        if result.success {
            tracing::info!(
                pair = result.index,
                filled_a = %result.filled_a,
                filled_b = %result.filled_b,
                duration_ms = result.duration.as_millis() as u64,
                "Pair succeeded"
            );
        } else {
            tracing::warn!(
                pair = result.index,
                error = result.error.as_deref().unwrap_or_default(),
                duration_ms = result.duration.as_millis() as u64,
                "Pair failed"
            );
        }
        results.push(result);
    }

    let summary = BatchSummary {
        results,
        elapsed: started.elapsed(),
    };
    tracing::info!(
        total = pairs.len(),
        succeeded = summary.succeeded(),
        failed = summary.failed(),
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "Batch complete"
    );
    for failure in summary.failures() {
        tracing::warn!(
            pair = failure.index,
            error = failure.error.as_deref().unwrap_or_default(),
            "Failure detail"
        );
    }
    summary
}
