//! Paired hedge execution for one account pair

use super::pricing::{hedge_prices, trade_amount, Quote, DEFAULT_TICK};
use super::types::{ExecutionResult, HedgeLeg, HedgeParams, Leg, PlacedOrder};
use crate::clob::{Exchange, OrderResponse, OrderType};
use crate::error::{Error, Result};
use crate::market::MarketLookup;
use crate::orderbook::OrderBookStore;
use crate::signing::{LimitOrderArgs, OrderOptions, Side};
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Market chosen for a run
#[derive(Debug, Clone)]
struct Candidate {
    slug: String,
    yes_token: String,
    no_token: String,
    tick: Decimal,
    quote: Quote,
}

/// Fill sizes reported for both legs
type Fills = (Decimal, Decimal);

/// Runs the hedge workflow for account pairs
pub struct ExecutionEngine {
    params: HedgeParams,
    markets: Arc<dyn MarketLookup>,
    book_store: Option<Arc<OrderBookStore>>,
}

impl ExecutionEngine {
    pub fn new(params: HedgeParams, markets: Arc<dyn MarketLookup>) -> Self {
        Self {
            params,
            markets,
            book_store: None,
        }
    }

    /// Prefer streamed books over REST snapshots for price discovery
    pub fn with_book_store(mut self, store: Arc<OrderBookStore>) -> Self {
        self.book_store = Some(store);
        self
    }

    pub fn params(&self) -> &HedgeParams {
        &self.params
    }

    /// Run one pair to a terminal result
    ///
    /// Never fails: every error, including cancellation, ends up in the
    /// result together with any orders that were placed.
    pub async fn execute(
        &self,
        index: u32,
        a: &HedgeLeg,
        b: &HedgeLeg,
        market_urls: &[String],
        cancel: &CancellationToken,
    ) -> ExecutionResult {
        let started = Instant::now();
        let mut result = ExecutionResult::new(index);

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            outcome = self.run(index, a, b, market_urls, &mut result) => outcome,
        };

        if matches!(outcome, Err(Error::Cancelled)) {
            cancel_in_flight(index, a, b, &result).await;
        }

        match outcome {
            Ok((filled_a, filled_b)) => {
                result.success = true;
                result.filled_a = filled_a;
                result.filled_b = filled_b;
                tracing::info!(pair = index, %filled_a, %filled_b, "Hedge filled");
            }
            Err(e) => {
                tracing::warn!(pair = index, error = %e, "Hedge failed");
                result.error = Some(e.to_string());
            }
        }
        if result.has_partial_placement() {
            tracing::warn!(pair = index, "One-sided placement recorded");
        }

        result.duration = started.elapsed();
        telemetry::record_latency(LatencyMetric::HedgeRun, result.duration);
        result
    }

    async fn run(
        &self,
        index: u32,
        a: &HedgeLeg,
        b: &HedgeLeg,
        market_urls: &[String],
        result: &mut ExecutionResult,
    ) -> Result<Fills> {
        let balance_a = self.prepare(index, Leg::A, a).await?;
        let balance_b = self.prepare(index, Leg::B, b).await?;

        let mut candidate = self
            .select_market(index, a.exchange.as_ref(), market_urls)
            .await?;
        result.market = Some(candidate.slug.clone());

        for attempt in 1..=self.params.max_retries {
            result.attempts = attempt;

            if attempt > 1 {
                tracing::info!(pair = index, attempt, "Retrying");
                tokio::time::sleep(self.params.retry_delay).await;
                match self.quote(a.exchange.as_ref(), &candidate.yes_token).await {
                    Ok(quote) => candidate.quote = quote,
                    Err(e) => {
                        tracing::warn!(pair = index, attempt, error = %e, "Book refresh failed");
                        continue;
                    }
                }
                if !candidate
                    .quote
                    .meets_spread(candidate.tick, self.params.min_spread_ticks)
                {
                    tracing::info!(
                        pair = index,
                        bid = %candidate.quote.bid,
                        ask = %candidate.quote.ask,
                        "Spread too narrow, waiting"
                    );
                    continue;
                }
            }

            let (yes_price, no_price) = hedge_prices(&candidate.quote, candidate.tick);
            let size = trade_amount(
                self.params.max_trade_amount,
                balance_a,
                balance_b,
                yes_price,
                no_price,
                candidate.tick,
            )
            .ok_or_else(|| Error::InvalidAmount("insufficient balance".into()))?;

            tracing::info!(
                pair = index,
                attempt,
                yes = %yes_price,
                no = %no_price,
                %size,
                "Placing hedge"
            );
            if let Some(fills) = self
                .attempt(index, attempt, a, b, &candidate, (yes_price, no_price), size, result)
                .await?
            {
                return Ok(fills);
            }
        }

        Err(Error::Hedge(format!(
            "max retries {} reached without fill",
            self.params.max_retries
        )))
    }

    /// Read balance and approvals; submit approvals when missing
    async fn prepare(&self, index: u32, leg: Leg, hedge: &HedgeLeg) -> Result<Decimal> {
        let status = hedge.wallet.account_status().await?;
        tracing::info!(
            pair = index,
            %leg,
            safe = %status.safe,
            balance = %status.usdc_balance,
            "Account status"
        );
        if status.needs_approval() {
            tracing::info!(pair = index, %leg, "Approvals missing, submitting");
            match hedge.wallet.approve_all().await {
                Ok(tx) => tracing::info!(
                    pair = index,
                    %leg,
                    transaction_id = %tx.transaction_id,
                    state = %tx.state,
                    "Approvals submitted"
                ),
                Err(e) => tracing::warn!(pair = index, %leg, error = %e, "Approval failed"),
            }
        }
        Ok(status.usdc_balance)
    }

    /// Probe candidate markets in random order for one with enough spread
    async fn select_market(
        &self,
        index: u32,
        exchange: &dyn Exchange,
        market_urls: &[String],
    ) -> Result<Candidate> {
        let mut urls = market_urls.to_vec();
        urls.shuffle(&mut rand::rng());

        for url in &urls {
            let market = match self.markets.market_by_url(url).await {
                Ok(market) => market,
                Err(e) => {
                    tracing::debug!(pair = index, url = %url, error = %e, "Market lookup failed");
                    continue;
                }
            };
            let token_ids = match market.token_ids() {
                Ok(ids) if ids.len() >= 2 => ids,
                _ => {
                    tracing::debug!(pair = index, slug = %market.slug, "Market has no token pair");
                    continue;
                }
            };
            let book = match exchange.order_book(&token_ids[0]).await {
                Ok(book) => book,
                Err(e) => {
                    tracing::debug!(pair = index, slug = %market.slug, error = %e, "Book fetch failed");
                    continue;
                }
            };

            let tick = book.tick().unwrap_or(DEFAULT_TICK);
            let quote = match self.stream_quote(&token_ids[0]).await {
                Some(quote) => quote,
                None => Quote::from_book(&book),
            };
            if quote.is_incomplete() {
                tracing::info!(pair = index, slug = %market.slug, "Book incomplete");
                continue;
            }

            let spread_ticks = quote.spread_ticks(tick);
            tracing::info!(
                pair = index,
                slug = %market.slug,
                bid = %quote.bid,
                ask = %quote.ask,
                spread_ticks,
                "Market probed"
            );
            if spread_ticks >= i64::from(self.params.min_spread_ticks) {
                return Ok(Candidate {
                    slug: market.slug,
                    yes_token: token_ids[0].clone(),
                    no_token: token_ids[1].clone(),
                    tick,
                    quote,
                });
            }
        }

        Err(Error::Hedge("no market meets spread condition".into()))
    }

    async fn stream_quote(&self, token_id: &str) -> Option<Quote> {
        let store = self.book_store.as_ref()?;
        let bid = store.best_bid(token_id).await?;
        let ask = store.best_ask(token_id).await;
        Some(Quote::new(Some(bid.price), ask.map(|level| level.price)))
    }

    async fn quote(&self, exchange: &dyn Exchange, token_id: &str) -> Result<Quote> {
        if let Some(quote) = self.stream_quote(token_id).await {
            return Ok(quote);
        }
        Ok(Quote::from_book(&exchange.order_book(token_id).await?))
    }

    /// Place both legs, wait, and poll fills
    ///
    /// `Ok(None)` means the attempt left nothing on the book and may be
    /// retried.
    #[allow(clippy::too_many_arguments)]
    async fn attempt(
        &self,
        index: u32,
        attempt: u32,
        a: &HedgeLeg,
        b: &HedgeLeg,
        candidate: &Candidate,
        (yes_price, no_price): (Decimal, Decimal),
        size: Decimal,
        result: &mut ExecutionResult,
    ) -> Result<Option<Fills>> {
        let options = tokio::try_join!(
            order_options(a.exchange.as_ref(), &candidate.yes_token),
            order_options(b.exchange.as_ref(), &candidate.no_token),
        );
        let (options_a, options_b) = match options {
            Ok(options) => options,
            Err(e) => {
                tracing::warn!(pair = index, attempt, error = %e, "Market parameters unavailable");
                return Ok(None);
            }
        };

        let args_a = LimitOrderArgs::new(&candidate.yes_token, Side::Buy, yes_price, size);
        let args_b = LimitOrderArgs::new(&candidate.no_token, Side::Buy, no_price, size);
        let (placed_a, placed_b) = tokio::join!(
            a.exchange
                .place_limit_order(&args_a, options_a, OrderType::Gtc),
            b.exchange
                .place_limit_order(&args_b, options_b, OrderType::Gtc),
        );

        let record = |leg: Leg, args: &LimitOrderArgs, resp: &OrderResponse| PlacedOrder {
            leg,
            order_id: resp.order_id.clone(),
            token_id: args.token_id.clone(),
            price: args.price,
            size: args.size,
            attempt,
        };

        let (order_a, order_b) = match (placed_a, placed_b) {
            (Ok(resp_a), Ok(resp_b)) => {
                result.orders.push(record(Leg::A, &args_a, &resp_a));
                result.orders.push(record(Leg::B, &args_b, &resp_b));
                (resp_a.order_id, resp_b.order_id)
            }
            (Ok(resp), Err(e)) => {
                result.orders.push(record(Leg::A, &args_a, &resp));
                tracing::warn!(pair = index, attempt, error = %e, "Leg B failed, cancelling leg A");
                cancel_leg(index, Leg::A, a.exchange.as_ref(), &resp.order_id).await;
                return fatal_or_retry(e);
            }
            (Err(e), Ok(resp)) => {
                result.orders.push(record(Leg::B, &args_b, &resp));
                tracing::warn!(pair = index, attempt, error = %e, "Leg A failed, cancelling leg B");
                cancel_leg(index, Leg::B, b.exchange.as_ref(), &resp.order_id).await;
                return fatal_or_retry(e);
            }
            (Err(e_a), Err(e_b)) => {
                tracing::warn!(pair = index, attempt, leg_a = %e_a, leg_b = %e_b, "Both legs failed");
                return fatal_or_retry(e_a);
            }
        };
        tracing::info!(pair = index, attempt, order_a = %order_a, order_b = %order_b, "Orders placed");

        tokio::time::sleep(self.params.fill_wait).await;

        let (filled_a, filled_b) = tokio::join!(
            filled(index, Leg::A, a.exchange.as_ref(), &order_a),
            filled(index, Leg::B, b.exchange.as_ref(), &order_b),
        );
        if filled_a > Decimal::ZERO || filled_b > Decimal::ZERO {
            for fill in [filled_a, filled_b] {
                if fill > Decimal::ZERO {
                    telemetry::increment(CounterMetric::OrdersFilled);
                }
            }
            return Ok(Some((filled_a, filled_b)));
        }

        tracing::info!(pair = index, attempt, "No fill, cancelling both legs");
        tokio::join!(
            cancel_leg(index, Leg::A, a.exchange.as_ref(), &order_a),
            cancel_leg(index, Leg::B, b.exchange.as_ref(), &order_b),
        );
        Ok(None)
    }
}

async fn order_options(exchange: &dyn Exchange, token_id: &str) -> Result<OrderOptions> {
    let (tick_size, neg_risk) =
        tokio::try_join!(exchange.tick_size(token_id), exchange.neg_risk(token_id))?;
    Ok(OrderOptions {
        tick_size,
        neg_risk,
    })
}

/// Credential and key problems will not clear up on retry
fn fatal_or_retry(e: Error) -> Result<Option<Fills>> {
    match e {
        Error::Auth(_) | Error::InvalidKey(_) => Err(e),
        _ => Ok(None),
    }
}

async fn filled(index: u32, leg: Leg, exchange: &dyn Exchange, order_id: &str) -> Decimal {
    match exchange.get_order(order_id).await {
        Ok(order) => order.filled(),
        Err(e) => {
            tracing::warn!(pair = index, %leg, order_id, error = %e, "Fill poll failed");
            Decimal::ZERO
        }
    }
}

/// Best-effort cancel of the orders placed by an interrupted attempt
async fn cancel_in_flight(index: u32, a: &HedgeLeg, b: &HedgeLeg, result: &ExecutionResult) {
    let live: Vec<&PlacedOrder> = result
        .orders
        .iter()
        .filter(|order| order.attempt == result.attempts)
        .collect();
    if live.is_empty() {
        return;
    }
    tracing::info!(pair = index, orders = live.len(), "Run cancelled, cancelling open orders");
    for order in live {
        let exchange = match order.leg {
            Leg::A => a.exchange.as_ref(),
            Leg::B => b.exchange.as_ref(),
        };
        cancel_leg(index, order.leg, exchange, &order.order_id).await;
    }
}

async fn cancel_leg(index: u32, leg: Leg, exchange: &dyn Exchange, order_id: &str) {
    if let Err(e) = exchange.cancel_orders(&[order_id.to_string()]).await {
        tracing::warn!(pair = index, %leg, order_id, error = %e, "Cancel failed");
    }
}
