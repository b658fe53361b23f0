//! Hedge engine and batch runner over in-memory collaborators

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use updown_hedge::account::AccountPair;
use updown_hedge::clob::{BookSummary, CancelResponse, Exchange, OpenOrder, OrderResponse, OrderType};
use updown_hedge::execution::{run_batch, ExecutionEngine, HedgeLeg, HedgeParams, Leg, LegConnector};
use updown_hedge::market::{GammaMarket, MarketLookup};
use updown_hedge::orderbook::OrderBookStore;
use updown_hedge::relayer::{AccountStatus, TransactionResult, Wallet};
use updown_hedge::signing::{LimitOrderArgs, OrderOptions, TickSize};
use updown_hedge::ws::{BookSnapshot, Level};
use updown_hedge::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
struct Placed {
    token_id: String,
    price: Decimal,
    size: Decimal,
}

#[derive(Clone, Copy)]
enum Placement {
    Accept,
    Reject,
    Unauthorized,
}

struct FakeExchange {
    name: &'static str,
    bid: &'static str,
    ask: &'static str,
    fill: Decimal,
    placement: Placement,
    next_id: AtomicU32,
    placed: Mutex<Vec<Placed>>,
    cancelled: Mutex<Vec<String>>,
}

impl FakeExchange {
    fn new(name: &'static str, bid: &'static str, ask: &'static str) -> Self {
        Self {
            name,
            bid,
            ask,
            fill: Decimal::ZERO,
            placement: Placement::Accept,
            next_id: AtomicU32::new(0),
            placed: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    fn filling(mut self, fill: Decimal) -> Self {
        self.fill = fill;
        self
    }

    fn placing(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    fn placed(&self) -> Vec<Placed> {
        self.placed.lock().unwrap().clone()
    }

    fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

fn level(price: &str) -> Level {
    Level {
        price: price.to_string(),
        size: "100".to_string(),
    }
}

#[async_trait]
impl Exchange for FakeExchange {
    async fn order_book(&self, token_id: &str) -> Result<BookSummary> {
        Ok(BookSummary {
            asset_id: token_id.to_string(),
            bids: vec![level("0.01"), level(self.bid)],
            asks: vec![level("0.99"), level(self.ask)],
            tick_size: "0.01".to_string(),
            ..BookSummary::default()
        })
    }

    async fn tick_size(&self, _token_id: &str) -> Result<TickSize> {
        Ok(TickSize::Hundredth)
    }

    async fn neg_risk(&self, _token_id: &str) -> Result<bool> {
        Ok(false)
    }

    async fn place_limit_order(
        &self,
        args: &LimitOrderArgs,
        _options: OrderOptions,
        _order_type: OrderType,
    ) -> Result<OrderResponse> {
        match self.placement {
            Placement::Accept => {}
            Placement::Reject => return Err(Error::from_status(400, "not enough balance")),
            Placement::Unauthorized => {
                return Err(Error::from_status(401, "Unauthorized/Invalid api key"))
            }
        }
        self.placed.lock().unwrap().push(Placed {
            token_id: args.token_id.clone(),
            price: args.price,
            size: args.size,
        });
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(OrderResponse {
            success: true,
            order_id: format!("{}-{n}", self.name),
            status: "live".into(),
            ..OrderResponse::default()
        })
    }

    async fn get_order(&self, order_id: &str) -> Result<OpenOrder> {
        Ok(OpenOrder {
            id: order_id.to_string(),
            size_matched: self.fill.to_string(),
            ..OpenOrder::default()
        })
    }

    async fn cancel_orders(&self, order_ids: &[String]) -> Result<CancelResponse> {
        self.cancelled.lock().unwrap().extend(order_ids.iter().cloned());
        Ok(CancelResponse {
            canceled: order_ids.to_vec(),
            ..CancelResponse::default()
        })
    }
}

struct FakeWallet {
    balance: Decimal,
    approved: bool,
    approvals: AtomicU32,
}

impl FakeWallet {
    fn funded(balance: Decimal) -> Self {
        Self {
            balance,
            approved: true,
            approvals: AtomicU32::new(0),
        }
    }

    fn unapproved(balance: Decimal) -> Self {
        Self {
            approved: false,
            ..Self::funded(balance)
        }
    }
}

#[async_trait]
impl Wallet for FakeWallet {
    fn owner(&self) -> Address {
        Address::repeat_byte(0x11)
    }

    fn safe_address(&self) -> Address {
        Address::repeat_byte(0x22)
    }

    async fn usdc_balance(&self) -> Result<Decimal> {
        Ok(self.balance)
    }

    async fn account_status(&self) -> Result<AccountStatus> {
        let allowance = if self.approved { U256::MAX } else { U256::ZERO };
        Ok(AccountStatus {
            safe: self.safe_address(),
            usdc_balance: self.balance,
            usdc_allowance_ctf: allowance,
            usdc_allowance_neg_risk: allowance,
            ctf_approved_neg_risk: self.approved,
            ctf_approved_exchange: self.approved,
        })
    }

    async fn approve_all(&self) -> Result<TransactionResult> {
        self.approvals.fetch_add(1, Ordering::SeqCst);
        Ok(TransactionResult {
            hash: "0xhash".into(),
            transaction_id: "tx-1".into(),
            state: "STATE_NEW".into(),
        })
    }
}

/// Every URL resolves to a market with the slug taken from the URL
struct FakeMarkets;

#[async_trait]
impl MarketLookup for FakeMarkets {
    async fn market_by_url(&self, market_url: &str) -> Result<GammaMarket> {
        let slug = market_url.rsplit('/').next().unwrap_or_default();
        if slug.starts_with("missing") {
            return Err(Error::Config(format!("no market for {market_url}")));
        }
        Ok(GammaMarket {
            slug: slug.to_string(),
            clob_token_ids: Some(r#"["yes-token", "no-token"]"#.to_string()),
            active: true,
            ..GammaMarket::default()
        })
    }
}

fn params(max_retries: u32) -> HedgeParams {
    HedgeParams {
        max_trade_amount: dec!(10),
        min_spread_ticks: 2,
        max_retries,
        retry_delay: Duration::from_millis(5),
        fill_wait: Duration::from_millis(5),
    }
}

fn engine(max_retries: u32) -> ExecutionEngine {
    ExecutionEngine::new(params(max_retries), Arc::new(FakeMarkets))
}

fn leg(exchange: Arc<FakeExchange>, wallet: Arc<FakeWallet>) -> HedgeLeg {
    HedgeLeg { exchange, wallet }
}

fn urls() -> Vec<String> {
    vec!["https://polymarket.com/event/btc-updown-15m-1700000000".to_string()]
}

#[tokio::test]
async fn test_hedge_fills_on_first_attempt() {
    let ex_a = Arc::new(FakeExchange::new("a", "0.45", "0.48").filling(dec!(10)));
    let ex_b = Arc::new(FakeExchange::new("b", "0.45", "0.48"));
    let a = leg(ex_a.clone(), Arc::new(FakeWallet::funded(dec!(100))));
    let b = leg(ex_b.clone(), Arc::new(FakeWallet::funded(dec!(100))));

    let result = engine(3)
        .execute(7, &a, &b, &urls(), &CancellationToken::new())
        .await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.index, 7);
    assert_eq!(result.filled_a, dec!(10));
    assert_eq!(result.filled_b, Decimal::ZERO);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.market.as_deref(), Some("btc-updown-15m-1700000000"));
    assert!(result.error.is_none());

    assert_eq!(
        ex_a.placed(),
        vec![Placed {
            token_id: "yes-token".into(),
            price: dec!(0.46),
            size: dec!(10),
        }]
    );
    assert_eq!(
        ex_b.placed(),
        vec![Placed {
            token_id: "no-token".into(),
            price: dec!(0.54),
            size: dec!(10),
        }]
    );
    assert_eq!(result.orders.len(), 2);
    assert_eq!(result.orders[0].leg, Leg::A);
    assert_eq!(result.orders[1].leg, Leg::B);
    assert!(ex_a.cancelled().is_empty());
}

#[tokio::test]
async fn test_both_legs_fill() {
    let ex_a = Arc::new(FakeExchange::new("a", "0.45", "0.48").filling(dec!(10)));
    let ex_b = Arc::new(FakeExchange::new("b", "0.45", "0.48").filling(dec!(6.5)));
    let a = leg(ex_a.clone(), Arc::new(FakeWallet::funded(dec!(100))));
    let b = leg(ex_b.clone(), Arc::new(FakeWallet::funded(dec!(100))));

    let result = engine(3)
        .execute(2, &a, &b, &urls(), &CancellationToken::new())
        .await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.filled_a, dec!(10));
    assert_eq!(result.filled_b, dec!(6.5));
    assert_eq!(ex_a.placed()[0].price + ex_b.placed()[0].price, dec!(1.00));
    assert!(ex_a.cancelled().is_empty());
    assert!(ex_b.cancelled().is_empty());
}

#[tokio::test]
async fn test_size_limited_by_balance() {
    let ex_a = Arc::new(FakeExchange::new("a", "0.45", "0.48").filling(dec!(1)));
    let ex_b = Arc::new(FakeExchange::new("b", "0.45", "0.48"));
    let a = leg(ex_a.clone(), Arc::new(FakeWallet::funded(dec!(100))));
    let b = leg(ex_b.clone(), Arc::new(FakeWallet::funded(dec!(2))));

    let result = engine(1)
        .execute(1, &a, &b, &urls(), &CancellationToken::new())
        .await;

    assert!(result.success);
    // 2 / 0.54 = 3.70..
    assert_eq!(ex_a.placed()[0].size, dec!(3.70));
    assert_eq!(ex_b.placed()[0].size, dec!(3.70));
}

#[tokio::test]
async fn test_no_fill_exhausts_retries() {
    let ex_a = Arc::new(FakeExchange::new("a", "0.45", "0.48"));
    let ex_b = Arc::new(FakeExchange::new("b", "0.45", "0.48"));
    let a = leg(ex_a.clone(), Arc::new(FakeWallet::funded(dec!(100))));
    let b = leg(ex_b.clone(), Arc::new(FakeWallet::funded(dec!(100))));

    let result = engine(2)
        .execute(3, &a, &b, &urls(), &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 2);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("max retries 2 reached without fill"));
    assert_eq!(result.orders.len(), 4);
    assert_eq!(ex_a.cancelled(), vec!["a-1", "a-2"]);
    assert_eq!(ex_b.cancelled(), vec!["b-1", "b-2"]);
}

#[tokio::test(start_paused = true)]
async fn test_default_timing_between_attempts() {
    let a = leg(
        Arc::new(FakeExchange::new("a", "0.45", "0.48")),
        Arc::new(FakeWallet::funded(dec!(100))),
    );
    let b = leg(
        Arc::new(FakeExchange::new("b", "0.45", "0.48")),
        Arc::new(FakeWallet::funded(dec!(100))),
    );
    let engine = ExecutionEngine::new(
        HedgeParams {
            max_retries: 2,
            ..HedgeParams::default()
        },
        Arc::new(FakeMarkets),
    );

    let started = tokio::time::Instant::now();
    let result = engine
        .execute(1, &a, &b, &urls(), &CancellationToken::new())
        .await;

    assert!(!result.success);
    // fill wait on both attempts plus one retry delay
    assert!(started.elapsed() >= Duration::from_secs(9));
}

#[tokio::test]
async fn test_narrow_spread_selects_no_market() {
    let ex_a = Arc::new(FakeExchange::new("a", "0.47", "0.48"));
    let ex_b = Arc::new(FakeExchange::new("b", "0.47", "0.48"));
    let a = leg(ex_a.clone(), Arc::new(FakeWallet::funded(dec!(100))));
    let b = leg(ex_b.clone(), Arc::new(FakeWallet::funded(dec!(100))));

    let mut market_urls = urls();
    market_urls.push("https://polymarket.com/event/missing-market".to_string());
    let result = engine(2)
        .execute(1, &a, &b, &market_urls, &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert!(result
        .error
        .as_deref()
        .unwrap()
        .contains("no market meets spread condition"));
    assert!(result.market.is_none());
    assert!(ex_a.placed().is_empty());
}

#[tokio::test]
async fn test_one_sided_placement_is_cancelled_and_recorded() {
    let ex_a = Arc::new(FakeExchange::new("a", "0.45", "0.48"));
    let ex_b = Arc::new(FakeExchange::new("b", "0.45", "0.48").placing(Placement::Reject));
    let a = leg(ex_a.clone(), Arc::new(FakeWallet::funded(dec!(100))));
    let b = leg(ex_b.clone(), Arc::new(FakeWallet::funded(dec!(100))));

    let result = engine(2)
        .execute(1, &a, &b, &urls(), &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert!(result.has_partial_placement());
    assert!(result.orders.iter().all(|o| o.leg == Leg::A));
    assert_eq!(ex_a.cancelled(), vec!["a-1", "a-2"]);
}

#[tokio::test]
async fn test_auth_failure_stops_retries() {
    let ex_a = Arc::new(FakeExchange::new("a", "0.45", "0.48").placing(Placement::Unauthorized));
    let ex_b = Arc::new(FakeExchange::new("b", "0.45", "0.48"));
    let a = leg(ex_a.clone(), Arc::new(FakeWallet::funded(dec!(100))));
    let b = leg(ex_b.clone(), Arc::new(FakeWallet::funded(dec!(100))));

    let result = engine(5)
        .execute(1, &a, &b, &urls(), &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert_eq!(result.attempts, 1);
    let error = result.error.as_deref().unwrap();
    assert!(error.contains("authentication failed"));
    assert!(error.contains("HTTP 401"));
    assert_eq!(ex_a.placed().len(), 0);
    assert_eq!(ex_b.cancelled(), vec!["b-1"]);
}

#[tokio::test]
async fn test_missing_approvals_are_submitted() {
    let wallet_a = Arc::new(FakeWallet::unapproved(dec!(100)));
    let wallet_b = Arc::new(FakeWallet::funded(dec!(100)));
    let a = leg(
        Arc::new(FakeExchange::new("a", "0.45", "0.48").filling(dec!(10))),
        wallet_a.clone(),
    );
    let b = leg(Arc::new(FakeExchange::new("b", "0.45", "0.48")), wallet_b.clone());

    let result = engine(1)
        .execute(1, &a, &b, &urls(), &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(wallet_a.approvals.load(Ordering::SeqCst), 1);
    assert_eq!(wallet_b.approvals.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_empty_balance_is_rejected() {
    let ex_a = Arc::new(FakeExchange::new("a", "0.45", "0.48"));
    let a = leg(ex_a.clone(), Arc::new(FakeWallet::funded(Decimal::ZERO)));
    let b = leg(
        Arc::new(FakeExchange::new("b", "0.45", "0.48")),
        Arc::new(FakeWallet::funded(dec!(100))),
    );

    let result = engine(3)
        .execute(1, &a, &b, &urls(), &CancellationToken::new())
        .await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("insufficient balance"));
    assert!(ex_a.placed().is_empty());
}

#[tokio::test]
async fn test_streamed_book_preferred_over_rest() {
    let store = Arc::new(OrderBookStore::new());
    store.track(&["yes-token".to_string()]).await;
    store
        .apply_snapshot(&BookSnapshot {
            asset_id: "yes-token".into(),
            market: String::new(),
            timestamp: String::new(),
            hash: String::new(),
            bids: vec![level("0.40")],
            asks: vec![level("0.45")],
        })
        .await;

    let ex_a = Arc::new(FakeExchange::new("a", "0.45", "0.48").filling(dec!(1)));
    let ex_b = Arc::new(FakeExchange::new("b", "0.45", "0.48"));
    let a = leg(ex_a.clone(), Arc::new(FakeWallet::funded(dec!(100))));
    let b = leg(ex_b.clone(), Arc::new(FakeWallet::funded(dec!(100))));

    let result = engine(1)
        .with_book_store(store)
        .execute(1, &a, &b, &urls(), &CancellationToken::new())
        .await;

    assert!(result.success);
    assert_eq!(ex_a.placed()[0].price, dec!(0.41));
    assert_eq!(ex_b.placed()[0].price, dec!(0.59));
}

#[tokio::test]
async fn test_cancelled_run_reports_error() {
    let a = leg(
        Arc::new(FakeExchange::new("a", "0.45", "0.48")),
        Arc::new(FakeWallet::funded(dec!(100))),
    );
    let b = leg(
        Arc::new(FakeExchange::new("b", "0.45", "0.48")),
        Arc::new(FakeWallet::funded(dec!(100))),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = engine(3).execute(1, &a, &b, &urls(), &cancel).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("cancelled"));
}

#[tokio::test]
async fn test_cancel_during_fill_wait_cancels_open_orders() {
    let ex_a = Arc::new(FakeExchange::new("a", "0.45", "0.48"));
    let ex_b = Arc::new(FakeExchange::new("b", "0.45", "0.48"));
    let a = leg(ex_a.clone(), Arc::new(FakeWallet::funded(dec!(100))));
    let b = leg(ex_b.clone(), Arc::new(FakeWallet::funded(dec!(100))));
    let engine = ExecutionEngine::new(
        HedgeParams {
            fill_wait: Duration::from_secs(60),
            ..params(3)
        },
        Arc::new(FakeMarkets),
    );

    let cancel = CancellationToken::new();
    let trigger = {
        let cancel = cancel.clone();
        let (ex_a, ex_b) = (ex_a.clone(), ex_b.clone());
        tokio::spawn(async move {
            while ex_a.placed().is_empty() || ex_b.placed().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            cancel.cancel();
        })
    };

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        engine.execute(1, &a, &b, &urls(), &cancel),
    )
    .await
    .unwrap();
    trigger.await.unwrap();

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("cancelled"));
    assert_eq!(result.orders.len(), 2);
    assert_eq!(ex_a.cancelled(), vec!["a-1"]);
    assert_eq!(ex_b.cancelled(), vec!["b-1"]);
}

/// Connects pair 2 with a failing leg, everything else with fills
struct FakeConnector;

#[async_trait]
impl LegConnector for FakeConnector {
    async fn connect(&self, pair: &AccountPair, leg: Leg) -> Result<HedgeLeg> {
        if pair.index == 2 && leg == Leg::B {
            return Err(Error::InvalidKey("odd-length hex".into()));
        }
        Ok(HedgeLeg {
            exchange: Arc::new(FakeExchange::new("x", "0.45", "0.48").filling(dec!(5))),
            wallet: Arc::new(FakeWallet::funded(dec!(100))),
        })
    }
}

fn pair(index: u32) -> AccountPair {
    AccountPair {
        index,
        address_a: None,
        private_key_a: format!("0x{:064x}", index * 2 + 1),
        proxy_a: None,
        address_b: None,
        private_key_b: format!("0x{:064x}", index * 2 + 2),
        proxy_b: None,
    }
}

#[tokio::test]
async fn test_batch_runs_every_pair() {
    let summary = run_batch(
        &engine(1),
        &FakeConnector,
        &[pair(1), pair(2), pair(3)],
        &urls(),
        &CancellationToken::new(),
    )
    .await;

    assert_eq!(summary.results.len(), 3);
    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    let failure = summary.failures().next().unwrap();
    assert_eq!(failure.index, 2);
    assert!(failure.error.as_deref().unwrap().starts_with("setup: "));
}

#[tokio::test]
async fn test_cancelled_batch_stops() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = run_batch(&engine(1), &FakeConnector, &[pair(1), pair(3)], &urls(), &cancel).await;
    assert!(summary.results.is_empty());
}
