//! Round scheduler against a scripted directory and a local feed

use crate::support::{accept, book_frame, next_text, send_text, wait_for, ws_listener};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use updown_hedge::market::{
    next_start, round_slug, Period, Round, RoundDirectory, RoundScheduler, SchedulerConfig,
    SchedulerEvent, SwitchoverFallback, Symbol,
};
use updown_hedge::orderbook::OrderBookStore;
use updown_hedge::ws::WsConfig;
use updown_hedge::{Error, Result};

const WAIT: Duration = Duration::from_secs(5);

/// First round ends shortly after the test starts; later rounds run a full period
struct ScriptedRounds {
    first_end: DateTime<Utc>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRounds {
    fn new(first_round_left: Duration) -> Self {
        Self {
            first_end: Utc::now() + chrono::Duration::from_std(first_round_left).unwrap(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RoundDirectory for ScriptedRounds {
    async fn fetch_round(&self, slug: &str, start: DateTime<Utc>) -> Result<Round> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(slug.to_string());
            calls.len()
        };
        let end = if n == 1 {
            self.first_end
        } else {
            start + chrono::Duration::minutes(15)
        };
        Round::new(slug, format!("up-{n}"), format!("down-{n}"), start, end)
    }
}

/// Lists every round as already over
struct Stale {
    calls: Mutex<u32>,
}

#[async_trait]
impl RoundDirectory for Stale {
    async fn fetch_round(&self, slug: &str, _start: DateTime<Utc>) -> Result<Round> {
        *self.calls.lock().unwrap() += 1;
        let now = Utc::now();
        Round::new(
            slug,
            "up",
            "down",
            now - chrono::Duration::minutes(2),
            now - chrono::Duration::minutes(1),
        )
    }
}

struct Unavailable;

#[async_trait]
impl RoundDirectory for Unavailable {
    async fn fetch_round(&self, slug: &str, _start: DateTime<Utc>) -> Result<Round> {
        Err(Error::Round(format!("{slug}: not listed")))
    }
}

/// Accept any number of clients; answer each subscription with book
/// snapshots and forward every text frame received
async fn spawn_feed() -> (String, mpsc::UnboundedReceiver<String>) {
    let (listener, url) = ws_listener().await;
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            let (mut socket, subscription) = accept(&listener).await;
            let tx = tx.clone();
            tokio::spawn(async move {
                let parsed: serde_json::Value =
                    serde_json::from_str(&subscription).unwrap_or_default();
                let _ = tx.send(subscription);
                if let Some(ids) = parsed["assets_ids"].as_array() {
                    for id in ids.iter().filter_map(|id| id.as_str()) {
                        send_text(&mut socket, &book_frame(id, "0.45", "0.48")).await;
                    }
                }
                while let Some(frame) = next_text(&mut socket).await {
                    let _ = tx.send(frame);
                }
            });
        }
    });
    (url, rx)
}

fn scheduler_config(lead: Duration, fallback: SwitchoverFallback) -> SchedulerConfig {
    SchedulerConfig {
        pre_subscribe_lead: lead,
        tick: Duration::from_millis(20),
        retry_delay: Duration::from_millis(50),
        fallback,
        ..SchedulerConfig::default()
    }
}

fn ws_config(url: &str) -> WsConfig {
    WsConfig::new(url)
        .reconnect_delay(Duration::from_millis(50))
        .ping_interval(Duration::from_secs(30))
}

async fn next_frame(frames: &mut mpsc::UnboundedReceiver<String>) -> serde_json::Value {
    let frame = tokio::time::timeout(WAIT, frames.recv())
        .await
        .expect("timed out waiting for frame")
        .expect("feed stopped");
    serde_json::from_str(&frame).unwrap()
}

#[tokio::test]
async fn test_activate_presubscribe_and_switch() {
    let (url, mut frames) = spawn_feed().await;
    let directory = Arc::new(ScriptedRounds::new(Duration::from_millis(1500)));
    let store = Arc::new(OrderBookStore::new());
    let (scheduler, mut events) = RoundScheduler::new(
        scheduler_config(Duration::from_secs(3600), SwitchoverFallback::Resubscribe),
        ws_config(&url),
        directory.clone(),
        store.clone(),
    );
    let round = scheduler.watch_round();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(scheduler.run(cancel.clone()));

    let activated = wait_for(&mut events, WAIT, |e| matches!(e, SchedulerEvent::Activated(_))).await;
    let SchedulerEvent::Activated(first) = activated else {
        unreachable!()
    };
    assert_eq!(first.up.token_id, "up-1");
    assert!(first.slug.starts_with("btc-updown-15m-"));
    assert_eq!(next_frame(&mut frames).await["assets_ids"], serde_json::json!(["up-1", "down-1"]));

    let pre = wait_for(&mut events, WAIT, |e| matches!(e, SchedulerEvent::PreSubscribed(_))).await;
    let SchedulerEvent::PreSubscribed(second) = pre else {
        unreachable!()
    };
    // the listed end is off-boundary; the next round still starts on one
    assert_eq!(second.start, next_start(first.start, Period::FifteenMinutes));
    assert_eq!(
        second.slug,
        round_slug(Symbol::Btc, Period::FifteenMinutes, second.start)
    );
    assert!(store.is_tracked("up-1").await);
    assert!(store.is_tracked("up-2").await);

    let control = next_frame(&mut frames).await;
    assert_eq!(control["operation"], "subscribe");
    assert_eq!(control["assets_ids"], serde_json::json!(["up-2", "down-2"]));

    let switched = wait_for(&mut events, WAIT, |e| matches!(e, SchedulerEvent::Switched { .. })).await;
    assert_eq!(
        switched,
        SchedulerEvent::Switched {
            from: first.slug.clone(),
            to: second.clone(),
        }
    );
    assert_eq!(round.borrow().as_ref(), Some(&second));
    assert!(!store.is_tracked("up-1").await);
    assert!(store.is_tracked("down-2").await);

    let control = next_frame(&mut frames).await;
    assert_eq!(control["operation"], "unsubscribe");
    assert_eq!(control["assets_ids"], serde_json::json!(["up-1", "down-1"]));

    cancel.cancel();
    task.await.unwrap().unwrap();
    assert!(round.borrow().is_none());
    let calls = directory.calls();
    assert_eq!(calls[1], second.slug);
    assert_ne!(calls[0], calls[1]);
}

#[tokio::test]
async fn test_book_updates_reach_the_store() {
    let (url, _frames) = spawn_feed().await;
    let store = Arc::new(OrderBookStore::new());
    let (scheduler, mut events) = RoundScheduler::new(
        scheduler_config(Duration::ZERO, SwitchoverFallback::Resubscribe),
        ws_config(&url),
        Arc::new(ScriptedRounds::new(Duration::from_secs(600))),
        store.clone(),
    );
    let cancel = CancellationToken::new();
    let task = tokio::spawn(scheduler.run(cancel.clone()));

    wait_for(&mut events, WAIT, |e| {
        matches!(e, SchedulerEvent::BookUpdated { token_id } if token_id == "down-1")
    })
    .await;
    let bid = store.best_bid("down-1").await.unwrap();
    assert_eq!(bid.price.to_string(), "0.45");

    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_missed_presubscribe_resubscribes() {
    let (url, mut frames) = spawn_feed().await;
    let store = Arc::new(OrderBookStore::new());
    let (scheduler, mut events) = RoundScheduler::new(
        scheduler_config(Duration::ZERO, SwitchoverFallback::Resubscribe),
        ws_config(&url),
        Arc::new(ScriptedRounds::new(Duration::from_millis(500))),
        store.clone(),
    );
    let cancel = CancellationToken::new();
    let task = tokio::spawn(scheduler.run(cancel.clone()));

    let fallback = wait_for(&mut events, WAIT, |e| matches!(e, SchedulerEvent::Fallback(_))).await;
    let SchedulerEvent::Fallback(round) = fallback else {
        unreachable!()
    };
    assert_eq!(round.up.token_id, "up-2");

    // initial subscription, then a fresh connection for the new round
    assert_eq!(next_frame(&mut frames).await["assets_ids"], serde_json::json!(["up-1", "down-1"]));
    assert_eq!(next_frame(&mut frames).await["assets_ids"], serde_json::json!(["up-2", "down-2"]));
    assert!(!store.is_tracked("up-1").await);

    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_repeated_fallbacks_are_rate_limited() {
    let (url, _frames) = spawn_feed().await;
    let directory = Arc::new(Stale {
        calls: Mutex::new(0),
    });
    let (scheduler, mut events) = RoundScheduler::new(
        SchedulerConfig {
            retry_delay: Duration::from_millis(300),
            ..scheduler_config(Duration::ZERO, SwitchoverFallback::Resubscribe)
        },
        ws_config(&url),
        directory.clone(),
        Arc::new(OrderBookStore::new()),
    );
    let cancel = CancellationToken::new();
    let task = tokio::spawn(scheduler.run(cancel.clone()));

    let mut fallbacks = 0;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while let Ok(Some(event)) = tokio::time::timeout_at(deadline, events.recv()).await {
        if matches!(event, SchedulerEvent::Fallback(_)) {
            fallbacks += 1;
        }
    }

    // one rebuild per retry delay, not one per tick
    assert!((1..=5).contains(&fallbacks), "fallbacks: {fallbacks}");
    assert!(*directory.calls.lock().unwrap() <= 7);

    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_fail_round_policy_skips_round() {
    let (url, _frames) = spawn_feed().await;
    let store = Arc::new(OrderBookStore::new());
    let (scheduler, mut events) = RoundScheduler::new(
        scheduler_config(Duration::ZERO, SwitchoverFallback::FailRound),
        ws_config(&url),
        Arc::new(ScriptedRounds::new(Duration::from_millis(500))),
        store.clone(),
    );
    let round = scheduler.watch_round();
    let cancel = CancellationToken::new();
    let task = tokio::spawn(scheduler.run(cancel.clone()));

    let failed = wait_for(&mut events, WAIT, |e| matches!(e, SchedulerEvent::RoundFailed { .. })).await;
    assert!(matches!(failed, SchedulerEvent::RoundFailed { .. }));
    assert!(round.borrow().is_none());
    assert!(store.is_empty().await);

    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_startup_fetch_failure_is_returned() {
    let (scheduler, _events) = RoundScheduler::new(
        scheduler_config(Duration::from_secs(30), SwitchoverFallback::Resubscribe),
        WsConfig::new("ws://127.0.0.1:1"),
        Arc::new(Unavailable),
        Arc::new(OrderBookStore::new()),
    );
    let result = scheduler.run(CancellationToken::new()).await;
    assert!(matches!(result, Err(Error::Round(_))));
}
