//! Round rollover driver
//!
//! Keeps one market-channel stream subscribed to the current round, adds the
//! next round shortly before expiry and switches over at the boundary.

use super::round::{align_start, next_start, round_slug, startup_start, Period, Round, Symbol};
use super::RoundDirectory;
use crate::error::{Error, Result};
use crate::orderbook::OrderBookStore;
use crate::telemetry::{self, CounterMetric};
use crate::ws::{StreamEvent, StreamSession, Subscription, WsConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// What to do at a boundary when the next round was not pre-subscribed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchoverFallback {
    /// Fetch the round now and rebuild the stream; books go dark until the
    /// new snapshots arrive
    #[default]
    Resubscribe,
    /// Give up on the missed round and wait for the following boundary
    FailRound,
}

/// Scheduler tuning
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub symbol: Symbol,
    pub period: Period,
    /// How long before the current round ends the next one is subscribed
    pub pre_subscribe_lead: Duration,
    /// A round older than this at startup is skipped
    pub startup_grace: Duration,
    pub tick: Duration,
    /// Pause between failed fetch/subscribe attempts
    pub retry_delay: Duration,
    pub fallback: SwitchoverFallback,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            symbol: Symbol::Btc,
            period: Period::FifteenMinutes,
            pre_subscribe_lead: Duration::from_secs(30),
            startup_grace: Duration::from_secs(10),
            tick: Duration::from_millis(100),
            retry_delay: Duration::from_secs(1),
            fallback: SwitchoverFallback::Resubscribe,
        }
    }
}

/// Round lifecycle notifications
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEvent {
    /// First round subscribed, or a round picked up after a failed one
    Activated(Round),
    /// Next round added to the live stream
    PreSubscribed(Round),
    /// Boundary crossed on the pre-subscribed path
    Switched { from: String, to: Round },
    /// Boundary crossed by rebuilding the stream
    Fallback(Round),
    RoundFailed { slug: String, error: String },
    /// A tracked book changed; dropped when the consumer lags
    BookUpdated { token_id: String },
    /// Connection lifecycle from the underlying session
    Stream(StreamEvent),
}

enum Step {
    Stop,
    Tick,
    Stream(Option<StreamEvent>),
}

/// Drives round discovery, subscription and book reset
pub struct RoundScheduler {
    config: SchedulerConfig,
    ws: WsConfig,
    directory: Arc<dyn RoundDirectory>,
    store: Arc<OrderBookStore>,
    events: mpsc::Sender<SchedulerEvent>,
    round_tx: watch::Sender<Option<Round>>,
    current: Option<Round>,
    next: Option<Round>,
    session: Option<StreamSession>,
    stream: Option<mpsc::Receiver<StreamEvent>>,
    retry_at: Option<Instant>,
    /// Set by the fail-round policy: rounds starting at or before this are skipped
    resume_after: Option<DateTime<Utc>>,
}

impl RoundScheduler {
    pub fn new(
        config: SchedulerConfig,
        ws: WsConfig,
        directory: Arc<dyn RoundDirectory>,
        store: Arc<OrderBookStore>,
    ) -> (Self, mpsc::Receiver<SchedulerEvent>) {
        let (events, rx) = mpsc::channel(ws.buffer_size.max(1));
        let (round_tx, _) = watch::channel(None);
        (
            Self {
                config,
                ws,
                directory,
                store,
                events,
                round_tx,
                current: None,
                next: None,
                session: None,
                stream: None,
                retry_at: None,
                resume_after: None,
            },
            rx,
        )
    }

    /// Follow the current round
    pub fn watch_round(&self) -> watch::Receiver<Option<Round>> {
        self.round_tx.subscribe()
    }

    pub fn store(&self) -> Arc<OrderBookStore> {
        self.store.clone()
    }

    /// Run until cancelled
    ///
    /// Fails only when the startup round cannot be fetched or subscribed;
    /// later failures are reported as events and retried.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let grace = to_chrono(self.config.startup_grace);
        let start = startup_start(Utc::now(), self.config.period, grace);
        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            res = self.activate(start) => res?,
        }

        let mut ticker = interval(self.config.tick.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let step = tokio::select! {
                _ = cancel.cancelled() => Step::Stop,
                _ = ticker.tick() => Step::Tick,
                event = next_stream_event(&mut self.stream) => Step::Stream(event),
            };
            match step {
                Step::Stop => break,
                Step::Tick => self.on_tick(Utc::now()).await,
                Step::Stream(Some(event)) => self.on_stream(event).await,
                Step::Stream(None) => self.stream = None,
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn emit(&self, event: SchedulerEvent) {
        if let SchedulerEvent::BookUpdated { .. } = event {
            let _ = self.events.try_send(event);
        } else {
            let _ = self.events.send(event).await;
        }
    }

    fn may_retry(&self) -> bool {
        self.retry_at.map_or(true, |at| Instant::now() >= at)
    }

    fn retry_later(&mut self) {
        self.retry_at = Some(Instant::now() + self.config.retry_delay);
    }

    /// Boundary and slug of the round after `current`
    fn following(&self, current: &Round) -> (DateTime<Utc>, String) {
        let start = next_start(current.start, self.config.period);
        (start, round_slug(self.config.symbol, self.config.period, start))
    }

    fn set_current(&mut self, round: Option<Round>) {
        self.current = round.clone();
        self.round_tx.send_replace(round);
    }

    async fn open_session(&mut self, token_ids: Vec<String>) -> Result<()> {
        let (session, rx) =
            StreamSession::connect(self.ws.clone(), Subscription::market(token_ids)).await?;
        self.session = Some(session);
        self.stream = Some(rx);
        Ok(())
    }

    async fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
        self.stream = None;
    }

    /// Fetch the round starting at `start`, reset books and subscribe
    async fn activate(&mut self, start: DateTime<Utc>) -> Result<()> {
        let slug = round_slug(self.config.symbol, self.config.period, start);
        let round = self.directory.fetch_round(&slug, start).await?;

        self.close_session().await;
        self.store.reset(&round.token_ids()).await;
        self.open_session(round.token_ids()).await?;

        tracing::info!(
            slug = %round.slug,
            up = %round.up.token_id,
            down = %round.down.token_id,
            end = %round.end,
            "Round activated"
        );
        self.next = None;
        self.retry_at = None;
        self.resume_after = None;
        self.set_current(Some(round.clone()));
        self.emit(SchedulerEvent::Activated(round)).await;
        Ok(())
    }

    async fn on_stream(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Market(event) => {
                if self.store.apply_event(&event).await {
                    self.emit(SchedulerEvent::BookUpdated {
                        token_id: event.asset_id().to_string(),
                    })
                    .await;
                }
            }
            StreamEvent::User(_) => {}
            StreamEvent::Closed => self.stream = None,
            StreamEvent::Failed(e) => {
                tracing::error!(error = %e, "Stream failed; will reopen on next tick");
                self.emit(SchedulerEvent::Stream(StreamEvent::Failed(e))).await;
            }
            other => self.emit(SchedulerEvent::Stream(other)).await,
        }
    }

    async fn on_tick(&mut self, now: DateTime<Utc>) {
        let Some(current) = self.current.clone() else {
            self.recover(now).await;
            return;
        };

        self.ensure_session().await;

        let remaining = current.remaining(now);
        let lead = to_chrono(self.config.pre_subscribe_lead);
        if remaining > chrono::Duration::zero()
            && remaining < lead
            && self.next.is_none()
            && self.may_retry()
        {
            self.pre_subscribe(&current).await;
        }

        if remaining <= chrono::Duration::zero() {
            self.switchover(current).await;
        }
    }

    /// Subscribe the round that follows `current` on the live session
    async fn pre_subscribe(&mut self, current: &Round) {
        let (start, slug) = self.following(current);
        let round = match self.directory.fetch_round(&slug, start).await {
            Ok(round) => round,
            Err(e) => {
                tracing::warn!(slug = %slug, error = %e, "Pre-subscribe fetch failed");
                self.retry_later();
                return;
            }
        };

        let Some(session) = &self.session else {
            self.retry_later();
            return;
        };

        self.store.track(&round.token_ids()).await;
        if let Err(e) = session.subscribe(round.token_ids()).await {
            tracing::warn!(slug = %round.slug, error = %e, "Pre-subscribe failed");
            self.store.retain(&current.token_ids()).await;
            self.retry_later();
            return;
        }

        tracing::info!(slug = %round.slug, "Next round pre-subscribed");
        self.retry_at = None;
        self.next = Some(round.clone());
        self.emit(SchedulerEvent::PreSubscribed(round)).await;
    }

    async fn switchover(&mut self, current: Round) {
        if let Some(next) = self.next.take() {
            if let Some(session) = &self.session {
                if let Err(e) = session.unsubscribe(current.token_ids()).await {
                    tracing::warn!(slug = %current.slug, error = %e, "Unsubscribe failed");
                }
            }
            self.store.retain(&next.token_ids()).await;
            telemetry::increment(CounterMetric::RoundSwitches);
            tracing::info!(from = %current.slug, to = %next.slug, "Switched round");
            self.set_current(Some(next.clone()));
            self.emit(SchedulerEvent::Switched {
                from: current.slug,
                to: next,
            })
            .await;
            return;
        }

        if !self.may_retry() {
            return;
        }
        match self.config.fallback {
            SwitchoverFallback::Resubscribe => self.resubscribe(current).await,
            SwitchoverFallback::FailRound => self.fail_round(current).await,
        }
    }

    /// Degraded switchover: drop the stream and start over on the new round
    async fn resubscribe(&mut self, current: Round) {
        let (start, slug) = self.following(&current);
        tracing::warn!(slug = %slug, "Next round not pre-subscribed, resubscribing");

        let round = match self.directory.fetch_round(&slug, start).await {
            Ok(round) => round,
            Err(e) => {
                tracing::warn!(slug = %slug, error = %e, "Fallback fetch failed");
                self.retry_later();
                self.emit(SchedulerEvent::RoundFailed {
                    slug,
                    error: e.to_string(),
                })
                .await;
                return;
            }
        };

        self.close_session().await;
        self.store.reset(&round.token_ids()).await;
        self.set_current(Some(round.clone()));
        telemetry::increment(CounterMetric::RoundFallbacks);

        if let Err(e) = self.open_session(round.token_ids()).await {
            tracing::warn!(slug = %round.slug, error = %e, "Resubscribe failed");
        }
        // at most one rebuild per retry_delay
        self.retry_later();
        self.emit(SchedulerEvent::Fallback(round)).await;
    }

    async fn fail_round(&mut self, current: Round) {
        let (start, slug) = self.following(&current);
        tracing::error!(slug = %slug, "Next round not pre-subscribed, skipping it");

        self.close_session().await;
        self.store.reset(&[]).await;
        self.set_current(None);
        self.resume_after = Some(start);
        self.emit(SchedulerEvent::RoundFailed {
            slug,
            error: "next round was not pre-subscribed before the boundary".into(),
        })
        .await;
    }

    /// With no active round, pick up the round in progress once allowed
    async fn recover(&mut self, now: DateTime<Utc>) {
        let start = align_start(now, self.config.period);
        if self.resume_after.is_some_and(|after| start <= after) || !self.may_retry() {
            return;
        }
        if let Err(e) = self.activate(start).await {
            let slug = round_slug(self.config.symbol, self.config.period, start);
            tracing::warn!(slug = %slug, error = %e, "Round activation failed");
            self.retry_later();
            self.emit(SchedulerEvent::RoundFailed {
                slug,
                error: e.to_string(),
            })
            .await;
        }
    }

    /// Reopen the stream after the session gave up reconnecting
    async fn ensure_session(&mut self) {
        let alive = self.session.as_ref().is_some_and(|s| !s.is_closed());
        if alive || !self.may_retry() {
            return;
        }
        let mut ids = self.current.as_ref().map(Round::token_ids).unwrap_or_default();
        if let Some(next) = &self.next {
            ids.extend(next.token_ids());
        }
        self.close_session().await;
        match self.open_session(ids).await {
            Ok(()) => tracing::info!("Stream session reopened"),
            Err(e) => {
                tracing::warn!(error = %e, "Stream reopen failed");
                self.retry_later();
            }
        }
    }

    async fn shutdown(&mut self) {
        self.close_session().await;
        self.next = None;
        self.set_current(None);
        tracing::info!("Round scheduler stopped");
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::zero())
}

async fn next_stream_event(rx: &mut Option<mpsc::Receiver<StreamEvent>>) -> Option<StreamEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
