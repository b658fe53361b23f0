//! Resilient WebSocket session
//!
//! One session owns one socket. A background task drives the read loop,
//! the text heartbeat and the reconnect timer; the caller drains
//! [`StreamEvent`]s from a channel in arrival order and sends dynamic
//! subscription changes through [`StreamSession::subscribe`] /
//! [`StreamSession::unsubscribe`].

use super::dedup::TradeDedup;
use super::messages::{
    parse_market_frame, parse_user_frame, ControlRequest, MarketEvent, Operation, Subscription,
    UserEvent,
};
use super::types::{Channel, SessionState, WsConfig, WsError};
use crate::telemetry::{self, CounterMetric};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Writer = SplitSink<Socket, Message>;

/// Everything the session reports to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Socket open and subscription payload sent
    Connected,
    /// Connection lost without the caller asking
    Disconnected { reason: String },
    /// Waiting `delay` before reconnect attempt `attempt`
    Reconnecting { attempt: u32, delay: Duration },
    Market(MarketEvent),
    User(UserEvent),
    /// Terminal failure; no further attempts will be made
    Failed(WsError),
    /// Session stopped, last event on the channel
    Closed,
}

/// Handle to a running stream session
pub struct StreamSession {
    channel: Channel,
    state: Arc<watch::Sender<SessionState>>,
    control_tx: mpsc::Sender<ControlRequest>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamSession {
    /// Connect, send the subscription payload and start the background task
    ///
    /// The first connection is established before returning; a failure here
    /// is reported directly rather than retried.
    pub async fn connect(
        config: WsConfig,
        subscription: Subscription,
    ) -> Result<(Self, mpsc::Receiver<StreamEvent>), WsError> {
        let channel = match &subscription {
            Subscription::Market { assets_ids } if assets_ids.is_empty() => {
                return Err(WsError::ConnectionFailed(
                    "no instruments to subscribe".into(),
                ));
            }
            Subscription::Market { .. } => Channel::Market,
            Subscription::User { .. } => Channel::User,
        };

        let (state, _) = watch::channel(SessionState::Disconnected);
        let state = Arc::new(state);

        state.send_replace(SessionState::Connecting);
        let socket = match open(&config, channel, &subscription).await {
            Ok(socket) => socket,
            Err(e) => {
                state.send_replace(SessionState::Closed);
                return Err(e);
            }
        };
        state.send_replace(SessionState::Subscribed);

        let (event_tx, event_rx) = mpsc::channel(config.buffer_size.max(1));
        let (control_tx, control_rx) = mpsc::channel(256);
        let cancel = CancellationToken::new();

        let driver = Driver {
            dedup: TradeDedup::new(config.dedup_capacity),
            config,
            channel,
            subscription,
            state: state.clone(),
            events: event_tx,
            control: control_rx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(driver.run(socket));

        Ok((
            Self {
                channel,
                state,
                control_tx,
                cancel,
                task: Mutex::new(Some(task)),
            },
            event_rx,
        ))
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch lifecycle transitions
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Add instruments to a live market-channel session
    pub async fn subscribe(&self, assets_ids: Vec<String>) -> Result<(), WsError> {
        self.control(assets_ids, Operation::Subscribe).await
    }

    /// Remove instruments from a live market-channel session
    pub async fn unsubscribe(&self, assets_ids: Vec<String>) -> Result<(), WsError> {
        self.control(assets_ids, Operation::Unsubscribe).await
    }

    async fn control(&self, assets_ids: Vec<String>, operation: Operation) -> Result<(), WsError> {
        if self.channel != Channel::Market {
            return Err(WsError::UnsupportedChannel(self.channel));
        }
        let state = self.state();
        if state != SessionState::Active {
            return Err(WsError::NotActive(state));
        }
        self.control_tx
            .send(ControlRequest {
                assets_ids,
                operation,
            })
            .await
            .map_err(|_| WsError::Closed)
    }

    /// Stop the session and wait for its task to finish
    ///
    /// Safe to call from any state and more than once.
    pub async fn close(&self) {
        self.cancel.cancel();
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Stream task ended abnormally");
            }
            tracing::info!(channel = %self.channel, "Stream session closed");
        }
        self.state.send_replace(SessionState::Closed);
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Dial the channel endpoint and send the subscription payload
async fn open(
    config: &WsConfig,
    channel: Channel,
    subscription: &Subscription,
) -> Result<Socket, WsError> {
    let url = config.endpoint(channel);
    tracing::info!(url = %url, "Connecting to WebSocket");

    let (mut socket, _response) = tokio::time::timeout(config.handshake_timeout, connect_async(&url))
        .await
        .map_err(|_| WsError::ConnectionFailed("handshake timed out".into()))?
        .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

    let payload =
        serde_json::to_string(subscription).map_err(|e| WsError::SendFailed(e.to_string()))?;
    socket
        .send(Message::Text(payload))
        .await
        .map_err(|e| WsError::SendFailed(e.to_string()))?;

    tracing::info!(channel = %channel, "WebSocket connected and subscribed");
    Ok(socket)
}

/// Why a connection stopped streaming
enum Exit {
    Cancelled,
    ReceiverGone,
    Lost(String),
}

struct Driver {
    config: WsConfig,
    channel: Channel,
    subscription: Subscription,
    state: Arc<watch::Sender<SessionState>>,
    events: mpsc::Sender<StreamEvent>,
    control: mpsc::Receiver<ControlRequest>,
    cancel: CancellationToken,
    dedup: TradeDedup,
}

impl Driver {
    async fn run(mut self, mut socket: Socket) {
        loop {
            self.state.send_replace(SessionState::Active);
            if self.emit(StreamEvent::Connected).await.is_err() {
                break;
            }

            let reason = match self.stream(socket).await {
                Exit::Cancelled | Exit::ReceiverGone => break,
                Exit::Lost(reason) => reason,
            };
            tracing::warn!(channel = %self.channel, reason = %reason, "WebSocket connection lost");
            if self
                .emit(StreamEvent::Disconnected { reason })
                .await
                .is_err()
            {
                break;
            }

            match self.reconnect().await {
                Some(next) => socket = next,
                None => break,
            }
        }

        self.state.send_replace(SessionState::Closed);
        let _ = self.events.try_send(StreamEvent::Closed);
    }

    async fn emit(&self, event: StreamEvent) -> Result<(), Exit> {
        tokio::select! {
            sent = self.events.send(event) => sent.map_err(|_| Exit::ReceiverGone),
            () = self.cancel.cancelled() => Err(Exit::Cancelled),
        }
    }

    /// Pump one connection until it fails or the session stops
    async fn stream(&mut self, socket: Socket) -> Exit {
        let (mut write, mut read) = socket.split();

        let period = self.config.ping_interval.max(Duration::from_millis(1));
        let mut ping = interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Exit::Cancelled;
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(exit) = self.handle_text(&text, &mut write).await {
                                return exit;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            if let Err(e) = write.send(Message::Pong(data)).await {
                                return Exit::Lost(e.to_string());
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|f| format!("closed by server: {} {}", u16::from(f.code), f.reason))
                                .unwrap_or_else(|| "closed by server".to_string());
                            return Exit::Lost(reason);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Exit::Lost(e.to_string()),
                        None => return Exit::Lost("stream ended unexpectedly".into()),
                    }
                }

                req = self.control.recv() => {
                    let Some(req) = req else {
                        // session handle dropped
                        return Exit::Cancelled;
                    };
                    let payload = match serde_json::to_string(&req) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to encode control frame");
                            continue;
                        }
                    };
                    if let Err(e) = write.send(Message::Text(payload)).await {
                        return Exit::Lost(e.to_string());
                    }
                    tracing::info!(
                        operation = ?req.operation,
                        count = req.assets_ids.len(),
                        "Sent subscription change"
                    );
                    self.track(&req);
                }

                _ = ping.tick() => {
                    if let Err(e) = write.send(Message::Text("PING".into())).await {
                        return Exit::Lost(e.to_string());
                    }
                }
            }
        }
    }

    async fn handle_text(&mut self, text: &str, write: &mut Writer) -> Result<(), Exit> {
        match text {
            "PING" => {
                return write
                    .send(Message::Text("PONG".into()))
                    .await
                    .map_err(|e| Exit::Lost(e.to_string()));
            }
            "PONG" => return Ok(()),
            _ => {}
        }

        match self.channel {
            Channel::Market => {
                let events = match parse_market_frame(text) {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            preview = %text.chars().take(100).collect::<String>(),
                            "Failed to parse market frame"
                        );
                        return Ok(());
                    }
                };
                for event in events {
                    self.emit(StreamEvent::Market(event)).await?;
                }
            }
            Channel::User => {
                let events = match parse_user_frame(text) {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to parse user frame");
                        return Ok(());
                    }
                };
                for event in events {
                    if let UserEvent::Trade(trade) = &event {
                        if let Some(id) = trade.dedup_key() {
                            if !self.dedup.insert(id) {
                                tracing::debug!(trade_id = id, "Dropping duplicate trade");
                                continue;
                            }
                        }
                    }
                    self.emit(StreamEvent::User(event)).await?;
                }
            }
        }
        Ok(())
    }

    /// Keep the reconnect payload in step with dynamic changes
    fn track(&mut self, req: &ControlRequest) {
        let Subscription::Market { assets_ids } = &mut self.subscription else {
            return;
        };
        match req.operation {
            Operation::Subscribe => {
                for id in &req.assets_ids {
                    if !assets_ids.contains(id) {
                        assets_ids.push(id.clone());
                    }
                }
            }
            Operation::Unsubscribe => assets_ids.retain(|id| !req.assets_ids.contains(id)),
        }
    }

    /// Linear backoff: attempt `n` waits `n * reconnect_delay`
    async fn reconnect(&mut self) -> Option<Socket> {
        let max = self.config.max_reconnect_attempts;

        for attempt in 1..=max {
            let delay = self.config.backoff(attempt);
            self.state.send_replace(SessionState::Reconnecting);
            telemetry::increment(CounterMetric::WsReconnects);
            tracing::info!(
                channel = %self.channel,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "WebSocket reconnecting"
            );
            if self
                .emit(StreamEvent::Reconnecting { attempt, delay })
                .await
                .is_err()
            {
                return None;
            }

            tokio::select! {
                () = self.cancel.cancelled() => return None,
                () = tokio::time::sleep(delay) => {}
            }

            self.state.send_replace(SessionState::Connecting);
            let opened = tokio::select! {
                () = self.cancel.cancelled() => return None,
                opened = open(&self.config, self.channel, &self.subscription) => opened,
            };
            match opened {
                Ok(socket) => {
                    self.state.send_replace(SessionState::Subscribed);
                    return Some(socket);
                }
                Err(e) => tracing::warn!(error = %e, attempt, "Reconnect attempt failed"),
            }
        }

        tracing::error!(attempts = max, "Max reconnection attempts reached");
        let _ = self
            .emit(StreamEvent::Failed(WsError::MaxReconnectsExceeded(max)))
            .await;
        None
    }
}
