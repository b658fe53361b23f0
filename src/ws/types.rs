//! WebSocket types and configuration

use std::fmt;
use std::time::Duration;

/// Default market-data WebSocket base URL
pub const DEFAULT_WS_BASE_URL: &str = "wss://ws-subscriptions-clob.polymarket.com";

/// Stream session configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Base URL; the channel path (`/ws/market`, `/ws/user`) is appended
    pub base_url: String,
    /// Interval between text "PING" heartbeats
    pub ping_interval: Duration,
    /// Base delay; attempt `n` waits `n * reconnect_delay`
    pub reconnect_delay: Duration,
    /// Reconnect attempts before the session gives up
    pub max_reconnect_attempts: u32,
    /// Timeout for the WebSocket handshake
    pub handshake_timeout: Duration,
    /// Capacity of the event channel handed to the caller
    pub buffer_size: usize,
    /// Trade ids remembered for deduplication
    pub dedup_capacity: usize,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_WS_BASE_URL.to_string(),
            ping_interval: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(5),
            max_reconnect_attempts: 10,
            handshake_timeout: Duration::from_secs(10),
            buffer_size: 1024,
            dedup_capacity: 4096,
        }
    }
}

impl WsConfig {
    /// Create a new config with the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set maximum reconnection attempts
    pub fn max_reconnects(mut self, n: u32) -> Self {
        self.max_reconnect_attempts = n;
        self
    }

    /// Set the linear backoff step
    pub fn reconnect_delay(mut self, d: Duration) -> Self {
        self.reconnect_delay = d;
        self
    }

    /// Set ping interval
    pub fn ping_interval(mut self, d: Duration) -> Self {
        self.ping_interval = d;
        self
    }

    pub fn buffer_size(mut self, n: usize) -> Self {
        self.buffer_size = n;
        self
    }

    pub fn dedup_capacity(mut self, n: usize) -> Self {
        self.dedup_capacity = n;
        self
    }

    /// Wait before reconnect attempt `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.reconnect_delay * attempt
    }

    /// Full URL for a channel
    pub fn endpoint(&self, channel: Channel) -> String {
        format!(
            "{}/ws/{}",
            self.base_url.trim_end_matches('/'),
            channel.as_str()
        )
    }
}

/// Feed channel a session is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Public order-book data
    Market,
    /// Authenticated order and trade updates
    User,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Market => "market",
            Channel::User => "user",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session lifecycle
///
/// `Disconnected -> Connecting -> Subscribed -> (Active <-> Reconnecting) -> Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Subscribed,
    Active,
    Reconnecting,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Subscribed => "subscribed",
            SessionState::Active => "active",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Closed => "closed",
        }
    }
}

/// WebSocket errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsError {
    /// Connection failed
    ConnectionFailed(String),
    /// Maximum reconnection attempts exceeded
    MaxReconnectsExceeded(u32),
    /// Session was closed by the caller
    Closed,
    /// Send failed
    SendFailed(String),
    /// Control frame sent outside the Active state
    NotActive(SessionState),
    /// Dynamic subscription requested on the user channel
    UnsupportedChannel(Channel),
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WsError::ConnectionFailed(e) => write!(f, "Connection failed: {}", e),
            WsError::MaxReconnectsExceeded(n) => {
                write!(f, "Maximum reconnection attempts exceeded ({})", n)
            }
            WsError::Closed => write!(f, "Session closed"),
            WsError::SendFailed(e) => write!(f, "Send failed: {}", e),
            WsError::NotActive(state) => {
                write!(f, "Session not active (state: {})", state.as_str())
            }
            WsError::UnsupportedChannel(ch) => {
                write!(f, "Dynamic subscription not supported on {} channel", ch)
            }
        }
    }
}

impl std::error::Error for WsError {}
