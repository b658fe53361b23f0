//! Error types shared by the trading core

use crate::ws::WsError;

/// Errors surfaced by the library
///
/// Only [`Error::Transient`] and stream disconnects are recovered locally;
/// everything else is returned to the caller with its context.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP 429 or 5xx that outlived the retry budget
    #[error("HTTP {status}: {body}")]
    Transient { status: u16, body: String },

    /// HTTP 4xx validation failure from the exchange
    #[error("HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Transport failure before a status line was received
    #[error("HTTP transport: {0}")]
    Http(#[from] reqwest::Error),

    /// Missing or unusable credentials
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Private key could not be parsed or used
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Price, size or computed amount is not positive after rounding
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Order record failed local validation
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// Stream session failure
    #[error("stream: {0}")]
    Stream(#[from] WsError),

    /// Response body did not match the expected shape
    #[error("decode: {0}")]
    Decode(#[from] serde_json::Error),

    /// Bad configuration or input file
    #[error("config: {0}")]
    Config(String),

    /// Round metadata could not be resolved
    #[error("round: {0}")]
    Round(String),

    /// A hedge run ended without a fill
    #[error("hedge: {0}")]
    Hedge(String),

    /// JSON-RPC node error
    #[error("rpc: {0}")]
    Rpc(String),

    /// Work aborted by a cancellation signal
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Whether a retry may succeed without changing the request
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient { .. } | Error::Http(_))
    }

    /// Map a non-success HTTP status into the right error class
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            401 | 403 => Error::Auth(format!("HTTP {status}: {body}")),
            429 | 500.. => Error::Transient { status, body },
            _ => Error::Rejected { status, body },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
