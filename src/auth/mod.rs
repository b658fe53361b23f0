//! Request authentication headers
//!
//! Three schemes, all pure functions of time, credentials and request shape:
//! - L1: EIP-712 wallet signature, used to mint or derive API credentials
//! - L2: HMAC-SHA256 over the request with the trader's API secret
//! - Builder: the same HMAC with an integrator key pair, url-safe encoded
//!
//! Build headers right before dispatch; the timestamp is part of the
//! signed content and stale values are rejected server-side.

mod l1;
mod l2;

pub use l2::{builder_headers, decode_secret, hmac_signature, l2_headers};
pub use l1::{clob_auth_digest, l1_headers, CLOB_AUTH_MESSAGE};

use serde::{Deserialize, Serialize};

/// Trader API credentials (L2)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCredentials {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

/// Integrator credentials used by the relayer
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct BuilderCredentials {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

impl std::fmt::Debug for BuilderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuilderCredentials")
            .field("api_key", &self.api_key)
            .finish_non_exhaustive()
    }
}

/// Ordered header list ready to attach to a request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthHeaders(Vec<(&'static str, String)>);

impl AuthHeaders {
    pub(crate) fn push(&mut self, name: &'static str, value: impl Into<String>) {
        self.0.push((name, value.into()));
    }

    /// Look up a header value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(n, v)| (*n, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Attach every header to a request builder
    pub fn apply(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (name, value) in &self.0 {
            request = request.header(*name, value);
        }
        request
    }
}

/// Current unix time in seconds, as used in auth timestamps
pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}
