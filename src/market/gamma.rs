//! Gamma API client for round and market metadata

use super::round::Round;
use super::{MarketLookup, RoundDirectory};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Gamma API base URL
pub const GAMMA_API_URL: &str = "https://gamma-api.polymarket.com";

/// Configuration for the Gamma client
#[derive(Debug, Clone)]
pub struct GammaConfig {
    /// Base URL for the Gamma API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Optional outbound HTTP proxy
    pub proxy: Option<String>,
}

impl Default for GammaConfig {
    fn default() -> Self {
        Self {
            base_url: GAMMA_API_URL.to_string(),
            timeout: Duration::from_secs(30),
            proxy: None,
        }
    }
}

/// Client for Polymarket's Gamma API
#[derive(Debug, Clone)]
pub struct GammaClient {
    config: GammaConfig,
    client: Client,
}

impl GammaClient {
    pub fn new(config: GammaConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(config.timeout);
        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url(proxy))?);
        }
        Ok(Self {
            client: builder.build()?,
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        tracing::debug!(url = %url, "Gamma request");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::from_status(status.as_u16(), body));
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// `GET /events/slug/{slug}`
    pub async fn event_by_slug(&self, slug: &str) -> Result<GammaEvent> {
        self.get_json(&format!("/events/slug/{slug}")).await
    }

    /// `GET /markets/slug/{slug}`
    pub async fn market_by_slug(&self, slug: &str) -> Result<GammaMarket> {
        self.get_json(&format!("/markets/slug/{slug}")).await
    }

    /// Resolve a polymarket.com event/market URL to its market
    pub async fn market_by_url(&self, market_url: &str) -> Result<GammaMarket> {
        let slug = parse_market_slug(market_url)?;
        self.market_by_slug(&slug).await
    }
}

#[async_trait]
impl MarketLookup for GammaClient {
    async fn market_by_url(&self, market_url: &str) -> Result<GammaMarket> {
        GammaClient::market_by_url(self, market_url).await
    }
}

#[async_trait]
impl RoundDirectory for GammaClient {
    async fn fetch_round(&self, slug: &str, start: DateTime<Utc>) -> Result<Round> {
        let event = self.event_by_slug(slug).await?;
        round_from_event(slug, start, event)
    }
}

/// Turn an event response into a round
///
/// The first market carries the token pair. The event end date wins over the
/// market's; neither being parseable is an error.
pub fn round_from_event(slug: &str, start: DateTime<Utc>, event: GammaEvent) -> Result<Round> {
    let market = event
        .markets
        .into_iter()
        .next()
        .ok_or_else(|| Error::Round(format!("{slug}: event has no markets")))?;

    let ids = parse_token_ids(market.clob_token_ids.as_deref().unwrap_or_default())?;
    if ids.len() < 2 {
        return Err(Error::Round(format!(
            "{slug}: expected 2 token ids, got {}",
            ids.len()
        )));
    }

    let end = event
        .end_date
        .or(market.end_date)
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::Round(format!("{slug}: missing or invalid endDate")))?;

    let mut ids = ids.into_iter();
    let (up, down) = match (ids.next(), ids.next()) {
        (Some(up), Some(down)) => (up, down),
        _ => return Err(Error::Round(format!("{slug}: token ids missing"))),
    };
    Round::new(slug, up, down, start, end)
}

/// Event response from `/events/slug`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaEvent {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub markets: Vec<GammaMarket>,
}

/// Market response from Gamma API
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GammaMarket {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub condition_id: String,
    /// CLOB token IDs as a JSON-encoded string array
    #[serde(default)]
    pub clob_token_ids: Option<String>,
    #[serde(default)]
    pub order_price_min_tick_size: Option<Decimal>,
    #[serde(default)]
    pub neg_risk: bool,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub closed: bool,
}

impl GammaMarket {
    /// Token ids, YES/UP first
    pub fn token_ids(&self) -> Result<Vec<String>> {
        parse_token_ids(self.clob_token_ids.as_deref().unwrap_or_default())
    }
}

/// Parse CLOB token IDs from their JSON string form
///
/// Format: `"[\"token1\", \"token2\"]"`. An empty string yields no ids.
pub fn parse_token_ids(token_ids: &str) -> Result<Vec<String>> {
    if token_ids.trim().is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<String> = serde_json::from_str(token_ids)?;
    Ok(ids.into_iter().filter(|id| !id.is_empty()).collect())
}

/// Extract the market slug from a polymarket.com URL
///
/// `/event/{event}/{market}` yields the market; `/event/{event}` yields the event.
pub fn parse_market_slug(market_url: &str) -> Result<String> {
    let parsed = url::Url::parse(market_url)
        .map_err(|e| Error::Config(format!("invalid market URL {market_url}: {e}")))?;
    let parts: Vec<&str> = parsed
        .path()
        .trim_matches('/')
        .split('/')
        .filter(|p| !p.is_empty())
        .collect();
    match parts.as_slice() {
        ["event", _, market, ..] => Ok(market.to_string()),
        ["event", event] => Ok(event.to_string()),
        _ => Err(Error::Config(format!(
            "invalid market URL format: {market_url}"
        ))),
    }
}

/// Accept `host:port` as shorthand for an HTTP proxy
pub(crate) fn proxy_url(proxy: &str) -> String {
    if proxy.contains("://") {
        proxy.to_string()
    } else {
        format!("http://{proxy}")
    }
}
