//! Exchange REST client with L1/L2 authentication and retries

use super::types::{
    BookSummary, CancelRequest, CancelResponse, NegRiskResponse, OpenOrder, OrderResponse,
    OrderType, PostOrderRequest, TickSizeResponse, CLOB_API_URL,
};
use super::Exchange;
use crate::auth::{self, l1_headers, l2_headers, ApiCredentials, AuthHeaders};
use crate::error::{Error, Result};
use crate::market::proxy_url;
use crate::signing::{LimitOrderArgs, OrderOptions, OrderSigner, SignedOrder, TickSize};
use crate::telemetry::{self, CounterMetric, LatencyMetric};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};

/// Exchange client configuration
#[derive(Debug, Clone)]
pub struct ClobConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// Extra attempts after the first for 429/5xx and transport errors
    pub retry_count: u32,
    /// Optional outbound HTTP proxy (`host:port` or URL)
    pub proxy: Option<String>,
}

impl Default for ClobConfig {
    fn default() -> Self {
        Self {
            base_url: CLOB_API_URL.to_string(),
            timeout: Duration::from_secs(30),
            retry_count: 2,
            proxy: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Auth {
    None,
    L1 { nonce: u64 },
    L2,
}

/// Client for one trading identity
pub struct ClobClient {
    config: ClobConfig,
    http: Client,
    signer: OrderSigner,
    creds: Option<ApiCredentials>,
}

impl std::fmt::Debug for ClobClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClobClient")
            .field("base_url", &self.config.base_url)
            .field("signer", &self.signer)
            .field("has_credentials", &self.creds.is_some())
            .finish()
    }
}

impl ClobClient {
    pub fn new(config: ClobConfig, signer: OrderSigner) -> Result<Self> {
        let mut builder = Client::builder().timeout(config.timeout);
        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url(proxy))?);
        }
        Ok(Self {
            http: builder.build()?,
            config,
            signer,
            creds: None,
        })
    }

    pub fn with_credentials(mut self, creds: ApiCredentials) -> Self {
        self.creds = Some(creds);
        self
    }

    pub fn credentials(&self) -> Option<&ApiCredentials> {
        self.creds.as_ref()
    }

    pub fn signer(&self) -> &OrderSigner {
        &self.signer
    }

    fn headers(&self, auth: Auth, method: &Method, path: &str, body: &str) -> Result<AuthHeaders> {
        let timestamp = auth::unix_timestamp();
        match auth {
            Auth::None => Ok(AuthHeaders::default()),
            Auth::L1 { nonce } => {
                l1_headers(self.signer.key(), self.signer.chain_id(), timestamp, nonce)
            }
            Auth::L2 => {
                let creds = self
                    .creds
                    .as_ref()
                    .ok_or_else(|| Error::Auth("API credentials not set".into()))?;
                l2_headers(
                    self.signer.address(),
                    creds,
                    timestamp,
                    method.as_str(),
                    path,
                    body,
                )
            }
        }
    }

    /// Send one request with the retry policy; returns the raw body
    ///
    /// Auth headers are rebuilt per attempt so the signed timestamp stays fresh.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        auth: Auth,
    ) -> Result<String> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let retries = self.config.retry_count;
        let mut attempt = 0u32;

        loop {
            let payload = body.as_deref().unwrap_or_default();
            let headers = self.headers(auth, &method, path, payload)?;
            let mut request = self
                .http
                .request(method.clone(), &url)
                .header("Accept", "application/json");
            if let Some(body) = &body {
                request = request
                    .header("Content-Type", "application/json")
                    .body(body.clone());
            }
            request = headers.apply(request);

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) if attempt < retries => {
                    attempt += 1;
                    let delay = Duration::from_millis(500 * u64::from(attempt));
                    tracing::warn!(path, attempt, error = %e, "Transport error, retrying");
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();
            let text = response.text().await?;
            if status.is_success() {
                return Ok(text);
            }

            let err = Error::from_status(status.as_u16(), text);
            if err.is_retryable() && attempt < retries {
                attempt += 1;
                tracing::warn!(path, attempt, status = status.as_u16(), "Retryable status");
                tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
                continue;
            }
            return Err(err);
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        auth: Auth,
    ) -> Result<T> {
        let text = self.send(method, path, body, auth).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// `POST /auth/api-key`
    pub async fn create_api_key(&self, nonce: u64) -> Result<ApiCredentials> {
        self.call(Method::POST, "/auth/api-key", None, Auth::L1 { nonce })
            .await
    }

    /// `GET /auth/derive-api-key`
    pub async fn derive_api_key(&self, nonce: u64) -> Result<ApiCredentials> {
        self.call(Method::GET, "/auth/derive-api-key", None, Auth::L1 { nonce })
            .await
    }

    /// Create credentials, falling back to deriving existing ones (nonce 0)
    pub async fn create_or_derive_api_key(&self) -> Result<ApiCredentials> {
        match self.create_api_key(0).await {
            Ok(creds) if !creds.api_key.is_empty() => return Ok(creds),
            Ok(_) => tracing::debug!("Create returned no key, deriving"),
            Err(e) => tracing::debug!(error = %e, "Create api key failed, deriving"),
        }
        let creds = self.derive_api_key(0).await?;
        if creds.api_key.is_empty() {
            return Err(Error::Auth("derived credentials are empty".into()));
        }
        Ok(creds)
    }

    /// `GET /book`
    pub async fn order_book(&self, token_id: &str) -> Result<BookSummary> {
        self.call(Method::GET, &format!("/book?token_id={token_id}"), None, Auth::None)
            .await
    }

    /// `GET /tick-size`
    pub async fn tick_size(&self, token_id: &str) -> Result<TickSize> {
        let resp: TickSizeResponse = self
            .call(Method::GET, &format!("/tick-size?token_id={token_id}"), None, Auth::None)
            .await?;
        Ok(TickSize::from_decimal(resp.minimum_tick_size))
    }

    /// `GET /neg-risk`
    pub async fn neg_risk(&self, token_id: &str) -> Result<bool> {
        let resp: NegRiskResponse = self
            .call(Method::GET, &format!("/neg-risk?token_id={token_id}"), None, Auth::None)
            .await?;
        Ok(resp.neg_risk)
    }

    /// `POST /order`
    ///
    /// A 2xx response with `success: false` is treated as a rejection.
    pub async fn post_order(
        &self,
        order: &SignedOrder,
        order_type: OrderType,
    ) -> Result<OrderResponse> {
        order.validate()?;
        let owner = self
            .creds
            .as_ref()
            .map(|c| c.api_key.as_str())
            .ok_or_else(|| Error::Auth("API credentials not set".into()))?;
        let body = serde_json::to_string(&PostOrderRequest {
            order,
            owner,
            order_type,
        })?;

        let started = Instant::now();
        let resp: OrderResponse = self.call(Method::POST, "/order", Some(body), Auth::L2).await?;
        telemetry::record_latency(LatencyMetric::OrderSubmission, started.elapsed());

        if !resp.success || resp.order_id.is_empty() {
            return Err(Error::Rejected {
                status: 200,
                body: if resp.error_msg.is_empty() {
                    "order not accepted".to_string()
                } else {
                    resp.error_msg
                },
            });
        }
        telemetry::increment(CounterMetric::OrdersSubmitted);
        tracing::info!(order_id = %resp.order_id, status = %resp.status, "Order posted");
        Ok(resp)
    }

    /// `GET /data/order/{id}`
    pub async fn get_order(&self, order_id: &str) -> Result<OpenOrder> {
        self.call(Method::GET, &format!("/data/order/{order_id}"), None, Auth::L2)
            .await
    }

    /// `DELETE /orders`
    pub async fn cancel_orders(&self, order_ids: &[String]) -> Result<CancelResponse> {
        let body = serde_json::to_string(&CancelRequest { ids: order_ids })?;
        let resp: CancelResponse = self
            .call(Method::DELETE, "/orders", Some(body), Auth::L2)
            .await?;
        for _ in &resp.canceled {
            telemetry::increment(CounterMetric::OrdersCancelled);
        }
        tracing::info!(
            canceled = resp.canceled.len(),
            not_canceled = resp.not_canceled.len(),
            "Orders cancelled"
        );
        Ok(resp)
    }
}

#[async_trait]
impl Exchange for ClobClient {
    async fn order_book(&self, token_id: &str) -> Result<BookSummary> {
        ClobClient::order_book(self, token_id).await
    }

    async fn tick_size(&self, token_id: &str) -> Result<TickSize> {
        ClobClient::tick_size(self, token_id).await
    }

    async fn neg_risk(&self, token_id: &str) -> Result<bool> {
        ClobClient::neg_risk(self, token_id).await
    }

    async fn place_limit_order(
        &self,
        args: &LimitOrderArgs,
        options: OrderOptions,
        order_type: OrderType,
    ) -> Result<OrderResponse> {
        let order = self.signer.build_limit_order(args, options)?;
        self.post_order(&order, order_type).await
    }

    async fn get_order(&self, order_id: &str) -> Result<OpenOrder> {
        ClobClient::get_order(self, order_id).await
    }

    async fn cancel_orders(&self, order_ids: &[String]) -> Result<CancelResponse> {
        ClobClient::cancel_orders(self, order_ids).await
    }
}
