//! Relayer and Polygon RPC client for one Safe-backed account

use super::safe::{
    aggregate, allowance_calldata, approve_calldata, balance_of_calldata, decode_bool,
    decode_uint, derive_safe_address, is_approved_for_all_calldata,
    set_approval_for_all_calldata, safe_tx_digest, sign_safe_digest, SafeTransaction,
};
use super::{AccountStatus, TransactionResult, Wallet};
use crate::auth::{self, builder_headers, BuilderCredentials};
use crate::error::{Error, Result};
use crate::market::proxy_url;
use crate::signing::contracts::{
    COLLATERAL, CONDITIONAL_TOKENS, CTF_EXCHANGE, NEG_RISK_ADAPTER, NEG_RISK_CTF_EXCHANGE,
    POLYGON_CHAIN_ID, TOKEN_DECIMALS,
};
use crate::signing::parse_private_key;
use alloy::primitives::{Address, Bytes, U256};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const RELAYER_URL: &str = "https://relayer-v2.polymarket.com/";
pub const POLYGON_RPC_URL: &str = "https://polygon-rpc.com";

const APPROVE_ALL_METADATA: &str = "approveAllTokens";

#[derive(Debug, Clone)]
pub struct RelayerConfig {
    pub relayer_url: String,
    pub rpc_url: String,
    pub timeout: Duration,
    /// Optional outbound HTTP proxy (`host:port` or URL)
    pub proxy: Option<String>,
    /// Integrator credentials; required for submitting transactions
    pub builder: Option<BuilderCredentials>,
    pub chain_id: u64,
}

impl Default for RelayerConfig {
    fn default() -> Self {
        Self {
            relayer_url: RELAYER_URL.to_string(),
            rpc_url: POLYGON_RPC_URL.to_string(),
            timeout: Duration::from_secs(60),
            proxy: None,
            builder: None,
            chain_id: POLYGON_CHAIN_ID,
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    method: &'static str,
    params: Vec<serde_json::Value>,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<String>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct NonceResponse {
    nonce: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct DeployedResponse {
    deployed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignatureParams {
    gas_price: &'static str,
    operation: String,
    safe_txn_gas: &'static str,
    base_gas: &'static str,
    gas_token: String,
    refund_receiver: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRequest {
    from: String,
    to: String,
    proxy_wallet: String,
    data: String,
    nonce: String,
    signature: String,
    signature_params: SignatureParams,
    #[serde(rename = "type")]
    kind: &'static str,
    metadata: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    #[serde(default, rename = "transactionID")]
    transaction_id: String,
    #[serde(default, rename = "transactionHash")]
    transaction_hash: String,
    #[serde(default)]
    state: String,
}

/// Nonce arrives as a JSON number or a decimal string
fn parse_nonce(value: &serde_json::Value) -> Result<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| Error::Rpc(format!("unexpected nonce value: {value}")))
}

/// Base units with 6 decimals to a decimal amount
fn from_units(units: U256) -> Result<Decimal> {
    let raw = i128::try_from(units)
        .map_err(|_| Error::Rpc(format!("amount {units} out of range")))?;
    Decimal::try_from_i128_with_scale(raw, TOKEN_DECIMALS)
        .map_err(|e| Error::Rpc(format!("amount {units} out of range: {e}")))
}

/// Wallet collaborator backed by a Gnosis Safe and the Polymarket relayer
pub struct RelayerClient {
    config: RelayerConfig,
    http: Client,
    key: PrivateKeySigner,
    safe: Address,
}

impl std::fmt::Debug for RelayerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayerClient")
            .field("owner", &self.key.address())
            .field("safe", &self.safe)
            .finish_non_exhaustive()
    }
}

impl RelayerClient {
    pub fn new(config: RelayerConfig, private_key: &str) -> Result<Self> {
        let key = parse_private_key(private_key)?;
        let mut builder = Client::builder().timeout(config.timeout);
        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url(proxy))?);
        }
        Ok(Self {
            http: builder.build()?,
            safe: derive_safe_address(key.address()),
            key,
            config,
        })
    }

    fn relayer_url(&self, path: &str) -> String {
        format!("{}{}", self.config.relayer_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.http.get(self.relayer_url(path)).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::from_status(status.as_u16(), text));
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// `eth_call` against the latest block
    pub async fn eth_call(&self, to: Address, data: &Bytes) -> Result<Vec<u8>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method: "eth_call",
            params: vec![
                serde_json::json!({ "to": to.to_checksum(None), "data": data.to_string() }),
                serde_json::json!("latest"),
            ],
            id: 1,
        };
        tracing::debug!(%to, "eth_call");

        let response = self.http.post(&self.config.rpc_url).json(&request).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::from_status(status.as_u16(), text));
        }

        let rpc: JsonRpcResponse = serde_json::from_str(&text)?;
        if let Some(error) = rpc.error {
            return Err(Error::Rpc(error.message));
        }
        let result = rpc
            .result
            .ok_or_else(|| Error::Rpc("no result in RPC response".into()))?;
        let hex_str = result.strip_prefix("0x").unwrap_or(&result);
        hex::decode(hex_str).map_err(|e| Error::Rpc(format!("bad result hex: {e}")))
    }

    async fn allowance(&self, spender: Address) -> U256 {
        match self
            .eth_call(COLLATERAL, &allowance_calldata(self.safe, spender))
            .await
        {
            Ok(result) => decode_uint(&result),
            Err(e) => {
                tracing::warn!(safe = %self.safe, %spender, error = %e, "Allowance lookup failed");
                U256::ZERO
            }
        }
    }

    async fn approved_for_all(&self, operator: Address) -> bool {
        match self
            .eth_call(
                CONDITIONAL_TOKENS,
                &is_approved_for_all_calldata(self.safe, operator),
            )
            .await
        {
            Ok(result) => decode_bool(&result),
            Err(e) => {
                tracing::warn!(safe = %self.safe, %operator, error = %e, "Approval lookup failed");
                false
            }
        }
    }

    /// `GET /deployed?address={safe}`
    pub async fn is_deployed(&self) -> Result<bool> {
        let resp: DeployedResponse = self
            .get_json(&format!("/deployed?address={}", self.safe.to_checksum(None)))
            .await?;
        Ok(resp.deployed)
    }

    /// `GET /nonce?address={owner}&type=SAFE`
    pub async fn nonce(&self) -> Result<u64> {
        let resp: NonceResponse = self
            .get_json(&format!(
                "/nonce?address={}&type=SAFE",
                self.key.address().to_checksum(None)
            ))
            .await?;
        parse_nonce(&resp.nonce)
    }

    async fn submit(&self, body: String) -> Result<SubmitResponse> {
        let creds = self
            .config
            .builder
            .as_ref()
            .ok_or_else(|| Error::Auth("builder credentials not configured".into()))?;
        let path = "/submit";
        let headers = builder_headers(creds, auth::unix_timestamp(), "POST", path, &body)?;
        let request = self
            .http
            .post(self.relayer_url(path))
            .header("Content-Type", "application/json")
            .body(body);
        let response = headers.apply(request).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(Error::from_status(status.as_u16(), text));
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Sign a batch as one Safe transaction and hand it to the relayer
    pub async fn execute(
        &self,
        txns: &[SafeTransaction],
        metadata: &str,
    ) -> Result<TransactionResult> {
        if self.config.builder.is_none() {
            return Err(Error::Auth("builder credentials not configured".into()));
        }
        if !self.is_deployed().await? {
            return Err(Error::Config(format!("Safe {} is not deployed", self.safe)));
        }
        let nonce = self.nonce().await?;

        let tx = aggregate(txns)?;
        let digest = safe_tx_digest(&tx, nonce, self.config.chain_id, self.safe);
        let signature = sign_safe_digest(&self.key, digest)?;

        let zero = Address::ZERO.to_checksum(None);
        let body = serde_json::to_string(&SubmitRequest {
            from: self.key.address().to_checksum(None),
            to: tx.to.to_checksum(None),
            proxy_wallet: self.safe.to_checksum(None),
            data: tx.data.to_string(),
            nonce: nonce.to_string(),
            signature,
            signature_params: SignatureParams {
                gas_price: "0",
                operation: tx.operation.as_u8().to_string(),
                safe_txn_gas: "0",
                base_gas: "0",
                gas_token: zero.clone(),
                refund_receiver: zero,
            },
            kind: "SAFE",
            metadata: metadata.to_string(),
        })?;

        let resp = self.submit(body).await?;
        let result = TransactionResult {
            hash: resp.transaction_hash,
            transaction_id: resp.transaction_id,
            state: resp.state,
        };
        tracing::info!(
            safe = %self.safe,
            nonce,
            txns = txns.len(),
            transaction_id = %result.transaction_id,
            state = %result.state,
            "Safe transaction submitted"
        );
        if result.is_failed() {
            return Err(Error::Rejected {
                status: 200,
                body: format!("relayer transaction {} {}", result.transaction_id, result.state),
            });
        }
        Ok(result)
    }
}

/// USDC approvals for every spender plus CTF operator approvals
pub fn approve_all_transactions() -> Vec<SafeTransaction> {
    let mut txns: Vec<SafeTransaction> = [
        CONDITIONAL_TOKENS,
        CTF_EXCHANGE,
        NEG_RISK_ADAPTER,
        NEG_RISK_CTF_EXCHANGE,
    ]
    .into_iter()
    .map(|spender| SafeTransaction::call(COLLATERAL, approve_calldata(spender, U256::MAX)))
    .collect();
    txns.extend(
        [CTF_EXCHANGE, NEG_RISK_ADAPTER, NEG_RISK_CTF_EXCHANGE]
            .into_iter()
            .map(|operator| {
                SafeTransaction::call(
                    CONDITIONAL_TOKENS,
                    set_approval_for_all_calldata(operator, true),
                )
            }),
    );
    txns
}

#[async_trait]
impl Wallet for RelayerClient {
    fn owner(&self) -> Address {
        self.key.address()
    }

    fn safe_address(&self) -> Address {
        self.safe
    }

    async fn usdc_balance(&self) -> Result<Decimal> {
        let result = self
            .eth_call(COLLATERAL, &balance_of_calldata(self.safe))
            .await?;
        from_units(decode_uint(&result))
    }

    async fn account_status(&self) -> Result<AccountStatus> {
        let usdc_balance = self.usdc_balance().await?;
        Ok(AccountStatus {
            safe: self.safe,
            usdc_balance,
            usdc_allowance_ctf: self.allowance(CONDITIONAL_TOKENS).await,
            usdc_allowance_neg_risk: self.allowance(NEG_RISK_ADAPTER).await,
            ctf_approved_neg_risk: self.approved_for_all(NEG_RISK_ADAPTER).await,
            ctf_approved_exchange: self.approved_for_all(CTF_EXCHANGE).await,
        })
    }

    async fn approve_all(&self) -> Result<TransactionResult> {
        self.execute(&approve_all_transactions(), APPROVE_ALL_METADATA)
            .await
    }
}
