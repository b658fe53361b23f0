//! Configuration types for updown-hedge
//!
//! Two documents: the application config (TOML) with endpoints, stream,
//! scheduler, HTTP and telemetry settings, and the hedge strategy config
//! (JSON) naming the accounts file and candidate markets.

use crate::auth::BuilderCredentials;
use crate::clob::{ClobConfig, CLOB_API_URL};
use crate::error::{Error, Result};
use crate::execution::HedgeParams;
use crate::market::{GammaConfig, Period, SchedulerConfig, SwitchoverFallback, Symbol, GAMMA_API_URL};
use crate::relayer::{RelayerConfig, POLYGON_RPC_URL, RELAYER_URL};
use crate::signing::contracts::POLYGON_CHAIN_ID;
use crate::telemetry::LogFormat;
use crate::ws::{WsConfig, DEFAULT_WS_BASE_URL};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoints: EndpointsConfig,
    pub stream: StreamConfig,
    pub scheduler: RoundsConfig,
    pub http: HttpConfig,
    /// Integrator credentials for relayed Safe transactions
    #[serde(skip_serializing)]
    pub builder: Option<BuilderCredentials>,
    pub telemetry: TelemetryConfig,
}

/// Service endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    pub clob: String,
    pub gamma: String,
    /// WebSocket base; `/ws/market` and `/ws/user` are appended
    pub ws: String,
    pub relayer: String,
    pub polygon_rpc: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            clob: CLOB_API_URL.to_string(),
            gamma: GAMMA_API_URL.to_string(),
            ws: DEFAULT_WS_BASE_URL.to_string(),
            relayer: RELAYER_URL.to_string(),
            polygon_rpc: POLYGON_RPC_URL.to_string(),
        }
    }
}

/// Stream session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub ping_interval_secs: u64,
    pub reconnect_delay_secs: u64,
    /// 0 disables reconnects
    pub max_reconnect_attempts: u32,
    pub handshake_timeout_secs: u64,
    pub buffer_size: usize,
    pub dedup_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: 10,
            reconnect_delay_secs: 5,
            max_reconnect_attempts: 10,
            handshake_timeout_secs: 10,
            buffer_size: 1024,
            dedup_capacity: 4096,
        }
    }
}

/// Round scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundsConfig {
    pub symbol: Symbol,
    pub period: Period,
    pub pre_subscribe_lead_secs: u64,
    pub startup_grace_secs: u64,
    pub tick_ms: u64,
    pub retry_delay_ms: u64,
    pub fallback: SwitchoverFallback,
}

impl Default for RoundsConfig {
    fn default() -> Self {
        Self {
            symbol: Symbol::Btc,
            period: Period::FifteenMinutes,
            pre_subscribe_lead_secs: 30,
            startup_grace_secs: 10,
            tick_ms: 100,
            retry_delay_ms: 1000,
            fallback: SwitchoverFallback::Resubscribe,
        }
    }
}

/// REST client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Extra attempts after a 429/5xx or transport error
    pub retry_count: u32,
    /// Relayer and RPC calls wait longer for chain state
    pub relayer_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            retry_count: 2,
            relayer_timeout_secs: 60,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
    /// Prometheus exporter port; no exporter when unset
    pub metrics_port: Option<u16>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn ws_config(&self) -> WsConfig {
        let stream = &self.stream;
        WsConfig {
            base_url: self.endpoints.ws.clone(),
            ping_interval: Duration::from_secs(stream.ping_interval_secs),
            reconnect_delay: Duration::from_secs(stream.reconnect_delay_secs),
            max_reconnect_attempts: stream.max_reconnect_attempts,
            handshake_timeout: Duration::from_secs(stream.handshake_timeout_secs),
            buffer_size: stream.buffer_size,
            dedup_capacity: stream.dedup_capacity,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        let rounds = &self.scheduler;
        SchedulerConfig {
            symbol: rounds.symbol,
            period: rounds.period,
            pre_subscribe_lead: Duration::from_secs(rounds.pre_subscribe_lead_secs),
            startup_grace: Duration::from_secs(rounds.startup_grace_secs),
            tick: Duration::from_millis(rounds.tick_ms.max(1)),
            retry_delay: Duration::from_millis(rounds.retry_delay_ms),
            fallback: rounds.fallback,
        }
    }

    pub fn clob_config(&self) -> ClobConfig {
        ClobConfig {
            base_url: self.endpoints.clob.clone(),
            timeout: Duration::from_secs(self.http.timeout_secs),
            retry_count: self.http.retry_count,
            proxy: None,
        }
    }

    pub fn gamma_config(&self) -> GammaConfig {
        GammaConfig {
            base_url: self.endpoints.gamma.clone(),
            timeout: Duration::from_secs(self.http.timeout_secs),
            proxy: None,
        }
    }

    pub fn relayer_config(&self) -> RelayerConfig {
        RelayerConfig {
            relayer_url: self.endpoints.relayer.clone(),
            rpc_url: self.endpoints.polygon_rpc.clone(),
            timeout: Duration::from_secs(self.http.relayer_timeout_secs),
            proxy: None,
            builder: self.builder.clone(),
            chain_id: POLYGON_CHAIN_ID,
        }
    }
}

/// Hedge strategy configuration (JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HedgeConfig {
    pub accounts_file: PathBuf,
    #[serde(rename = "marketURLs")]
    pub market_urls: Vec<String>,
    /// Per-leg size cap in shares
    pub max_trade_amount: Decimal,
    pub min_spread_ticks: u32,
    pub max_retries: u32,
    /// Values of 0 or less fall back to 3 seconds
    pub retry_delay_sec: i64,
}

impl Default for HedgeConfig {
    fn default() -> Self {
        Self {
            accounts_file: PathBuf::new(),
            market_urls: Vec::new(),
            max_trade_amount: Decimal::TEN,
            min_spread_ticks: 2,
            max_retries: 10,
            retry_delay_sec: 3,
        }
    }
}

impl HedgeConfig {
    /// Load and validate; a relative accounts path is resolved against the
    /// config file's directory
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        let mut config = Self::parse(&content)?;
        if config.accounts_file.is_relative() {
            if let Some(dir) = path.parent() {
                config.accounts_file = dir.join(&config.accounts_file);
            }
        }
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("hedge config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.accounts_file.as_os_str().is_empty() {
            return Err(Error::Config("accountsFile is empty".into()));
        }
        if self.market_urls.is_empty() {
            return Err(Error::Config("marketURLs is empty".into()));
        }
        if self.max_trade_amount <= Decimal::ZERO {
            return Err(Error::Config("maxTradeAmount must be positive".into()));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        if self.retry_delay_sec <= 0 {
            Duration::from_secs(3)
        } else {
            Duration::from_secs(self.retry_delay_sec.unsigned_abs())
        }
    }

    pub fn params(&self) -> HedgeParams {
        HedgeParams {
            max_trade_amount: self.max_trade_amount,
            min_spread_ticks: self.min_spread_ticks,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay(),
            ..HedgeParams::default()
        }
    }
}
