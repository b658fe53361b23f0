//! Configuration and account files on disk

use rust_decimal_macros::dec;
use std::io::Write;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use updown_hedge::account::load_accounts;
use updown_hedge::config::{Config, HedgeConfig};
use updown_hedge::market::{Period, Symbol, SwitchoverFallback};
use updown_hedge::Error;

const ACCOUNTS: &str = "\
index,evmAddressA,evmPrivateKeyA,proxyAddressA,evmAddressB,evmPrivateKeyB,proxyAddressB
1,0xaaa,0x01,,0xbbb,0x02,
2,0xccc,0x03,http://proxy-a:8080,0xddd,0x04,http://proxy-b:8080
";

#[test]
fn test_strategy_with_relative_accounts_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("accounts.csv"), ACCOUNTS).unwrap();
    let strategy = dir.path().join("strategy.json");
    std::fs::write(
        &strategy,
        r#"{
            "accountsFile": "accounts.csv",
            "marketURLs": ["https://polymarket.com/event/btc-updown-15m-1700000000"],
            "maxTradeAmount": 25,
            "minSpreadTicks": 3,
            "maxRetries": 4,
            "retryDelaySec": 0
        }"#,
    )
    .unwrap();

    let config = assert_ok!(HedgeConfig::load(&strategy));
    assert_eq!(config.accounts_file, dir.path().join("accounts.csv"));
    assert_eq!(config.retry_delay(), Duration::from_secs(3));

    let params = config.params();
    assert_eq!(params.max_trade_amount, dec!(25));
    assert_eq!(params.min_spread_ticks, 3);
    assert_eq!(params.max_retries, 4);

    let pairs = assert_ok!(load_accounts(&config.accounts_file));
    assert_eq!(pairs.len(), 2);
    assert_eq!(pairs[0].private_key_a, "0x01");
    assert_eq!(pairs[0].proxy_a, None);
    assert_eq!(pairs[1].index, 2);
    assert_eq!(pairs[1].proxy_b.as_deref(), Some("http://proxy-b:8080"));
}

#[test]
fn test_strategy_without_markets_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"accountsFile": "/tmp/accounts.csv", "marketURLs": []}}"#).unwrap();
    assert!(matches!(HedgeConfig::load(file.path()), Err(Error::Config(_))));
}

#[test]
fn test_missing_accounts_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = assert_err!(load_accounts(dir.path().join("nope.csv")));
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_toml_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[endpoints]
ws = "ws://127.0.0.1:9000"

[stream]
reconnect_delay_secs = 2
max_reconnect_attempts = 0

[scheduler]
symbol = "eth"
period = "1h"
fallback = "fail-round"

[builder]
api_key = "key"
secret = "c2VjcmV0"
passphrase = "pass"
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    let ws = config.ws_config();
    assert_eq!(ws.base_url, "ws://127.0.0.1:9000");
    assert_eq!(ws.reconnect_delay, Duration::from_secs(2));
    assert_eq!(ws.max_reconnect_attempts, 0);
    assert_eq!(ws.ping_interval, Duration::from_secs(10));

    let scheduler = config.scheduler_config();
    assert_eq!(scheduler.symbol, Symbol::Eth);
    assert_eq!(scheduler.period, Period::OneHour);
    assert_eq!(scheduler.fallback, SwitchoverFallback::FailRound);

    assert!(config.relayer_config().builder.is_some());
}

#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        Config::load(dir.path().join("config.toml")),
        Err(Error::Config(_))
    ));
}
