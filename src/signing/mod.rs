//! Order signing
//!
//! Rounds price and size to the market's tick profile, converts to base
//! units, and signs the resulting order with EIP-712. No I/O happens here.

pub mod contracts;
pub mod eip712;
mod order;
mod rounding;

pub use order::{
    parse_private_key, LimitOrderArgs, MarketOrderArgs, Order, OrderOptions, OrderSigner,
    SignedOrder,
};
pub use rounding::{
    limit_order_amounts, market_order_amounts, round_down, round_normal, round_up, to_units,
    OrderAmounts, RoundConfig, TickSize,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// On-chain encoding (BUY = 0, SELL = 1)
    pub fn as_u8(&self) -> u8 {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the exchange verifies the maker's signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureType {
    /// Plain externally owned account
    #[default]
    Eoa,
    /// Polymarket proxy wallet
    PolyProxy,
    /// Gnosis Safe owned by the signer
    GnosisSafe,
}

impl SignatureType {
    pub fn as_u8(&self) -> u8 {
        match self {
            SignatureType::Eoa => 0,
            SignatureType::PolyProxy => 1,
            SignatureType::GnosisSafe => 2,
        }
    }
}
