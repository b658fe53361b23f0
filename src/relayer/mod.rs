//! Wallet collaborator
//!
//! Each trading account holds its funds in a Gnosis Safe derived from the
//! signing key. Balances and approvals are read with `eth_call`; approval
//! transactions are signed by the owner and relayed gaslessly.

mod client;
pub mod safe;

pub use client::{
    approve_all_transactions, RelayerClient, RelayerConfig, POLYGON_RPC_URL, RELAYER_URL,
};
pub use safe::{derive_safe_address, SafeOperation, SafeTransaction};

use crate::error::Result;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;

/// On-chain funding and approval state of a Safe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountStatus {
    pub safe: Address,
    pub usdc_balance: Decimal,
    /// Raw USDC allowance granted to the conditional tokens contract
    pub usdc_allowance_ctf: U256,
    pub usdc_allowance_neg_risk: U256,
    pub ctf_approved_neg_risk: bool,
    pub ctf_approved_exchange: bool,
}

impl AccountStatus {
    /// Whether the approve-all batch should run before trading
    pub fn needs_approval(&self) -> bool {
        !self.ctf_approved_exchange || self.usdc_allowance_ctf.is_zero()
    }
}

/// Relayer acknowledgement of a submitted Safe transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionResult {
    pub hash: String,
    pub transaction_id: String,
    /// Relayer state, e.g. `STATE_NEW`, `STATE_MINED`, `STATE_FAILED`
    pub state: String,
}

impl TransactionResult {
    pub fn is_failed(&self) -> bool {
        matches!(self.state.as_str(), "STATE_FAILED" | "STATE_INVALID")
    }
}

/// Funding operations the execution engine needs per leg
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Signing (owner) address
    fn owner(&self) -> Address;

    /// Safe that holds the funds and makes the orders
    fn safe_address(&self) -> Address;

    async fn usdc_balance(&self) -> Result<Decimal>;

    async fn account_status(&self) -> Result<AccountStatus>;

    /// Grant every exchange contract the approvals trading needs
    async fn approve_all(&self) -> Result<TransactionResult>;
}
