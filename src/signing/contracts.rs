//! Polygon contract addresses and network constants

use alloy::primitives::{address, b256, Address, B256};

/// Polygon mainnet chain id
pub const POLYGON_CHAIN_ID: u64 = 137;

/// Standard CTF exchange (binary markets)
pub const CTF_EXCHANGE: Address = address!("4bFb41d5B3570DeFd03C39a9A4D8dE6Bd8B8982E");
/// CTF exchange used by neg-risk markets
pub const NEG_RISK_CTF_EXCHANGE: Address = address!("C5d563A36AE78145C45a50134d48A1215220f80a");
/// Neg-risk adapter
pub const NEG_RISK_ADAPTER: Address = address!("d91E80cF2E7be2e162c6513ceD06f1dD0dA35296");
/// USDC.e collateral token
pub const COLLATERAL: Address = address!("2791Bca1f2de4661ED88A30C99A7a9449Aa84174");
/// Conditional tokens (ERC-1155 outcome positions)
pub const CONDITIONAL_TOKENS: Address = address!("4D97DCd97eC945f40cF65F87097ACe5EA0476045");
/// Gnosis Safe proxy factory
pub const SAFE_FACTORY: Address = address!("aacFeEa03eb1561C4e67d661e40682Bd20E3541b");
/// Gnosis Safe multisend
pub const SAFE_MULTISEND: Address = address!("40A2aCCbd92BCA938b02010E17A5b8929b49130D");
/// Init code hash of the Safe proxy deployed by [`SAFE_FACTORY`]
pub const SAFE_INIT_CODE_HASH: B256 =
    b256!("2bce2127ff07fb632d16c8347c4ebf501f4841168bed00d9e6ef715ddb6fcecf");

/// Collateral and outcome tokens use 6 decimals on chain
pub const TOKEN_DECIMALS: u32 = 6;

/// Exchange that verifies orders for a market
///
/// A signature made against the wrong exchange is well formed but fails
/// on-chain verification, so callers must pass the market's neg-risk flag.
pub fn exchange_address(neg_risk: bool) -> Address {
    if neg_risk {
        NEG_RISK_CTF_EXCHANGE
    } else {
        CTF_EXCHANGE
    }
}
