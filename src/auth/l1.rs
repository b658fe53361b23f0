//! Wallet-signature (L1) authentication

use super::AuthHeaders;
use crate::error::Result;
use crate::signing::eip712::{sign_digest, signature_hex, typed_data_digest, WordHasher};
use alloy::primitives::{Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;

/// Attestation signed to prove control of the wallet
pub const CLOB_AUTH_MESSAGE: &str = "This message attests that I control the given wallet";

const CLOB_AUTH_DOMAIN_TYPE: &str = "EIP712Domain(string name,string version,uint256 chainId)";
const CLOB_AUTH_TYPE: &str =
    "ClobAuth(address address,string timestamp,uint256 nonce,string message)";
const CLOB_AUTH_DOMAIN_NAME: &str = "ClobAuthDomain";
const CLOB_AUTH_DOMAIN_VERSION: &str = "1";

/// EIP-712 digest of the ClobAuth attestation
pub fn clob_auth_digest(address: Address, timestamp: i64, nonce: u64, chain_id: u64) -> B256 {
    let domain = WordHasher::with_type(CLOB_AUTH_DOMAIN_TYPE)
        .string(CLOB_AUTH_DOMAIN_NAME)
        .string(CLOB_AUTH_DOMAIN_VERSION)
        .uint(U256::from(chain_id))
        .finish();
    let message = WordHasher::with_type(CLOB_AUTH_TYPE)
        .address(address)
        .string(&timestamp.to_string())
        .uint(U256::from(nonce))
        .string(CLOB_AUTH_MESSAGE)
        .finish();
    typed_data_digest(domain, message)
}

/// Headers used to create or derive API credentials
pub fn l1_headers(
    signer: &PrivateKeySigner,
    chain_id: u64,
    timestamp: i64,
    nonce: u64,
) -> Result<AuthHeaders> {
    let address = signer.address();
    let digest = clob_auth_digest(address, timestamp, nonce, chain_id);
    let signature = signature_hex(&sign_digest(signer, digest)?);

    let mut headers = AuthHeaders::default();
    headers.push("POLY_ADDRESS", address.to_checksum(None));
    headers.push("POLY_SIGNATURE", signature);
    headers.push("POLY_TIMESTAMP", timestamp.to_string());
    headers.push("POLY_NONCE", nonce.to_string());
    Ok(headers)
}
