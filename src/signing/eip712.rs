//! EIP-712 hashing for exchange orders
//!
//! Hashes are assembled word by word so the encoding stays visible:
//! every field is left-padded to 32 bytes and dynamic strings are hashed.

use super::order::Order;
use crate::error::{Error, Result};
use alloy::primitives::{keccak256, Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;

/// Domain type with a verifying contract (exchange orders)
pub const EIP712_DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";

/// Order type; field order is part of the hash
pub const ORDER_TYPE: &str = "Order(uint256 salt,address maker,address signer,address taker,uint256 tokenId,uint256 makerAmount,uint256 takerAmount,uint256 expiration,uint256 nonce,uint256 feeRateBps,uint8 side,uint8 signatureType)";

pub const EXCHANGE_DOMAIN_NAME: &str = "Polymarket CTF Exchange";
pub const EXCHANGE_DOMAIN_VERSION: &str = "1";

/// Accumulates 32-byte words for `keccak256(word ‖ word ‖ ...)`
#[derive(Default)]
pub(crate) struct WordHasher {
    buf: Vec<u8>,
}

impl WordHasher {
    pub(crate) fn with_type(type_string: &str) -> Self {
        let mut hasher = Self::default();
        hasher.word(keccak256(type_string));
        hasher
    }

    pub(crate) fn word(&mut self, word: B256) -> &mut Self {
        self.buf.extend_from_slice(word.as_slice());
        self
    }

    pub(crate) fn string(&mut self, value: &str) -> &mut Self {
        self.word(keccak256(value))
    }

    pub(crate) fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.word(keccak256(value))
    }

    pub(crate) fn uint(&mut self, value: U256) -> &mut Self {
        self.word(B256::from(value.to_be_bytes::<32>()))
    }

    pub(crate) fn address(&mut self, value: Address) -> &mut Self {
        self.word(value.into_word())
    }

    pub(crate) fn finish(&self) -> B256 {
        keccak256(&self.buf)
    }
}

/// Domain separator for an exchange contract
pub fn domain_separator(chain_id: u64, verifying_contract: Address) -> B256 {
    WordHasher::with_type(EIP712_DOMAIN_TYPE)
        .string(EXCHANGE_DOMAIN_NAME)
        .string(EXCHANGE_DOMAIN_VERSION)
        .uint(U256::from(chain_id))
        .address(verifying_contract)
        .finish()
}

/// Struct hash of an order
pub fn order_struct_hash(order: &Order) -> B256 {
    WordHasher::with_type(ORDER_TYPE)
        .uint(order.salt)
        .address(order.maker)
        .address(order.signer)
        .address(order.taker)
        .uint(order.token_id)
        .uint(order.maker_amount)
        .uint(order.taker_amount)
        .uint(order.expiration)
        .uint(order.nonce)
        .uint(order.fee_rate_bps)
        .uint(U256::from(order.side))
        .uint(U256::from(order.signature_type))
        .finish()
}

/// `keccak256(0x1901 ‖ domainSeparator ‖ structHash)`
pub fn typed_data_digest(domain_separator: B256, struct_hash: B256) -> B256 {
    let mut buf = Vec::with_capacity(66);
    buf.extend_from_slice(&[0x19, 0x01]);
    buf.extend_from_slice(domain_separator.as_slice());
    buf.extend_from_slice(struct_hash.as_slice());
    keccak256(buf)
}

/// Digest an order for the given exchange
pub fn order_digest(order: &Order, chain_id: u64, exchange: Address) -> B256 {
    typed_data_digest(domain_separator(chain_id, exchange), order_struct_hash(order))
}

/// Sign a digest; the recovery byte is normalized to 27/28
pub fn sign_digest(signer: &PrivateKeySigner, digest: B256) -> Result<[u8; 65]> {
    let signature = signer
        .sign_hash_sync(&digest)
        .map_err(|e| Error::InvalidKey(e.to_string()))?;
    let mut bytes = signature.as_bytes();
    if bytes[64] < 27 {
        bytes[64] += 27;
    }
    Ok(bytes)
}

/// Hex form sent to the exchange (`0x` + 130 hex chars)
pub fn signature_hex(bytes: &[u8; 65]) -> String {
    format!("0x{}", hex::encode(bytes))
}
