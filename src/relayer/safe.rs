//! Gnosis Safe plumbing: address derivation, multisend batching and
//! Safe-transaction signatures

use crate::error::{Error, Result};
use crate::signing::contracts::{SAFE_FACTORY, SAFE_INIT_CODE_HASH, SAFE_MULTISEND};
use crate::signing::eip712::{typed_data_digest, WordHasher};
use alloy::primitives::{keccak256, Address, Bytes, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use alloy::sol;
use alloy::sol_types::SolCall;
use serde::{Deserialize, Serialize};

sol! {
    function approve(address spender, uint256 amount) external returns (bool);
    function setApprovalForAll(address operator, bool approved) external;
    function balanceOf(address account) external view returns (uint256);
    function allowance(address owner, address spender) external view returns (uint256);
    function isApprovedForAll(address account, address operator) external view returns (bool);
    function multiSend(bytes transactions) external payable;
}

/// Safe domain: no name or version, the Safe itself verifies
pub const SAFE_DOMAIN_TYPE: &str = "EIP712Domain(uint256 chainId,address verifyingContract)";

pub const SAFE_TX_TYPE: &str = "SafeTx(address to,uint256 value,bytes data,uint8 operation,uint256 safeTxGas,uint256 baseGas,uint256 gasPrice,address gasToken,address refundReceiver,uint256 nonce)";

/// How the Safe executes a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SafeOperation {
    #[default]
    Call,
    DelegateCall,
}

impl SafeOperation {
    pub fn as_u8(&self) -> u8 {
        match self {
            SafeOperation::Call => 0,
            SafeOperation::DelegateCall => 1,
        }
    }
}

/// One call executed by the Safe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeTransaction {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub operation: SafeOperation,
}

impl SafeTransaction {
    /// Plain call with no value attached
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            value: U256::ZERO,
            data: data.into(),
            operation: SafeOperation::Call,
        }
    }
}

/// Safe owned by `owner`, as deployed by the Polymarket Safe factory
///
/// `CREATE2(factory, keccak256(abi.encode(owner)), initCodeHash)`
pub fn derive_safe_address(owner: Address) -> Address {
    let salt = keccak256(owner.into_word());
    SAFE_FACTORY.create2(salt, SAFE_INIT_CODE_HASH)
}

/// Packed multisend payload, wrapped in a `multiSend(bytes)` call
///
/// Each entry is `operation(1) ‖ to(20) ‖ value(32) ‖ len(32) ‖ data`.
pub fn encode_multisend(txns: &[SafeTransaction]) -> Bytes {
    let mut packed = Vec::new();
    for tx in txns {
        packed.push(tx.operation.as_u8());
        packed.extend_from_slice(tx.to.as_slice());
        packed.extend_from_slice(&tx.value.to_be_bytes::<32>());
        packed.extend_from_slice(&U256::from(tx.data.len()).to_be_bytes::<32>());
        packed.extend_from_slice(&tx.data);
    }
    multiSendCall {
        transactions: packed.into(),
    }
    .abi_encode()
    .into()
}

/// Collapse a batch into the single transaction the Safe signs
///
/// One transaction is sent as is; several go through multisend as a
/// delegate call.
pub fn aggregate(txns: &[SafeTransaction]) -> Result<SafeTransaction> {
    match txns {
        [] => Err(Error::InvalidOrder("empty Safe transaction batch".into())),
        [single] => Ok(single.clone()),
        many => Ok(SafeTransaction {
            to: SAFE_MULTISEND,
            value: U256::ZERO,
            data: encode_multisend(many),
            operation: SafeOperation::DelegateCall,
        }),
    }
}

pub fn safe_domain_separator(chain_id: u64, safe: Address) -> B256 {
    WordHasher::with_type(SAFE_DOMAIN_TYPE)
        .uint(U256::from(chain_id))
        .address(safe)
        .finish()
}

/// EIP-712 digest of a gasless Safe transaction
pub fn safe_tx_digest(tx: &SafeTransaction, nonce: u64, chain_id: u64, safe: Address) -> B256 {
    let struct_hash = WordHasher::with_type(SAFE_TX_TYPE)
        .address(tx.to)
        .uint(tx.value)
        .bytes(&tx.data)
        .uint(U256::from(tx.operation.as_u8()))
        .uint(U256::ZERO)
        .uint(U256::ZERO)
        .uint(U256::ZERO)
        .address(Address::ZERO)
        .address(Address::ZERO)
        .uint(U256::from(nonce))
        .finish();
    typed_data_digest(safe_domain_separator(chain_id, safe), struct_hash)
}

/// Sign a Safe digest as an `eth_sign` message
///
/// The Safe tells eth_sign signatures apart by `v > 30`, so the recovery
/// byte is shifted to 31/32.
pub fn sign_safe_digest(signer: &PrivateKeySigner, digest: B256) -> Result<String> {
    let signature = signer
        .sign_message_sync(digest.as_slice())
        .map_err(|e| Error::InvalidKey(e.to_string()))?;
    let mut bytes = signature.as_bytes();
    bytes[64] = match bytes[64] {
        v @ (0 | 1) => v + 31,
        v @ (27 | 28) => v + 4,
        v => v,
    };
    Ok(format!("0x{}", hex::encode(bytes)))
}

pub fn approve_calldata(spender: Address, amount: U256) -> Bytes {
    approveCall { spender, amount }.abi_encode().into()
}

pub fn set_approval_for_all_calldata(operator: Address, approved: bool) -> Bytes {
    setApprovalForAllCall { operator, approved }.abi_encode().into()
}

pub fn balance_of_calldata(account: Address) -> Bytes {
    balanceOfCall { account }.abi_encode().into()
}

pub fn allowance_calldata(owner: Address, spender: Address) -> Bytes {
    allowanceCall { owner, spender }.abi_encode().into()
}

pub fn is_approved_for_all_calldata(account: Address, operator: Address) -> Bytes {
    isApprovedForAllCall { account, operator }
        .abi_encode()
        .into()
}

/// First return word as an integer; short results read as zero
pub fn decode_uint(result: &[u8]) -> U256 {
    if result.len() < 32 {
        return U256::ZERO;
    }
    U256::from_be_slice(&result[..32])
}

/// First return word as a bool; short results read as false
pub fn decode_bool(result: &[u8]) -> bool {
    result.len() >= 32 && result[31] == 1
}
