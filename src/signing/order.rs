//! Order records and the signer that produces them

use super::contracts::{exchange_address, POLYGON_CHAIN_ID};
use super::eip712::{order_digest, sign_digest, signature_hex};
use super::rounding::{limit_order_amounts, market_order_amounts, OrderAmounts, TickSize};
use super::{Side, SignatureType};
use crate::error::{Error, Result};
use alloy::primitives::{Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::str::FromStr;

/// Limit orders without an explicit expiration live for a year
const DEFAULT_LIMIT_EXPIRY_SECS: u64 = 365 * 24 * 60 * 60;

/// Order fields covered by the signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub salt: U256,
    pub maker: Address,
    pub signer: Address,
    pub taker: Address,
    pub token_id: U256,
    pub maker_amount: U256,
    pub taker_amount: U256,
    pub expiration: U256,
    pub nonce: U256,
    pub fee_rate_bps: U256,
    pub side: u8,
    pub signature_type: u8,
}

/// An order with its signature; fields are read-only so the signature
/// cannot silently go stale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedOrder {
    order: Order,
    signature: String,
}

impl SignedOrder {
    pub fn order(&self) -> &Order {
        &self.order
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Drop the signature to edit fields; the result must be re-signed
    pub fn into_unsigned(self) -> Order {
        self.order
    }

    /// Local checks the exchange would otherwise reject
    pub fn validate(&self) -> Result<()> {
        let order = &self.order;
        if order.maker_amount.is_zero() {
            return Err(Error::InvalidOrder("makerAmount is 0".into()));
        }
        if order.taker_amount.is_zero() {
            return Err(Error::InvalidOrder("takerAmount is 0".into()));
        }
        if order.side > 1 {
            return Err(Error::InvalidOrder(format!("side {} out of range", order.side)));
        }
        if order.signature_type > 2 {
            return Err(Error::InvalidOrder(format!(
                "signatureType {} out of range",
                order.signature_type
            )));
        }
        if self.signature.is_empty() {
            return Err(Error::InvalidOrder("missing signature".into()));
        }
        Ok(())
    }
}

fn decimal_string<S: Serializer>(value: &U256, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&value.to_string())
}

fn checksum<S: Serializer>(value: &Address, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&value.to_checksum(None))
}

/// Wire form: camelCase, integers for side/signatureType, strings elsewhere
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignedOrderWire<'a> {
    #[serde(serialize_with = "decimal_string")]
    salt: &'a U256,
    #[serde(serialize_with = "checksum")]
    maker: &'a Address,
    #[serde(serialize_with = "checksum")]
    signer: &'a Address,
    #[serde(serialize_with = "checksum")]
    taker: &'a Address,
    #[serde(serialize_with = "decimal_string")]
    token_id: &'a U256,
    #[serde(serialize_with = "decimal_string")]
    maker_amount: &'a U256,
    #[serde(serialize_with = "decimal_string")]
    taker_amount: &'a U256,
    #[serde(serialize_with = "decimal_string")]
    expiration: &'a U256,
    #[serde(serialize_with = "decimal_string")]
    nonce: &'a U256,
    #[serde(serialize_with = "decimal_string")]
    fee_rate_bps: &'a U256,
    side: u8,
    signature_type: u8,
    signature: &'a str,
}

impl Serialize for SignedOrder {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let o = &self.order;
        SignedOrderWire {
            salt: &o.salt,
            maker: &o.maker,
            signer: &o.signer,
            taker: &o.taker,
            token_id: &o.token_id,
            maker_amount: &o.maker_amount,
            taker_amount: &o.taker_amount,
            expiration: &o.expiration,
            nonce: &o.nonce,
            fee_rate_bps: &o.fee_rate_bps,
            side: o.side,
            signature_type: o.signature_type,
            signature: &self.signature,
        }
        .serialize(serializer)
    }
}

/// A limit order request in human units
#[derive(Debug, Clone)]
pub struct LimitOrderArgs {
    pub token_id: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    /// Unix seconds; 0 means one year from now
    pub expiration: u64,
    pub nonce: u64,
    pub fee_rate_bps: u32,
    pub taker: Option<Address>,
}

impl LimitOrderArgs {
    pub fn new(token_id: impl Into<String>, side: Side, price: Decimal, size: Decimal) -> Self {
        Self {
            token_id: token_id.into(),
            side,
            price,
            size,
            expiration: 0,
            nonce: 0,
            fee_rate_bps: 0,
            taker: None,
        }
    }
}

/// A market order request; `amount` is collateral for BUY, shares for SELL
#[derive(Debug, Clone)]
pub struct MarketOrderArgs {
    pub token_id: String,
    pub side: Side,
    pub amount: Decimal,
    pub price: Decimal,
    pub nonce: u64,
    pub fee_rate_bps: u32,
    pub taker: Option<Address>,
}

/// Market parameters that change how an order is built
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderOptions {
    pub tick_size: TickSize,
    pub neg_risk: bool,
}

/// Builds and signs orders for one signing key
///
/// Pure apart from salt generation and the default limit expiry; use
/// [`OrderSigner::sign`] directly for fully deterministic output.
#[derive(Clone)]
pub struct OrderSigner {
    key: PrivateKeySigner,
    funder: Address,
    signature_type: SignatureType,
    chain_id: u64,
}

impl std::fmt::Debug for OrderSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderSigner")
            .field("signer", &self.key.address())
            .field("funder", &self.funder)
            .field("signature_type", &self.signature_type)
            .finish()
    }
}

/// Parse a hex private key with or without `0x`
pub fn parse_private_key(private_key: &str) -> Result<PrivateKeySigner> {
    let trimmed = private_key.trim();
    let hex_key = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = B256::from_str(hex_key)
        .map_err(|e| Error::InvalidKey(format!("malformed private key: {e}")))?;
    PrivateKeySigner::from_bytes(&bytes).map_err(|e| Error::InvalidKey(e.to_string()))
}

impl OrderSigner {
    /// Create a signer; the funder defaults to the signing address
    pub fn new(
        private_key: &str,
        signature_type: SignatureType,
        funder: Option<Address>,
    ) -> Result<Self> {
        let key = parse_private_key(private_key)?;
        let funder = funder.unwrap_or_else(|| key.address());
        Ok(Self {
            key,
            funder,
            signature_type,
            chain_id: POLYGON_CHAIN_ID,
        })
    }

    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    /// Address of the signing key
    pub fn address(&self) -> Address {
        self.key.address()
    }

    /// Address that holds the funds (maker)
    pub fn funder(&self) -> Address {
        self.funder
    }

    pub fn signature_type(&self) -> SignatureType {
        self.signature_type
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub(crate) fn key(&self) -> &PrivateKeySigner {
        &self.key
    }

    /// Build and sign a limit order
    pub fn build_limit_order(
        &self,
        args: &LimitOrderArgs,
        options: OrderOptions,
    ) -> Result<SignedOrder> {
        let amounts = limit_order_amounts(args.side, args.size, args.price, options.tick_size)?;
        let expiration = if args.expiration == 0 {
            chrono::Utc::now().timestamp().max(0) as u64 + DEFAULT_LIMIT_EXPIRY_SECS
        } else {
            args.expiration
        };
        let order = self.unsigned(
            &args.token_id,
            args.side,
            amounts,
            expiration,
            args.nonce,
            args.fee_rate_bps,
            args.taker,
        )?;
        self.sign(order, options.neg_risk)
    }

    /// Build and sign a market order (no expiration)
    pub fn build_market_order(
        &self,
        args: &MarketOrderArgs,
        options: OrderOptions,
    ) -> Result<SignedOrder> {
        let amounts = market_order_amounts(args.side, args.amount, args.price, options.tick_size)?;
        let order = self.unsigned(
            &args.token_id,
            args.side,
            amounts,
            0,
            args.nonce,
            args.fee_rate_bps,
            args.taker,
        )?;
        self.sign(order, options.neg_risk)
    }

    #[allow(clippy::too_many_arguments)]
    fn unsigned(
        &self,
        token_id: &str,
        side: Side,
        amounts: OrderAmounts,
        expiration: u64,
        nonce: u64,
        fee_rate_bps: u32,
        taker: Option<Address>,
    ) -> Result<Order> {
        let token_id = U256::from_str_radix(token_id, 10)
            .map_err(|e| Error::InvalidOrder(format!("token id {token_id}: {e}")))?;
        Ok(Order {
            salt: random_salt(),
            maker: self.funder,
            signer: self.key.address(),
            taker: taker.unwrap_or(Address::ZERO),
            token_id,
            maker_amount: amounts.maker,
            taker_amount: amounts.taker,
            expiration: U256::from(expiration),
            nonce: U256::from(nonce),
            fee_rate_bps: U256::from(fee_rate_bps),
            side: side.as_u8(),
            signature_type: self.signature_type.as_u8(),
        })
    }

    /// Sign an order against the exchange chosen by `neg_risk`
    pub fn sign(&self, order: Order, neg_risk: bool) -> Result<SignedOrder> {
        let digest = order_digest(&order, self.chain_id, exchange_address(neg_risk));
        let bytes = sign_digest(&self.key, digest)?;
        Ok(SignedOrder {
            order,
            signature: signature_hex(&bytes),
        })
    }
}

/// Random 256-bit salt
fn random_salt() -> U256 {
    let bytes: [u8; 32] = rand::rng().random();
    U256::from_be_bytes(bytes)
}
