//! HMAC request signing (trader L2 and builder)

use super::{ApiCredentials, AuthHeaders, BuilderCredentials};
use crate::error::{Error, Result};
use alloy::primitives::Address;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Decode an API secret written in either base64 alphabet
pub fn decode_secret(secret: &str) -> Result<Vec<u8>> {
    let normalized: String = secret
        .trim()
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    STANDARD
        .decode(&normalized)
        .or_else(|_| STANDARD_NO_PAD.decode(normalized.trim_end_matches('=')))
        .map_err(|e| Error::Auth(format!("API secret is not base64: {e}")))
}

fn hmac_digest(secret: &str, timestamp: i64, method: &str, path: &str, body: &str) -> Result<Vec<u8>> {
    let key = decode_secret(secret)?;
    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| Error::Auth(format!("HMAC key: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    mac.update(body.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// `base64(HMAC-SHA256(secret, timestamp + method + path + body))`
pub fn hmac_signature(
    secret: &str,
    timestamp: i64,
    method: &str,
    path: &str,
    body: &str,
) -> Result<String> {
    Ok(STANDARD.encode(hmac_digest(secret, timestamp, method, path, body)?))
}

/// Headers for authenticated exchange calls
pub fn l2_headers(
    address: Address,
    creds: &ApiCredentials,
    timestamp: i64,
    method: &str,
    path: &str,
    body: &str,
) -> Result<AuthHeaders> {
    let signature = hmac_signature(&creds.secret, timestamp, method, path, body)?;

    let mut headers = AuthHeaders::default();
    headers.push("POLY_ADDRESS", address.to_checksum(None));
    headers.push("POLY_SIGNATURE", signature);
    headers.push("POLY_TIMESTAMP", timestamp.to_string());
    headers.push("POLY_API_KEY", creds.api_key.clone());
    headers.push("POLY_PASSPHRASE", creds.passphrase.clone());
    Ok(headers)
}

/// Headers for relayer calls attributed to a builder
pub fn builder_headers(
    creds: &BuilderCredentials,
    timestamp: i64,
    method: &str,
    path: &str,
    body: &str,
) -> Result<AuthHeaders> {
    let digest = hmac_digest(&creds.secret, timestamp, method, path, body)?;

    let mut headers = AuthHeaders::default();
    headers.push("POLY_BUILDER_API_KEY", creds.api_key.clone());
    headers.push("POLY_BUILDER_TIMESTAMP", timestamp.to_string());
    headers.push("POLY_BUILDER_PASSPHRASE", creds.passphrase.clone());
    headers.push("POLY_BUILDER_SIGNATURE", URL_SAFE.encode(digest));
    Ok(headers)
}
