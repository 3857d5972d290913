//! Venue request signing
//!
//! Every authenticated venue call carries an Ed25519 signature over
//! `{timestamp_ms}{METHOD}{path}{body?}`. The body is part of the signed
//! material for POST/PUT only, and the exact signed bytes must be the bytes
//! transmitted: re-serializing a body after signing invalidates the
//! signature server-side.

use crate::error::{OrchestratorError, OrchestratorResult};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};

pub const HEADER_ACCOUNT_ID: &str = "x-venue-account-id";
pub const HEADER_TIMESTAMP: &str = "x-venue-timestamp";
pub const HEADER_KEY: &str = "x-venue-key";
pub const HEADER_SIGNATURE: &str = "x-venue-signature";

/// HTTP method of a signed venue request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// GET and DELETE requests are signed without a body
    fn signs_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

/// Headers emitted for one signed request
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    pub content_type: &'static str,
    pub account_id: String,
    pub timestamp: String,
    /// Algorithm-tagged base58 public key, `ed25519:...`
    pub key: String,
    /// Url-safe base64 signature, unpadded
    pub signature: String,
}

/// Signs venue REST requests with an account's Ed25519 key
pub struct RequestSigner;

impl RequestSigner {
    /// Sign a request with a fresh millisecond timestamp
    pub fn sign(
        account_id: &str,
        secret_key_base58: &str,
        method: HttpMethod,
        path: &str,
        body: Option<&str>,
    ) -> OrchestratorResult<SignedHeaders> {
        Self::sign_at(
            account_id,
            secret_key_base58,
            method,
            path,
            body,
            Utc::now().timestamp_millis(),
        )
    }

    /// Sign with an explicit timestamp. Production callers use `sign`; this
    /// exists so the signature can be checked deterministically.
    pub fn sign_at(
        account_id: &str,
        secret_key_base58: &str,
        method: HttpMethod,
        path: &str,
        body: Option<&str>,
        timestamp_ms: i64,
    ) -> OrchestratorResult<SignedHeaders> {
        let signing_key = decode_signing_key(secret_key_base58)?;

        let mut message = format!("{}{}{}", timestamp_ms, method.as_str(), path);
        if method.signs_body() {
            if let Some(body) = body {
                message.push_str(body);
            }
        }

        let signature = signing_key.sign(message.as_bytes());
        let public_key = signing_key.verifying_key();

        let content_type = if method.signs_body() {
            "application/json"
        } else {
            "application/x-www-form-urlencoded"
        };

        Ok(SignedHeaders {
            content_type,
            account_id: account_id.to_string(),
            timestamp: timestamp_ms.to_string(),
            key: format!("ed25519:{}", bs58::encode(public_key.to_bytes()).into_string()),
            signature: URL_SAFE_NO_PAD.encode(signature.to_bytes()),
        })
    }
}

/// Sign an arbitrary authorization message with a wallet's Ed25519 key,
/// returning the detached signature base58-encoded. Used for the
/// wallet-level signatures inside withdrawal and internal-transfer messages.
pub fn sign_message_base58(
    secret_key_base58: &str,
    message: &str,
) -> OrchestratorResult<String> {
    let signing_key = decode_signing_key(secret_key_base58)?;
    let signature = signing_key.sign(message.as_bytes());
    Ok(bs58::encode(signature.to_bytes()).into_string())
}

/// Decode a base58 Ed25519 key: either a 32-byte seed or a 64-byte expanded
/// keypair (seed || public key), as wallet stores commonly hold either form
pub fn decode_signing_key(secret_key_base58: &str) -> OrchestratorResult<SigningKey> {
    let bytes = bs58::decode(secret_key_base58)
        .into_vec()
        .map_err(|e| OrchestratorError::Signing(format!("Invalid base58 key: {}", e)))?;

    let seed: [u8; 32] = match bytes.len() {
        32 => bytes.try_into().unwrap(),
        64 => bytes[..32].try_into().unwrap(),
        n => {
            return Err(OrchestratorError::Signing(format!(
                "Invalid Ed25519 key length: {}",
                n
            )))
        }
    };

    Ok(SigningKey::from_bytes(&seed))
}
