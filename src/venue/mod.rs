//! Trading-venue gateway
//!
//! Authenticated REST adapter for the custodial trading venue: withdrawal
//! nonces and requests, asset history, balances, and internal transfers.
//! All calls go through the request-signing protocol in [`signer`].

pub mod client;
pub mod signer;

pub use client::VenueClient;
pub use signer::{HttpMethod, RequestSigner, SignedHeaders};

use crate::error::OrchestratorResult;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Withdrawal-authorization message, wallet-signed before submission.
///
/// The venue verifies the wallet signature over the exact JSON serialization
/// of this struct; field names are part of the wire contract.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalMessage {
    pub broker_id: String,
    pub chain_id: u64,
    pub receiver: String,
    pub token: String,
    /// Smallest-unit amount, stringified
    pub amount: String,
    pub withdraw_nonce: String,
    pub timestamp: String,
    pub chain_type: String,
    pub allow_cross_chain_withdraw: bool,
}

/// Signed withdrawal submission envelope
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    pub signature: String,
    pub user_address: String,
    pub verifying_contract: String,
    pub message: WithdrawalMessage,
}

/// Internal-transfer message, same signing contract as withdrawals
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalTransferMessage {
    pub receiver: String,
    pub token: String,
    pub amount: String,
    pub transfer_nonce: String,
    pub chain_id: String,
    pub chain_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalTransferRequest {
    pub signature: String,
    pub user_address: String,
    pub verifying_contract: String,
    pub message: InternalTransferMessage,
}

/// Asset-history query filter
#[derive(Debug, Clone)]
pub struct AssetHistoryFilter {
    pub token: String,
    pub side: String,
}

/// One asset-history entry
#[derive(Debug, Clone, Deserialize)]
pub struct AssetHistoryRow {
    pub amount: Decimal,
    pub side: String,
    pub trans_status: String,
}

/// One balance entry
#[derive(Debug, Clone, Deserialize)]
pub struct HoldingRow {
    pub token: String,
    pub holding: Decimal,
}

/// Venue REST API seam
///
/// Every method takes the venue account id and the decrypted API signing
/// key; the implementation signs each call with a fresh timestamp.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VenueGateway: Send + Sync {
    /// Single-use nonce required inside a withdrawal-authorization message
    async fn get_withdraw_nonce(
        &self,
        account_id: &str,
        api_secret: &str,
    ) -> OrchestratorResult<u64>;

    /// Submit a signed withdrawal; returns the venue withdrawal-request id
    async fn submit_withdrawal(
        &self,
        account_id: &str,
        api_secret: &str,
        request: &WithdrawalRequest,
    ) -> OrchestratorResult<String>;

    async fn get_asset_history(
        &self,
        account_id: &str,
        api_secret: &str,
        filter: &AssetHistoryFilter,
    ) -> OrchestratorResult<Vec<AssetHistoryRow>>;

    async fn get_holding(
        &self,
        account_id: &str,
        api_secret: &str,
    ) -> OrchestratorResult<Vec<HoldingRow>>;

    /// Single-use nonce for internal transfers (identical signing contract)
    async fn get_transfer_nonce(
        &self,
        account_id: &str,
        api_secret: &str,
    ) -> OrchestratorResult<u64>;

    /// Submit a signed internal transfer; returns the venue request id
    async fn create_internal_transfer(
        &self,
        account_id: &str,
        api_secret: &str,
        request: &InternalTransferRequest,
    ) -> OrchestratorResult<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::signer::sign_message_base58;
    use ed25519_dalek::{Signature, SigningKey, Verifier};

    #[test]
    fn internal_transfer_envelope_serializes_camel_case_and_signs() {
        let message = InternalTransferMessage {
            receiver: "0xreceiver".to_string(),
            token: "SOL".to_string(),
            amount: "500000000".to_string(),
            transfer_nonce: "7".to_string(),
            chain_id: "900900900".to_string(),
            chain_type: "SOL".to_string(),
        };

        // Field names are the wire contract the venue verifies against
        let payload = serde_json::to_string(&message).unwrap();
        assert_eq!(
            payload,
            "{\"receiver\":\"0xreceiver\",\"token\":\"SOL\",\
             \"amount\":\"500000000\",\"transferNonce\":\"7\",\
             \"chainId\":\"900900900\",\"chainType\":\"SOL\"}"
        );

        let seed = [9u8; 32];
        let secret = bs58::encode(seed).into_string();
        let signature = sign_message_base58(&secret, &payload).unwrap();

        let request = InternalTransferRequest {
            signature: signature.clone(),
            user_address: "SoLUserAddr".to_string(),
            verifying_contract: "0xledgercontract".to_string(),
            message,
        };
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["userAddress"], "SoLUserAddr");
        assert_eq!(body["verifyingContract"], "0xledgercontract");
        assert_eq!(body["message"]["transferNonce"], "7");

        let sig_bytes: [u8; 64] = bs58::decode(&signature)
            .into_vec()
            .unwrap()
            .try_into()
            .unwrap();
        let verifying = SigningKey::from_bytes(&seed).verifying_key();
        assert!(verifying
            .verify(payload.as_bytes(), &Signature::from_bytes(&sig_bytes))
            .is_ok());
    }
}
