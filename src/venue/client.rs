//! HTTP client for the trading venue REST API

use super::signer::{
    HttpMethod, RequestSigner, SignedHeaders, HEADER_ACCOUNT_ID, HEADER_KEY, HEADER_SIGNATURE,
    HEADER_TIMESTAMP,
};
use super::{
    AssetHistoryFilter, AssetHistoryRow, HoldingRow, InternalTransferRequest, VenueGateway,
    WithdrawalRequest,
};
use crate::config::VenueConfig;
use crate::error::{OrchestratorError, OrchestratorResult};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

const SYSTEM: &str = "venue";

/// Standard venue response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WithdrawNonceData {
    withdraw_nonce: u64,
}

#[derive(Debug, Deserialize)]
struct TransferNonceData {
    transfer_nonce: u64,
}

#[derive(Debug, Deserialize)]
struct WithdrawData {
    withdraw_id: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct InternalTransferData {
    internal_transfer_request_id: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RowsData<T> {
    rows: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct HoldingData {
    holding: Vec<HoldingRow>,
}

/// Venue REST client authenticated via [`RequestSigner`]
pub struct VenueClient {
    http: reqwest::Client,
    base_url: String,
}

impl VenueClient {
    pub fn new(config: &VenueConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn apply_headers(
        builder: reqwest::RequestBuilder,
        headers: &SignedHeaders,
    ) -> reqwest::RequestBuilder {
        builder
            .header("Content-Type", headers.content_type)
            .header(HEADER_ACCOUNT_ID, &headers.account_id)
            .header(HEADER_TIMESTAMP, &headers.timestamp)
            .header(HEADER_KEY, &headers.key)
            .header(HEADER_SIGNATURE, &headers.signature)
    }

    async fn signed_get<T: DeserializeOwned>(
        &self,
        account_id: &str,
        api_secret: &str,
        path: &str,
    ) -> OrchestratorResult<T> {
        let headers = RequestSigner::sign(account_id, api_secret, HttpMethod::Get, path, None)?;
        let builder = self.http.get(format!("{}{}", self.base_url, path));
        let response = Self::apply_headers(builder, &headers)
            .send()
            .await
            .map_err(|e| OrchestratorError::adapter(SYSTEM, e.to_string()))?;

        Self::parse_envelope(response).await
    }

    /// Signed POST. The body is serialized exactly once; the signed bytes
    /// are the transmitted bytes.
    async fn signed_post<T: DeserializeOwned>(
        &self,
        account_id: &str,
        api_secret: &str,
        path: &str,
        body: &impl serde::Serialize,
    ) -> OrchestratorResult<T> {
        let body_str = serde_json::to_string(body)
            .map_err(|e| OrchestratorError::Internal(e.to_string()))?;

        let headers =
            RequestSigner::sign(account_id, api_secret, HttpMethod::Post, path, Some(&body_str))?;

        debug!("Signed venue POST {}", path);

        let builder = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .body(body_str);
        let response = Self::apply_headers(builder, &headers)
            .send()
            .await
            .map_err(|e| OrchestratorError::adapter(SYSTEM, e.to_string()))?;

        Self::parse_envelope(response).await
    }

    async fn parse_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> OrchestratorResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::adapter(
                SYSTEM,
                format!("HTTP {}: {}", status, body),
            ));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| OrchestratorError::adapter(SYSTEM, e.to_string()))?;

        if !envelope.success {
            return Err(OrchestratorError::adapter(
                SYSTEM,
                envelope
                    .message
                    .unwrap_or_else(|| "Request rejected".to_string()),
            ));
        }

        envelope
            .data
            .ok_or_else(|| OrchestratorError::adapter(SYSTEM, "Empty response data"))
    }
}

#[async_trait]
impl VenueGateway for VenueClient {
    async fn get_withdraw_nonce(
        &self,
        account_id: &str,
        api_secret: &str,
    ) -> OrchestratorResult<u64> {
        let data: WithdrawNonceData = self
            .signed_get(account_id, api_secret, "/v1/withdraw_nonce")
            .await?;
        Ok(data.withdraw_nonce)
    }

    async fn submit_withdrawal(
        &self,
        account_id: &str,
        api_secret: &str,
        request: &WithdrawalRequest,
    ) -> OrchestratorResult<String> {
        let data: WithdrawData = self
            .signed_post(account_id, api_secret, "/v1/withdraw_request", request)
            .await?;
        Ok(json_id_to_string(data.withdraw_id))
    }

    async fn get_asset_history(
        &self,
        account_id: &str,
        api_secret: &str,
        filter: &AssetHistoryFilter,
    ) -> OrchestratorResult<Vec<AssetHistoryRow>> {
        let path = format!(
            "/v1/asset/history?side={}&token={}",
            filter.side, filter.token
        );
        let data: RowsData<AssetHistoryRow> =
            self.signed_get(account_id, api_secret, &path).await?;
        Ok(data.rows)
    }

    async fn get_holding(
        &self,
        account_id: &str,
        api_secret: &str,
    ) -> OrchestratorResult<Vec<HoldingRow>> {
        let data: HoldingData = self
            .signed_get(account_id, api_secret, "/v1/client/holding")
            .await?;
        Ok(data.holding)
    }

    async fn get_transfer_nonce(
        &self,
        account_id: &str,
        api_secret: &str,
    ) -> OrchestratorResult<u64> {
        let data: TransferNonceData = self
            .signed_get(account_id, api_secret, "/v1/transfer_nonce")
            .await?;
        Ok(data.transfer_nonce)
    }

    async fn create_internal_transfer(
        &self,
        account_id: &str,
        api_secret: &str,
        request: &InternalTransferRequest,
    ) -> OrchestratorResult<String> {
        let data: InternalTransferData = self
            .signed_post(account_id, api_secret, "/v2/internal_transfer", request)
            .await?;
        Ok(json_id_to_string(data.internal_transfer_request_id))
    }
}

/// Venue ids arrive as either numbers or strings depending on endpoint
fn json_id_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}
