//! Cardano transactor
//!
//! Native ADA transfers go through a colocated wallet agent that owns the
//! serialization-library plumbing (UTxO selection, fee balancing, CBOR).
//! This adapter hands it the decrypted payment key and the transfer and
//! records the resulting tx hash.

use super::ChainTransactor;
use crate::config::CardanoConfig;
use crate::error::{OrchestratorError, OrchestratorResult};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const SYSTEM: &str = "cardano";

#[derive(Debug, Serialize)]
struct PaymentRequest<'a> {
    signing_key: &'a str,
    to_address: &'a str,
    amount_lovelace: u64,
    network: &'a str,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    tx_hash: String,
}

/// ADA transfer adapter backed by the wallet agent
pub struct CardanoTransactor {
    http: reqwest::Client,
    agent_url: String,
    network: String,
}

impl CardanoTransactor {
    pub fn new(config: &CardanoConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            agent_url: config.agent_url.trim_end_matches('/').to_string(),
            network: config.network.clone(),
        }
    }
}

#[async_trait]
impl ChainTransactor for CardanoTransactor {
    async fn send_payment(
        &self,
        secret: &str,
        address: &str,
        amount: u64,
    ) -> OrchestratorResult<String> {
        debug!("Submitting ADA transfer of {} lovelace to {}", amount, address);

        let request = PaymentRequest {
            signing_key: secret,
            to_address: address,
            amount_lovelace: amount,
            network: &self.network,
        };

        let response = self
            .http
            .post(format!("{}/v1/payments", self.agent_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| OrchestratorError::adapter(SYSTEM, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestratorError::adapter(
                SYSTEM,
                format!("HTTP {}: {}", status, body),
            ));
        }

        let payment: PaymentResponse = response
            .json()
            .await
            .map_err(|e| OrchestratorError::adapter(SYSTEM, e.to_string()))?;

        Ok(payment.tx_hash)
    }
}
