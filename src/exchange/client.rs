//! HTTP client for the conversion gateway

use super::{
    CreateExchangeRequest, CurrencyPair, ExchangeGateway, ExchangeOrder, ExchangeStatus,
};
use crate::config::ExchangeConfig;
use crate::error::{OrchestratorError, OrchestratorResult};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

const SYSTEM: &str = "exchange";
const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MinAmountResponse {
    min_amount: Decimal,
}

/// Conversion gateway REST client
pub struct ExchangeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ExchangeClient {
    pub fn new(config: &ExchangeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    async fn parse<T: serde::de::DeserializeOwned>(
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

        response
            .json()
            .await
            .map_err(|e| OrchestratorError::adapter(SYSTEM, e.to_string()))
    }
}

#[async_trait]
impl ExchangeGateway for ExchangeClient {
    async fn create_exchange(
        &self,
        request: &CreateExchangeRequest,
    ) -> OrchestratorResult<ExchangeOrder> {
        debug!(
            "Creating exchange order {} {} -> {} {}",
            request.from_amount, request.from_currency, request.to_currency, request.address
        );

        let response = self
            .http
            .post(format!("{}/v2/exchange", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| OrchestratorError::adapter(SYSTEM, e.to_string()))?;

        Self::parse(response).await
    }

    async fn get_status(&self, exchange_id: &str) -> OrchestratorResult<ExchangeStatus> {
        let response = self
            .http
            .get(format!("{}/v2/exchange/by-id", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("id", exchange_id)])
            .send()
            .await
            .map_err(|e| OrchestratorError::adapter(SYSTEM, e.to_string()))?;

        Self::parse(response).await
    }

    async fn get_min_amount(&self, pair: &CurrencyPair) -> OrchestratorResult<Decimal> {
        let response = self
            .http
            .get(format!("{}/v2/exchange/min-amount", self.base_url))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[
                ("fromCurrency", pair.from_currency.as_str()),
                ("toCurrency", pair.to_currency.as_str()),
                ("fromNetwork", pair.from_network.as_str()),
                ("toNetwork", pair.to_network.as_str()),
            ])
            .send()
            .await
            .map_err(|e| OrchestratorError::adapter(SYSTEM, e.to_string()))?;

        let data: MinAmountResponse = Self::parse(response).await?;
        Ok(data.min_amount)
    }
}
