//! Currency-conversion exchange gateway
//!
//! Adapter for the third-party service that converts between assets across
//! networks. The orchestrators create orders here, fund the quoted pay-in
//! address on-chain, and poll order status until the conversion finishes.

pub mod client;

pub use client::ExchangeClient;

use crate::error::OrchestratorResult;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Parameters for creating a conversion order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateExchangeRequest {
    pub from_currency: String,
    pub to_currency: String,
    pub from_network: String,
    pub to_network: String,
    pub from_amount: Decimal,
    /// Payout address on the destination network
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_address: Option<String>,
    pub flow: String,
}

/// A created conversion order
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeOrder {
    pub id: String,
    pub payin_address: String,
    pub payout_address: String,
    pub from_amount: Decimal,
    #[serde(default)]
    pub to_amount: Option<Decimal>,
    pub from_currency: String,
    pub to_currency: String,
    pub from_network: String,
    pub to_network: String,
    #[serde(default)]
    pub flow: Option<String>,
}

/// Gateway-reported conversion state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionStatus {
    New,
    Waiting,
    Confirming,
    Exchanging,
    Converting,
    Sending,
    Finished,
    Failed,
    Refunded,
    #[serde(other)]
    Unknown,
}

impl ConversionStatus {
    /// The conversion is running and will be polled again
    pub fn is_converting(&self) -> bool {
        matches!(
            self,
            ConversionStatus::Confirming
                | ConversionStatus::Exchanging
                | ConversionStatus::Converting
                | ConversionStatus::Sending
        )
    }
}

/// Status snapshot of an order
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeStatus {
    pub status: ConversionStatus,
    #[serde(default)]
    pub to_amount: Option<Decimal>,
}

/// Currency pair for minimum-amount lookups
#[derive(Debug, Clone)]
pub struct CurrencyPair {
    pub from_currency: String,
    pub to_currency: String,
    pub from_network: String,
    pub to_network: String,
}

/// Exchange gateway seam
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn create_exchange(
        &self,
        request: &CreateExchangeRequest,
    ) -> OrchestratorResult<ExchangeOrder>;

    async fn get_status(&self, exchange_id: &str) -> OrchestratorResult<ExchangeStatus>;

    /// Minimum accepted pay-in amount for a pair
    async fn get_min_amount(&self, pair: &CurrencyPair) -> OrchestratorResult<Decimal>;
}
