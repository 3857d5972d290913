//! Error types for the Passage orchestrator

use thiserror::Error;

/// Main error type for the orchestrator
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Adapter error from {system}: {message}")]
    Adapter { system: String, message: String },

    #[error("Wallet {wallet_address} not found")]
    WalletNotFound { wallet_address: String },

    #[error("Wallet {wallet_address} has no venue account")]
    VenueAccountMissing { wallet_address: String },

    #[error("Transaction {tx_id} not found")]
    TransactionNotFound { tx_id: String },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Stale status on transaction {tx_id}: expected {expected}")]
    StaleStatus { tx_id: String, expected: String },

    #[error("Key vault error: {0}")]
    KeyVault(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Amount conversion error: {0}")]
    AmountConversion(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    /// Adapter error helper for a named external system
    pub fn adapter(system: &str, message: impl Into<String>) -> Self {
        OrchestratorError::Adapter {
            system: system.to_string(),
            message: message.into(),
        }
    }

    /// Check if the error is bad caller input (no ledger mutation happened)
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            OrchestratorError::Validation(_)
                | OrchestratorError::WalletNotFound { .. }
                | OrchestratorError::VenueAccountMissing { .. }
        )
    }

    /// Check if the error came from an external system and may clear on the
    /// next sweep
    pub fn is_adapter(&self) -> bool {
        matches!(self, OrchestratorError::Adapter { .. })
    }
}

/// Result type for orchestrator operations
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
