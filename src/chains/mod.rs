//! Chain transactors
//!
//! Adapters that sign and submit native transfers (and the Solana vault
//! deposit) given decrypted secret material. Secret material enters these
//! adapters per call and is dropped at the end of it.

pub mod cardano;
pub mod solana;

pub use cardano::CardanoTransactor;
pub use solana::SolanaTransactor;

use crate::error::{OrchestratorError, OrchestratorResult};

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Decimal places of the chains' smallest units
pub const LOVELACE_DECIMALS: u32 = 6;
pub const LAMPORT_DECIMALS: u32 = 9;

/// Native transfer seam, one implementation per chain
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainTransactor: Send + Sync {
    /// Transfer `amount` (smallest unit) to `address`, returning the tx hash
    async fn send_payment(
        &self,
        secret: &str,
        address: &str,
        amount: u64,
    ) -> OrchestratorResult<String>;
}

/// Venue vault-deposit seam (Solana only)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VaultTransactor: Send + Sync {
    /// Submit the on-chain instruction crediting the venue's custodial
    /// balance, returning the tx hash
    async fn submit_vault_deposit(
        &self,
        secret: &str,
        account_id: &str,
        broker_id: &str,
        token: &str,
        amount: u64,
    ) -> OrchestratorResult<String>;
}

/// Convert a fractional amount to the chain's smallest integer unit,
/// truncating toward zero. Fixed-point throughout: two chained conversions
/// per saga make float truncation a real loss, not a rounding nit.
pub fn to_smallest_unit(amount: Decimal, decimals: u32) -> OrchestratorResult<u64> {
    let scaled = amount
        .checked_mul(Decimal::from(10u64.pow(decimals)))
        .ok_or_else(|| {
            OrchestratorError::AmountConversion(format!("Overflow scaling {}", amount))
        })?;

    scaled.trunc().to_u64().ok_or_else(|| {
        OrchestratorError::AmountConversion(format!("{} is not a valid smallest-unit amount", amount))
    })
}

/// Convert a smallest-unit integer back to the fractional representation
pub fn from_smallest_unit(amount: u64, decimals: u32) -> Decimal {
    Decimal::new(amount as i64, decimals).normalize()
}
