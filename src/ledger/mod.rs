//! Transaction ledger
//!
//! Single persisted source of truth for swap rows. Rows are created by an
//! orchestrator entry point, mutated in place by that orchestrator's own
//! reconciliation step, and never deleted. The user wallet directory is
//! owned by an external subsystem; this core only reads it.

mod store;

pub use store::PgLedger;

use crate::error::OrchestratorResult;
use crate::swap::{Direction, SwapStatus};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// One persisted record of a logical cross-system swap
#[derive(Debug, Clone, Serialize)]
pub struct SwapTransaction {
    pub id: Uuid,
    pub direction: Direction,
    pub status: SwapStatus,
    /// Third-party conversion order id, immutable once set
    pub exchange_id: Option<String>,
    pub from_currency: String,
    pub to_currency: String,
    pub from_network: String,
    pub to_network: String,
    pub from_amount: Decimal,
    /// Written at most once per leg, by the terminal "finished" observation
    pub to_amount: Option<Decimal>,
    pub payin_address: String,
    pub payout_address: String,
    pub user_address: String,
    /// On-chain funding hash for the exchange leg
    pub refund_hash: Option<String>,
    /// Venue withdrawal-request id
    pub venue_tx_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Encrypted secret bundle as stored by the user-management subsystem
#[derive(Debug, Clone)]
pub struct EncryptedSecret {
    pub iv: String,
    pub ciphertext: String,
    pub auth_tag: String,
}

/// User wallet row (read-only to this core)
#[derive(Debug, Clone)]
pub struct UserWallet {
    pub wallet_address: String,
    pub cardano_address: String,
    pub solana_address: String,
    pub cardano_key: EncryptedSecret,
    pub solana_key: EncryptedSecret,
    /// Venue API signing key, distinct from the chain keys
    pub venue_key: EncryptedSecret,
    pub venue_account_id: Option<String>,
    pub auth_nonce: Option<String>,
    pub refresh_token_version: i32,
}

/// Swap row counts for the status API
#[derive(Debug, Clone, Serialize)]
pub struct SwapStats {
    pub in_flight: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Persistence seam for swap rows and wallet reads
///
/// `transition` is the single point of status mutation: it validates the
/// edge against the state machine and applies it compare-and-set on the
/// expected prior status, so overlapping sweeps cannot double-apply.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn create(&self, tx: &SwapTransaction) -> OrchestratorResult<()>;

    async fn get(&self, id: Uuid) -> OrchestratorResult<SwapTransaction>;

    async fn get_by_wallet(&self, wallet_address: &str)
        -> OrchestratorResult<Vec<SwapTransaction>>;

    /// All rows whose status is in the given in-flight set, oldest first
    async fn pending_with_status(
        &self,
        statuses: &[SwapStatus],
    ) -> OrchestratorResult<Vec<SwapTransaction>>;

    /// Apply `from -> to`, rejecting edges outside the direction's table and
    /// returning `StaleStatus` when the row is no longer at `from`
    async fn transition(
        &self,
        id: Uuid,
        direction: Direction,
        from: SwapStatus,
        to: SwapStatus,
    ) -> OrchestratorResult<()>;

    /// Force a non-terminal row to FAILED (sweep-level error handler)
    async fn mark_failed(&self, id: Uuid, direction: Direction) -> OrchestratorResult<()>;

    /// Write-once: rejected if an exchange order id is already recorded.
    /// Also records the order's pay-in address, unknown until this point
    /// on withdrawal rows.
    async fn set_exchange_order(
        &self,
        id: Uuid,
        exchange_id: &str,
        payin_address: &str,
    ) -> OrchestratorResult<()>;

    /// Write-once: rejected if the leg's `to_amount` is already recorded
    async fn set_to_amount(&self, id: Uuid, amount: Decimal) -> OrchestratorResult<()>;

    async fn set_funding_hash(&self, id: Uuid, tx_hash: &str) -> OrchestratorResult<()>;

    async fn set_venue_tx_id(&self, id: Uuid, venue_tx_id: &str) -> OrchestratorResult<()>;

    async fn get_wallet(&self, wallet_address: &str) -> OrchestratorResult<UserWallet>;

    async fn stats(&self) -> OrchestratorResult<SwapStats>;
}
