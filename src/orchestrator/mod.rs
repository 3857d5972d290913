//! Swap orchestrators
//!
//! The two sagas driving a swap row through its state machine. Each external
//! step (exchange order, on-chain funding, venue call) happens against a
//! mocked-out adapter seam; the orchestrators own only the sequencing and
//! the ledger writes between steps.

pub mod deposit;
pub mod withdrawal;

pub use deposit::DepositOrchestrator;
pub use withdrawal::WithdrawalOrchestrator;

/// Currency/network identifiers on the conversion gateway
pub const ADA_CURRENCY: &str = "ada";
pub const SOL_CURRENCY: &str = "sol";
pub const ADA_NETWORK: &str = "ada";
pub const SOL_NETWORK: &str = "sol";

/// Venue-side identifiers
pub const VENUE_TOKEN: &str = "SOL";
pub const VENUE_CHAIN_TYPE: &str = "SOL";
pub const HISTORY_SIDE_WITHDRAW: &str = "WITHDRAW";
pub const HISTORY_STATUS_COMPLETED: &str = "COMPLETED";
