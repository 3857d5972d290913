//! Swap state machine
//!
//! One logical cross-system swap is a single ledger row walked through a
//! directed sequence of statuses. Each direction owns its own state set and
//! the transition table below is the only authority on which edges are
//! legal; the ledger validates every mutation against it.

use crate::error::{OrchestratorError, OrchestratorResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// ADA -> exchange -> SOL -> venue vault
    Deposit,
    /// Venue -> SOL -> exchange -> ADA
    Withdraw,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Deposit => "DEPOSIT",
            Direction::Withdraw => "WITHDRAW",
        }
    }

    pub fn parse(s: &str) -> OrchestratorResult<Self> {
        match s {
            "DEPOSIT" => Ok(Direction::Deposit),
            "WITHDRAW" => Ok(Direction::Withdraw),
            other => Err(OrchestratorError::Internal(format!(
                "Unknown direction: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a swap row
///
/// Deposit path:  ExchangeCreated -> ExchangeConverting -> ExchangeCompleted
///                -> VenueDepositPending -> VenueDepositConfirmed
/// Withdraw path: VenueWithdrawPending -> VenueWithdrawConfirmed
///                -> ExchangeConverting -> ExchangeCompleted -> Completed
///
/// `Failed` is reachable from any non-terminal state of either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapStatus {
    ExchangeCreated,
    ExchangeConverting,
    ExchangeCompleted,
    VenueDepositPending,
    VenueDepositConfirmed,
    VenueWithdrawPending,
    VenueWithdrawConfirmed,
    Completed,
    Failed,
}

impl SwapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwapStatus::ExchangeCreated => "EXCHANGE_CREATED",
            SwapStatus::ExchangeConverting => "EXCHANGE_CONVERTING",
            SwapStatus::ExchangeCompleted => "EXCHANGE_COMPLETED",
            SwapStatus::VenueDepositPending => "VENUE_DEPOSIT_PENDING",
            SwapStatus::VenueDepositConfirmed => "VENUE_DEPOSIT_CONFIRMED",
            SwapStatus::VenueWithdrawPending => "VENUE_WITHDRAW_PENDING",
            SwapStatus::VenueWithdrawConfirmed => "VENUE_WITHDRAW_CONFIRMED",
            SwapStatus::Completed => "COMPLETED",
            SwapStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> OrchestratorResult<Self> {
        match s {
            "EXCHANGE_CREATED" => Ok(SwapStatus::ExchangeCreated),
            "EXCHANGE_CONVERTING" => Ok(SwapStatus::ExchangeConverting),
            "EXCHANGE_COMPLETED" => Ok(SwapStatus::ExchangeCompleted),
            "VENUE_DEPOSIT_PENDING" => Ok(SwapStatus::VenueDepositPending),
            "VENUE_DEPOSIT_CONFIRMED" => Ok(SwapStatus::VenueDepositConfirmed),
            "VENUE_WITHDRAW_PENDING" => Ok(SwapStatus::VenueWithdrawPending),
            "VENUE_WITHDRAW_CONFIRMED" => Ok(SwapStatus::VenueWithdrawConfirmed),
            "COMPLETED" => Ok(SwapStatus::Completed),
            "FAILED" => Ok(SwapStatus::Failed),
            other => Err(OrchestratorError::Internal(format!(
                "Unknown swap status: {}",
                other
            ))),
        }
    }

    /// State set owned by a direction. `Failed` belongs to both.
    pub fn belongs_to(&self, direction: Direction) -> bool {
        match direction {
            Direction::Deposit => matches!(
                self,
                SwapStatus::ExchangeCreated
                    | SwapStatus::ExchangeConverting
                    | SwapStatus::ExchangeCompleted
                    | SwapStatus::VenueDepositPending
                    | SwapStatus::VenueDepositConfirmed
                    | SwapStatus::Failed
            ),
            Direction::Withdraw => matches!(
                self,
                SwapStatus::VenueWithdrawPending
                    | SwapStatus::VenueWithdrawConfirmed
                    | SwapStatus::ExchangeConverting
                    | SwapStatus::ExchangeCompleted
                    | SwapStatus::Completed
                    | SwapStatus::Failed
            ),
        }
    }

    /// Terminal states are never left again
    pub fn is_terminal(&self, direction: Direction) -> bool {
        match direction {
            Direction::Deposit => {
                matches!(self, SwapStatus::VenueDepositConfirmed | SwapStatus::Failed)
            }
            Direction::Withdraw => matches!(self, SwapStatus::Completed | SwapStatus::Failed),
        }
    }

    /// Forward edges of the state machine, per direction
    pub fn can_transition(&self, direction: Direction, to: SwapStatus) -> bool {
        if !self.belongs_to(direction) || !to.belongs_to(direction) {
            return false;
        }

        // Any non-terminal state may fail during its own processing step
        if to == SwapStatus::Failed {
            return !self.is_terminal(direction);
        }

        match direction {
            Direction::Deposit => matches!(
                (self, to),
                (SwapStatus::ExchangeCreated, SwapStatus::ExchangeConverting)
                    | (SwapStatus::ExchangeCreated, SwapStatus::ExchangeCompleted)
                    | (SwapStatus::ExchangeConverting, SwapStatus::ExchangeCompleted)
                    | (SwapStatus::ExchangeCompleted, SwapStatus::VenueDepositPending)
                    | (SwapStatus::VenueDepositPending, SwapStatus::VenueDepositConfirmed)
            ),
            Direction::Withdraw => matches!(
                (self, to),
                (SwapStatus::VenueWithdrawPending, SwapStatus::VenueWithdrawConfirmed)
                    | (SwapStatus::VenueWithdrawConfirmed, SwapStatus::ExchangeConverting)
                    | (SwapStatus::ExchangeConverting, SwapStatus::ExchangeCompleted)
                    | (SwapStatus::ExchangeCompleted, SwapStatus::Completed)
            ),
        }
    }

    /// In-flight set for the exchange-conversion sweep
    pub fn exchange_sweep_set() -> &'static [SwapStatus] {
        &[SwapStatus::ExchangeCreated, SwapStatus::ExchangeConverting]
    }

    /// In-flight set for the venue-withdrawal sweep
    pub fn withdrawal_sweep_set() -> &'static [SwapStatus] {
        &[SwapStatus::VenueWithdrawPending]
    }
}

impl fmt::Display for SwapStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SwapStatus; 9] = [
        SwapStatus::ExchangeCreated,
        SwapStatus::ExchangeConverting,
        SwapStatus::ExchangeCompleted,
        SwapStatus::VenueDepositPending,
        SwapStatus::VenueDepositConfirmed,
        SwapStatus::VenueWithdrawPending,
        SwapStatus::VenueWithdrawConfirmed,
        SwapStatus::Completed,
        SwapStatus::Failed,
    ];

    #[test]
    fn round_trips_through_strings() {
        for status in ALL {
            assert_eq!(SwapStatus::parse(status.as_str()).unwrap(), status);
        }
        assert_eq!(Direction::parse("DEPOSIT").unwrap(), Direction::Deposit);
        assert_eq!(Direction::parse("WITHDRAW").unwrap(), Direction::Withdraw);
        assert!(SwapStatus::parse("EXCHANGING").is_err());
    }

    #[test]
    fn state_sets_are_exclusive_outside_shared_states() {
        // Venue-deposit states never appear on withdrawals and vice versa
        assert!(!SwapStatus::VenueDepositPending.belongs_to(Direction::Withdraw));
        assert!(!SwapStatus::VenueDepositConfirmed.belongs_to(Direction::Withdraw));
        assert!(!SwapStatus::VenueWithdrawPending.belongs_to(Direction::Deposit));
        assert!(!SwapStatus::VenueWithdrawConfirmed.belongs_to(Direction::Deposit));
        assert!(!SwapStatus::Completed.belongs_to(Direction::Deposit));
        assert!(!SwapStatus::ExchangeCreated.belongs_to(Direction::Withdraw));

        // The exchange leg and Failed are shared
        assert!(SwapStatus::ExchangeConverting.belongs_to(Direction::Deposit));
        assert!(SwapStatus::ExchangeConverting.belongs_to(Direction::Withdraw));
        assert!(SwapStatus::Failed.belongs_to(Direction::Deposit));
        assert!(SwapStatus::Failed.belongs_to(Direction::Withdraw));
    }

    #[test]
    fn deposit_walks_forward_only() {
        let d = Direction::Deposit;
        assert!(SwapStatus::ExchangeCreated.can_transition(d, SwapStatus::ExchangeConverting));
        assert!(SwapStatus::ExchangeConverting.can_transition(d, SwapStatus::ExchangeCompleted));
        assert!(SwapStatus::ExchangeCompleted.can_transition(d, SwapStatus::VenueDepositPending));
        assert!(
            SwapStatus::VenueDepositPending.can_transition(d, SwapStatus::VenueDepositConfirmed)
        );

        // No skipping or walking backwards
        assert!(!SwapStatus::ExchangeCreated.can_transition(d, SwapStatus::VenueDepositPending));
        assert!(!SwapStatus::ExchangeConverting.can_transition(d, SwapStatus::ExchangeCreated));
        assert!(!SwapStatus::VenueDepositConfirmed.can_transition(d, SwapStatus::ExchangeCreated));
    }

    #[test]
    fn deposit_may_complete_exchange_without_observing_converting() {
        // The gateway can report "finished" before any sweep saw "converting"
        assert!(SwapStatus::ExchangeCreated
            .can_transition(Direction::Deposit, SwapStatus::ExchangeCompleted));
    }

    #[test]
    fn withdraw_walks_forward_only() {
        let w = Direction::Withdraw;
        assert!(
            SwapStatus::VenueWithdrawPending.can_transition(w, SwapStatus::VenueWithdrawConfirmed)
        );
        assert!(
            SwapStatus::VenueWithdrawConfirmed.can_transition(w, SwapStatus::ExchangeConverting)
        );
        assert!(SwapStatus::ExchangeConverting.can_transition(w, SwapStatus::ExchangeCompleted));
        assert!(SwapStatus::ExchangeCompleted.can_transition(w, SwapStatus::Completed));

        assert!(!SwapStatus::VenueWithdrawPending.can_transition(w, SwapStatus::ExchangeConverting));
        assert!(!SwapStatus::Completed.can_transition(w, SwapStatus::VenueWithdrawPending));
    }

    #[test]
    fn cross_direction_edges_are_rejected() {
        // A withdraw row can never enter the deposit-only tail
        assert!(!SwapStatus::ExchangeCompleted
            .can_transition(Direction::Withdraw, SwapStatus::VenueDepositPending));
        // A deposit row can never claim the withdraw terminal
        assert!(!SwapStatus::ExchangeCompleted
            .can_transition(Direction::Deposit, SwapStatus::Completed));
    }

    #[test]
    fn failed_reachable_from_all_non_terminal_states() {
        for status in ALL {
            for direction in [Direction::Deposit, Direction::Withdraw] {
                if !status.belongs_to(direction) {
                    continue;
                }
                let expected = !status.is_terminal(direction);
                assert_eq!(
                    status.can_transition(direction, SwapStatus::Failed),
                    expected,
                    "{:?} -> Failed for {:?}",
                    status,
                    direction
                );
            }
        }
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        for direction in [Direction::Deposit, Direction::Withdraw] {
            for from in ALL.iter().filter(|s| s.is_terminal(direction)) {
                for to in ALL {
                    assert!(
                        !from.can_transition(direction, to),
                        "{:?} must be terminal for {:?}",
                        from,
                        direction
                    );
                }
            }
        }
    }

    #[test]
    fn sweep_sets_exclude_failed_rows() {
        assert!(!SwapStatus::exchange_sweep_set().contains(&SwapStatus::Failed));
        assert!(!SwapStatus::withdrawal_sweep_set().contains(&SwapStatus::Failed));
        assert!(!SwapStatus::exchange_sweep_set().contains(&SwapStatus::ExchangeCompleted));
    }
}
