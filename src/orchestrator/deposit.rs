//! Deposit saga
//!
//! Drives ADA into the venue's custodial balance: create a conversion order,
//! fund its pay-in address from the user's Cardano wallet, poll the order to
//! completion, then push the received SOL into the venue vault on-chain.
//!
//! `reconcile` also owns the shared exchange-leg polling for withdrawal
//! rows, whose SOL -> ADA conversion finishes the same way.

use super::{ADA_CURRENCY, ADA_NETWORK, SOL_CURRENCY, SOL_NETWORK, VENUE_TOKEN};
use crate::chains::{
    to_smallest_unit, ChainTransactor, VaultTransactor, LAMPORT_DECIMALS, LOVELACE_DECIMALS,
};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::exchange::{ConversionStatus, CreateExchangeRequest, CurrencyPair, ExchangeGateway};
use crate::keyvault::KeyVault;
use crate::ledger::{Ledger, SwapTransaction};
use crate::metrics;
use crate::swap::{Direction, SwapStatus};

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct DepositOrchestrator {
    ledger: Arc<dyn Ledger>,
    exchange: Arc<dyn ExchangeGateway>,
    cardano: Arc<dyn ChainTransactor>,
    vault: Arc<dyn VaultTransactor>,
    keyvault: Arc<KeyVault>,
    broker_id: String,
    flow: String,
}

impl DepositOrchestrator {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        exchange: Arc<dyn ExchangeGateway>,
        cardano: Arc<dyn ChainTransactor>,
        vault: Arc<dyn VaultTransactor>,
        keyvault: Arc<KeyVault>,
        broker_id: String,
        flow: String,
    ) -> Self {
        Self {
            ledger,
            exchange,
            cardano,
            vault,
            keyvault,
            broker_id,
            flow,
        }
    }

    /// Entry point: create the ADA -> SOL conversion order, persist the swap
    /// row, and fund the order's pay-in address from the user's Cardano
    /// wallet.
    ///
    /// A funding failure propagates to the caller and leaves the row at
    /// `EXCHANGE_CREATED`; the exchange sweep will keep observing the
    /// unfunded order until an operator steps in.
    pub async fn create_deposit(
        &self,
        wallet_address: &str,
        from_amount: Decimal,
    ) -> OrchestratorResult<SwapTransaction> {
        if from_amount <= Decimal::ZERO {
            return Err(OrchestratorError::Validation(format!(
                "Deposit amount must be positive, got {}",
                from_amount
            )));
        }

        let wallet = self.ledger.get_wallet(wallet_address).await?;

        let pair = CurrencyPair {
            from_currency: ADA_CURRENCY.to_string(),
            to_currency: SOL_CURRENCY.to_string(),
            from_network: ADA_NETWORK.to_string(),
            to_network: SOL_NETWORK.to_string(),
        };
        let min_amount = self.exchange.get_min_amount(&pair).await?;
        if from_amount < min_amount {
            return Err(OrchestratorError::Validation(format!(
                "Deposit amount {} is below the gateway minimum {}",
                from_amount, min_amount
            )));
        }

        let order = self
            .exchange
            .create_exchange(&CreateExchangeRequest {
                from_currency: pair.from_currency.clone(),
                to_currency: pair.to_currency.clone(),
                from_network: pair.from_network.clone(),
                to_network: pair.to_network.clone(),
                from_amount,
                address: wallet.solana_address.clone(),
                refund_address: Some(wallet.cardano_address.clone()),
                flow: self.flow.clone(),
            })
            .await?;

        let now = Utc::now();
        let tx = SwapTransaction {
            id: Uuid::new_v4(),
            direction: Direction::Deposit,
            status: SwapStatus::ExchangeCreated,
            exchange_id: Some(order.id.clone()),
            from_currency: pair.from_currency,
            to_currency: pair.to_currency,
            from_network: pair.from_network,
            to_network: pair.to_network,
            from_amount,
            to_amount: None,
            payin_address: order.payin_address.clone(),
            payout_address: order.payout_address.clone(),
            user_address: wallet_address.to_string(),
            refund_hash: None,
            venue_tx_id: None,
            created_at: now,
            updated_at: now,
        };
        self.ledger.create(&tx).await?;
        metrics::record_swap_created(Direction::Deposit.as_str());
        info!(
            "Created deposit swap {} for {} ADA (order {})",
            tx.id, from_amount, order.id
        );

        let lovelace = to_smallest_unit(from_amount, LOVELACE_DECIMALS)?;
        let cardano_key = self.keyvault.decrypt(&wallet.cardano_key)?;
        let funding_hash = self
            .cardano
            .send_payment(&cardano_key, &order.payin_address, lovelace)
            .await
            .map_err(|e| {
                metrics::record_adapter_error("cardano");
                e
            })?;

        self.ledger.set_funding_hash(tx.id, &funding_hash).await?;
        self.ledger
            .transition(
                tx.id,
                Direction::Deposit,
                SwapStatus::ExchangeCreated,
                SwapStatus::ExchangeConverting,
            )
            .await?;
        metrics::record_transition(
            Direction::Deposit.as_str(),
            SwapStatus::ExchangeConverting.as_str(),
        );
        info!("Funded deposit swap {} with {} lovelace ({})", tx.id, lovelace, funding_hash);

        self.ledger.get(tx.id).await
    }

    /// One reconciliation step for a row in the exchange sweep set, of
    /// either direction. Safe to call repeatedly: an observation that
    /// matches the row's current status is a no-op.
    pub async fn reconcile(&self, tx: &SwapTransaction) -> OrchestratorResult<()> {
        let exchange_id = tx.exchange_id.as_deref().ok_or_else(|| {
            OrchestratorError::Internal(format!("Swap {} has no exchange order id", tx.id))
        })?;

        let observed = self.exchange.get_status(exchange_id).await.map_err(|e| {
            metrics::record_adapter_error("exchange");
            e
        })?;

        match observed.status {
            status if status.is_converting() => {
                if tx.status == SwapStatus::ExchangeCreated {
                    self.ledger
                        .transition(
                            tx.id,
                            tx.direction,
                            SwapStatus::ExchangeCreated,
                            SwapStatus::ExchangeConverting,
                        )
                        .await?;
                    metrics::record_transition(
                        tx.direction.as_str(),
                        SwapStatus::ExchangeConverting.as_str(),
                    );
                }
                Ok(())
            }

            ConversionStatus::Finished => self.finish_exchange_leg(tx, observed.to_amount).await,

            ConversionStatus::Failed | ConversionStatus::Refunded => {
                warn!(
                    "Exchange order {} for swap {} reported {:?}, marking swap failed",
                    exchange_id, tx.id, observed.status
                );
                self.ledger.mark_failed(tx.id, tx.direction).await?;
                metrics::record_swap_failed(tx.direction.as_str());
                Ok(())
            }

            ConversionStatus::Unknown => {
                warn!(
                    "Exchange order {} for swap {} reported an unrecognized status",
                    exchange_id, tx.id
                );
                Ok(())
            }

            // New / Waiting: the gateway has not observed the pay-in yet
            _ => Ok(()),
        }
    }

    /// The gateway finished converting: record the payout amount, close the
    /// exchange leg, and run the direction's tail.
    async fn finish_exchange_leg(
        &self,
        tx: &SwapTransaction,
        to_amount: Option<Decimal>,
    ) -> OrchestratorResult<()> {
        let to_amount = to_amount.ok_or_else(|| {
            OrchestratorError::adapter("exchange", "Finished order reported no payout amount")
        })?;

        self.ledger.set_to_amount(tx.id, to_amount).await?;
        self.ledger
            .transition(tx.id, tx.direction, tx.status, SwapStatus::ExchangeCompleted)
            .await?;
        metrics::record_transition(
            tx.direction.as_str(),
            SwapStatus::ExchangeCompleted.as_str(),
        );

        match tx.direction {
            Direction::Withdraw => {
                // The reverse conversion paid out to the user's Cardano
                // address; nothing left to do
                self.ledger
                    .transition(
                        tx.id,
                        Direction::Withdraw,
                        SwapStatus::ExchangeCompleted,
                        SwapStatus::Completed,
                    )
                    .await?;
                metrics::record_transition(
                    Direction::Withdraw.as_str(),
                    SwapStatus::Completed.as_str(),
                );
                info!("Withdrawal swap {} completed with {} ADA", tx.id, to_amount);
                Ok(())
            }
            Direction::Deposit => self.deposit_into_venue(tx, to_amount).await,
        }
    }

    /// Push the converted SOL into the venue's on-chain vault, crediting the
    /// user's custodial balance.
    async fn deposit_into_venue(
        &self,
        tx: &SwapTransaction,
        to_amount: Decimal,
    ) -> OrchestratorResult<()> {
        let wallet = self.ledger.get_wallet(&tx.user_address).await?;
        let account_id = wallet.venue_account_id.as_deref().ok_or_else(|| {
            OrchestratorError::VenueAccountMissing {
                wallet_address: tx.user_address.clone(),
            }
        })?;

        let lamports = to_smallest_unit(to_amount, LAMPORT_DECIMALS)?;
        let solana_key = self.keyvault.decrypt(&wallet.solana_key)?;

        // Pending is written immediately before submission so a crash in
        // between is visible as a stuck pending row, never a silent resubmit
        self.ledger
            .transition(
                tx.id,
                Direction::Deposit,
                SwapStatus::ExchangeCompleted,
                SwapStatus::VenueDepositPending,
            )
            .await?;
        metrics::record_transition(
            Direction::Deposit.as_str(),
            SwapStatus::VenueDepositPending.as_str(),
        );

        let chain_hash = self
            .vault
            .submit_vault_deposit(&solana_key, account_id, &self.broker_id, VENUE_TOKEN, lamports)
            .await
            .map_err(|e| {
                metrics::record_adapter_error("solana");
                e
            })?;

        self.ledger.set_venue_tx_id(tx.id, &chain_hash).await?;
        self.ledger
            .transition(
                tx.id,
                Direction::Deposit,
                SwapStatus::VenueDepositPending,
                SwapStatus::VenueDepositConfirmed,
            )
            .await?;
        metrics::record_transition(
            Direction::Deposit.as_str(),
            SwapStatus::VenueDepositConfirmed.as_str(),
        );
        info!(
            "Deposit swap {} confirmed: {} lamports into the venue vault ({})",
            tx.id, lamports, chain_hash
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::{MockChainTransactor, MockVaultTransactor};
    use crate::config::KeyVaultConfig;
    use crate::exchange::{ExchangeOrder, ExchangeStatus, MockExchangeGateway};
    use crate::ledger::{MockLedger, UserWallet};
    use rust_decimal_macros::dec;

    const WALLET: &str = "wallet-1";
    const VENUE_ACCOUNT: &str =
        "0x1111111111111111111111111111111111111111111111111111111111111111";

    fn keyvault() -> Arc<KeyVault> {
        Arc::new(
            KeyVault::new(&KeyVaultConfig {
                encryption_key: "a1".repeat(32),
            })
            .unwrap(),
        )
    }

    fn test_wallet(vault: &KeyVault) -> UserWallet {
        let solana_seed = bs58::encode([7u8; 32]).into_string();
        UserWallet {
            wallet_address: WALLET.to_string(),
            cardano_address: "addr1_user".to_string(),
            solana_address: "SoLUserAddr".to_string(),
            cardano_key: vault.encrypt("cardano-payment-skey", &[1u8; 12]).unwrap(),
            solana_key: vault.encrypt(&solana_seed, &[2u8; 12]).unwrap(),
            venue_key: vault.encrypt(&solana_seed, &[3u8; 12]).unwrap(),
            venue_account_id: Some(VENUE_ACCOUNT.to_string()),
            auth_nonce: None,
            refresh_token_version: 0,
        }
    }

    fn deposit_row(status: SwapStatus) -> SwapTransaction {
        let now = Utc::now();
        SwapTransaction {
            id: Uuid::new_v4(),
            direction: Direction::Deposit,
            status,
            exchange_id: Some("order-1".to_string()),
            from_currency: ADA_CURRENCY.to_string(),
            to_currency: SOL_CURRENCY.to_string(),
            from_network: ADA_NETWORK.to_string(),
            to_network: SOL_NETWORK.to_string(),
            from_amount: dec!(10),
            to_amount: None,
            payin_address: "addr1_payin".to_string(),
            payout_address: "SoLUserAddr".to_string(),
            user_address: WALLET.to_string(),
            refund_hash: None,
            venue_tx_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn orchestrator(
        ledger: MockLedger,
        exchange: MockExchangeGateway,
        cardano: MockChainTransactor,
        vault: MockVaultTransactor,
    ) -> DepositOrchestrator {
        DepositOrchestrator::new(
            Arc::new(ledger),
            Arc::new(exchange),
            Arc::new(cardano),
            Arc::new(vault),
            keyvault(),
            "broker-1".to_string(),
            "standard".to_string(),
        )
    }

    fn order(id: &str) -> ExchangeOrder {
        ExchangeOrder {
            id: id.to_string(),
            payin_address: "addr1_payin".to_string(),
            payout_address: "SoLUserAddr".to_string(),
            from_amount: dec!(10),
            to_amount: None,
            from_currency: ADA_CURRENCY.to_string(),
            to_currency: SOL_CURRENCY.to_string(),
            from_network: ADA_NETWORK.to_string(),
            to_network: SOL_NETWORK.to_string(),
            flow: Some("standard".to_string()),
        }
    }

    #[tokio::test]
    async fn create_deposit_funds_exchange_and_advances() {
        let vault_box = keyvault();
        let wallet = test_wallet(&vault_box);

        let mut ledger = MockLedger::new();
        let mut exchange = MockExchangeGateway::new();
        let mut cardano = MockChainTransactor::new();

        let w = wallet.clone();
        ledger
            .expect_get_wallet()
            .withf(|addr| addr == WALLET)
            .returning(move |_| Ok(w.clone()));
        exchange
            .expect_get_min_amount()
            .returning(|_| Ok(dec!(5)));
        exchange
            .expect_create_exchange()
            .withf(|req| {
                req.from_currency == "ada"
                    && req.to_currency == "sol"
                    && req.from_amount == dec!(10)
                    && req.address == "SoLUserAddr"
                    && req.refund_address.as_deref() == Some("addr1_user")
            })
            .times(1)
            .returning(|_| Ok(order("order-1")));
        ledger
            .expect_create()
            .withf(|tx| {
                tx.direction == Direction::Deposit
                    && tx.status == SwapStatus::ExchangeCreated
                    && tx.exchange_id.as_deref() == Some("order-1")
            })
            .times(1)
            .returning(|_| Ok(()));
        // 10 ADA funds the pay-in address as exactly 10_000_000 lovelace
        cardano
            .expect_send_payment()
            .withf(|secret, address, amount| {
                secret == "cardano-payment-skey"
                    && address == "addr1_payin"
                    && *amount == 10_000_000
            })
            .times(1)
            .returning(|_, _, _| Ok("cardano-hash".to_string()));
        ledger
            .expect_set_funding_hash()
            .withf(|_, hash| hash == "cardano-hash")
            .times(1)
            .returning(|_, _| Ok(()));
        ledger
            .expect_transition()
            .withf(|_, d, from, to| {
                *d == Direction::Deposit
                    && *from == SwapStatus::ExchangeCreated
                    && *to == SwapStatus::ExchangeConverting
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        ledger
            .expect_get()
            .returning(|id| {
                let mut row = deposit_row(SwapStatus::ExchangeConverting);
                row.id = id;
                Ok(row)
            });

        let orch = orchestrator(ledger, exchange, cardano, MockVaultTransactor::new());
        let tx = orch.create_deposit(WALLET, dec!(10)).await.unwrap();
        assert_eq!(tx.status, SwapStatus::ExchangeConverting);
    }

    #[tokio::test]
    async fn create_deposit_rejects_below_minimum() {
        let vault_box = keyvault();
        let wallet = test_wallet(&vault_box);

        let mut ledger = MockLedger::new();
        let mut exchange = MockExchangeGateway::new();
        ledger
            .expect_get_wallet()
            .returning(move |_| Ok(wallet.clone()));
        exchange.expect_get_min_amount().returning(|_| Ok(dec!(5)));
        // No create_exchange / create expectations: nothing may be persisted

        let orch = orchestrator(
            ledger,
            exchange,
            MockChainTransactor::new(),
            MockVaultTransactor::new(),
        );
        let err = orch.create_deposit(WALLET, dec!(2)).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn create_deposit_funding_failure_leaves_row_created() {
        let vault_box = keyvault();
        let wallet = test_wallet(&vault_box);

        let mut ledger = MockLedger::new();
        let mut exchange = MockExchangeGateway::new();
        let mut cardano = MockChainTransactor::new();

        ledger
            .expect_get_wallet()
            .returning(move |_| Ok(wallet.clone()));
        exchange.expect_get_min_amount().returning(|_| Ok(dec!(5)));
        exchange
            .expect_create_exchange()
            .returning(|_| Ok(order("order-1")));
        ledger.expect_create().times(1).returning(|_| Ok(()));
        cardano
            .expect_send_payment()
            .times(1)
            .returning(|_, _, _| Err(OrchestratorError::adapter("cardano", "agent unreachable")));
        // No transition / mark_failed expectations: the row must stay at
        // EXCHANGE_CREATED and the error must reach the caller

        let orch = orchestrator(ledger, exchange, cardano, MockVaultTransactor::new());
        let err = orch.create_deposit(WALLET, dec!(10)).await.unwrap_err();
        assert!(err.is_adapter());
    }

    #[tokio::test]
    async fn reconcile_converting_is_idempotent() {
        let mut ledger = MockLedger::new();
        let mut exchange = MockExchangeGateway::new();
        exchange.expect_get_status().returning(|_| {
            Ok(ExchangeStatus {
                status: ConversionStatus::Exchanging,
                to_amount: None,
            })
        });
        // Row already at EXCHANGE_CONVERTING: no ledger calls at all
        ledger.expect_transition().never();
        ledger.expect_set_to_amount().never();

        let orch = orchestrator(
            ledger,
            exchange,
            MockChainTransactor::new(),
            MockVaultTransactor::new(),
        );
        let row = deposit_row(SwapStatus::ExchangeConverting);
        orch.reconcile(&row).await.unwrap();
        orch.reconcile(&row).await.unwrap();
    }

    #[tokio::test]
    async fn reconcile_advances_created_row_on_converting() {
        let mut ledger = MockLedger::new();
        let mut exchange = MockExchangeGateway::new();
        exchange.expect_get_status().returning(|_| {
            Ok(ExchangeStatus {
                status: ConversionStatus::Confirming,
                to_amount: None,
            })
        });
        ledger
            .expect_transition()
            .withf(|_, _, from, to| {
                *from == SwapStatus::ExchangeCreated && *to == SwapStatus::ExchangeConverting
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        // A converting observation must not record any payout amount
        ledger.expect_set_to_amount().never();

        let orch = orchestrator(
            ledger,
            exchange,
            MockChainTransactor::new(),
            MockVaultTransactor::new(),
        );
        orch.reconcile(&deposit_row(SwapStatus::ExchangeCreated))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reconcile_finished_deposit_runs_vault_deposit_in_lamports() {
        let vault_box = keyvault();
        let wallet = test_wallet(&vault_box);
        let solana_seed = bs58::encode([7u8; 32]).into_string();

        let mut ledger = MockLedger::new();
        let mut exchange = MockExchangeGateway::new();
        let mut vault = MockVaultTransactor::new();

        exchange.expect_get_status().returning(|_| {
            Ok(ExchangeStatus {
                status: ConversionStatus::Finished,
                to_amount: Some(dec!(49.5)),
            })
        });
        ledger
            .expect_set_to_amount()
            .withf(|_, amount| *amount == dec!(49.5))
            .times(1)
            .returning(|_, _| Ok(()));
        ledger
            .expect_transition()
            .withf(|_, _, _, to| *to == SwapStatus::ExchangeCompleted)
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        ledger
            .expect_get_wallet()
            .returning(move |_| Ok(wallet.clone()));
        ledger
            .expect_transition()
            .withf(|_, _, from, to| {
                *from == SwapStatus::ExchangeCompleted && *to == SwapStatus::VenueDepositPending
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        // 49.5 SOL lands on-chain as exactly 49_500_000_000 lamports
        vault
            .expect_submit_vault_deposit()
            .withf(move |secret, account, broker, token, amount| {
                secret == solana_seed
                    && account == VENUE_ACCOUNT
                    && broker == "broker-1"
                    && token == "SOL"
                    && *amount == 49_500_000_000
            })
            .times(1)
            .returning(|_, _, _, _, _| Ok("sol-hash".to_string()));
        ledger
            .expect_set_venue_tx_id()
            .withf(|_, hash| hash == "sol-hash")
            .times(1)
            .returning(|_, _| Ok(()));
        ledger
            .expect_transition()
            .withf(|_, _, from, to| {
                *from == SwapStatus::VenueDepositPending && *to == SwapStatus::VenueDepositConfirmed
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let orch = orchestrator(
            ledger,
            exchange,
            MockChainTransactor::new(),
            vault,
        );
        orch.reconcile(&deposit_row(SwapStatus::ExchangeConverting))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reconcile_finished_withdrawal_fast_paths_to_completed() {
        let mut ledger = MockLedger::new();
        let mut exchange = MockExchangeGateway::new();
        exchange.expect_get_status().returning(|_| {
            Ok(ExchangeStatus {
                status: ConversionStatus::Finished,
                to_amount: Some(dec!(71.2)),
            })
        });
        ledger
            .expect_set_to_amount()
            .times(1)
            .returning(|_, _| Ok(()));
        ledger
            .expect_transition()
            .withf(|_, d, _, to| {
                *d == Direction::Withdraw && *to == SwapStatus::ExchangeCompleted
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        ledger
            .expect_transition()
            .withf(|_, d, from, to| {
                *d == Direction::Withdraw
                    && *from == SwapStatus::ExchangeCompleted
                    && *to == SwapStatus::Completed
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        // No venue-deposit tail on withdrawals
        ledger.expect_get_wallet().never();

        let mut row = deposit_row(SwapStatus::ExchangeConverting);
        row.direction = Direction::Withdraw;
        row.from_currency = SOL_CURRENCY.to_string();
        row.to_currency = ADA_CURRENCY.to_string();

        let orch = orchestrator(
            ledger,
            exchange,
            MockChainTransactor::new(),
            MockVaultTransactor::new(),
        );
        orch.reconcile(&row).await.unwrap();
    }

    #[tokio::test]
    async fn reconcile_venue_deposit_failure_propagates_after_pending() {
        let vault_box = keyvault();
        let wallet = test_wallet(&vault_box);

        let mut ledger = MockLedger::new();
        let mut exchange = MockExchangeGateway::new();
        let mut vault = MockVaultTransactor::new();

        exchange.expect_get_status().returning(|_| {
            Ok(ExchangeStatus {
                status: ConversionStatus::Finished,
                to_amount: Some(dec!(49.5)),
            })
        });
        ledger
            .expect_set_to_amount()
            .times(1)
            .returning(|_, _| Ok(()));
        ledger
            .expect_transition()
            .withf(|_, _, _, to| *to == SwapStatus::ExchangeCompleted)
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        ledger
            .expect_get_wallet()
            .returning(move |_| Ok(wallet.clone()));
        ledger
            .expect_transition()
            .withf(|_, _, _, to| *to == SwapStatus::VenueDepositPending)
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        vault
            .expect_submit_vault_deposit()
            .times(1)
            .returning(|_, _, _, _, _| Err(OrchestratorError::adapter("solana", "rpc timeout")));
        // Confirmation must never be written on a failed submission
        ledger
            .expect_transition()
            .withf(|_, _, _, to| *to == SwapStatus::VenueDepositConfirmed)
            .never();

        let orch = orchestrator(
            ledger,
            exchange,
            MockChainTransactor::new(),
            vault,
        );
        let err = orch
            .reconcile(&deposit_row(SwapStatus::ExchangeConverting))
            .await
            .unwrap_err();
        assert!(err.is_adapter());
    }

    #[tokio::test]
    async fn reconcile_marks_failed_on_gateway_failure_status() {
        let mut ledger = MockLedger::new();
        let mut exchange = MockExchangeGateway::new();
        exchange.expect_get_status().returning(|_| {
            Ok(ExchangeStatus {
                status: ConversionStatus::Refunded,
                to_amount: None,
            })
        });
        ledger
            .expect_mark_failed()
            .withf(|_, d| *d == Direction::Deposit)
            .times(1)
            .returning(|_, _| Ok(()));

        let orch = orchestrator(
            ledger,
            exchange,
            MockChainTransactor::new(),
            MockVaultTransactor::new(),
        );
        orch.reconcile(&deposit_row(SwapStatus::ExchangeConverting))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reconcile_without_venue_account_is_a_validation_error() {
        let vault_box = keyvault();
        let mut wallet = test_wallet(&vault_box);
        wallet.venue_account_id = None;

        let mut ledger = MockLedger::new();
        let mut exchange = MockExchangeGateway::new();
        exchange.expect_get_status().returning(|_| {
            Ok(ExchangeStatus {
                status: ConversionStatus::Finished,
                to_amount: Some(dec!(49.5)),
            })
        });
        ledger
            .expect_set_to_amount()
            .times(1)
            .returning(|_, _| Ok(()));
        ledger
            .expect_transition()
            .withf(|_, _, _, to| *to == SwapStatus::ExchangeCompleted)
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        ledger
            .expect_get_wallet()
            .returning(move |_| Ok(wallet.clone()));
        // Must fail before touching VENUE_DEPOSIT_PENDING
        ledger
            .expect_transition()
            .withf(|_, _, _, to| *to == SwapStatus::VenueDepositPending)
            .never();

        let orch = orchestrator(
            ledger,
            exchange,
            MockChainTransactor::new(),
            MockVaultTransactor::new(),
        );
        let err = orch
            .reconcile(&deposit_row(SwapStatus::ExchangeConverting))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}
