//! Withdrawal saga
//!
//! Drives custodial SOL back to the user's Cardano wallet: submit a signed
//! withdrawal request to the venue, poll the venue's asset history until the
//! withdrawal lands on-chain, then create the reverse SOL -> ADA conversion
//! and fund it from the user's Solana wallet. The exchange leg from there on
//! is reconciled by the shared exchange sweep.

use super::{
    ADA_CURRENCY, ADA_NETWORK, HISTORY_SIDE_WITHDRAW, HISTORY_STATUS_COMPLETED, SOL_CURRENCY,
    SOL_NETWORK, VENUE_CHAIN_TYPE, VENUE_TOKEN,
};
use crate::chains::{from_smallest_unit, to_smallest_unit, ChainTransactor, LAMPORT_DECIMALS};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::exchange::{CreateExchangeRequest, ExchangeGateway};
use crate::keyvault::KeyVault;
use crate::ledger::{Ledger, SwapTransaction};
use crate::metrics;
use crate::swap::{Direction, SwapStatus};
use crate::venue::signer::sign_message_base58;
use crate::venue::{AssetHistoryFilter, VenueGateway, WithdrawalMessage, WithdrawalRequest};

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct WithdrawalOrchestrator {
    ledger: Arc<dyn Ledger>,
    exchange: Arc<dyn ExchangeGateway>,
    venue: Arc<dyn VenueGateway>,
    solana: Arc<dyn ChainTransactor>,
    keyvault: Arc<KeyVault>,
    broker_id: String,
    chain_id: u64,
    ledger_contract: String,
    flow: String,
}

impl WithdrawalOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<dyn Ledger>,
        exchange: Arc<dyn ExchangeGateway>,
        venue: Arc<dyn VenueGateway>,
        solana: Arc<dyn ChainTransactor>,
        keyvault: Arc<KeyVault>,
        broker_id: String,
        chain_id: u64,
        ledger_contract: String,
        flow: String,
    ) -> Self {
        Self {
            ledger,
            exchange,
            venue,
            solana,
            keyvault,
            broker_id,
            chain_id,
            ledger_contract,
            flow,
        }
    }

    /// Entry point: persist the swap row and submit a wallet-signed
    /// withdrawal request to the venue. Confirmation is asynchronous; the
    /// withdrawal sweep picks the row up from `VENUE_WITHDRAW_PENDING`.
    pub async fn initiate_withdrawal(
        &self,
        wallet_address: &str,
        amount_lamports: u64,
    ) -> OrchestratorResult<SwapTransaction> {
        if amount_lamports == 0 {
            return Err(OrchestratorError::Validation(
                "Withdrawal amount must be positive".to_string(),
            ));
        }

        let wallet = self.ledger.get_wallet(wallet_address).await?;
        let account_id = wallet
            .venue_account_id
            .clone()
            .ok_or_else(|| OrchestratorError::VenueAccountMissing {
                wallet_address: wallet_address.to_string(),
            })?;

        let amount_sol = from_smallest_unit(amount_lamports, LAMPORT_DECIMALS);

        let api_key = self.keyvault.decrypt(&wallet.venue_key)?;
        let holdings = self
            .venue
            .get_holding(&account_id, &api_key)
            .await
            .map_err(|e| {
                metrics::record_adapter_error("venue");
                e
            })?;
        let available = holdings
            .iter()
            .find(|h| h.token == VENUE_TOKEN)
            .map(|h| h.holding)
            .unwrap_or_default();
        if available < amount_sol {
            return Err(OrchestratorError::Validation(format!(
                "Withdrawal of {} SOL exceeds the venue balance of {}",
                amount_sol, available
            )));
        }

        let now = Utc::now();
        let tx = SwapTransaction {
            id: Uuid::new_v4(),
            direction: Direction::Withdraw,
            status: SwapStatus::VenueWithdrawPending,
            exchange_id: None,
            from_currency: SOL_CURRENCY.to_string(),
            to_currency: ADA_CURRENCY.to_string(),
            from_network: SOL_NETWORK.to_string(),
            to_network: ADA_NETWORK.to_string(),
            from_amount: amount_sol,
            to_amount: None,
            // Unknown until the reverse conversion order exists
            payin_address: String::new(),
            payout_address: wallet.cardano_address.clone(),
            user_address: wallet_address.to_string(),
            refund_hash: None,
            venue_tx_id: None,
            created_at: now,
            updated_at: now,
        };
        self.ledger.create(&tx).await?;
        metrics::record_swap_created(Direction::Withdraw.as_str());
        info!(
            "Created withdrawal swap {} for {} SOL ({} lamports)",
            tx.id, amount_sol, amount_lamports
        );

        let nonce = self
            .venue
            .get_withdraw_nonce(&account_id, &api_key)
            .await
            .map_err(|e| {
                metrics::record_adapter_error("venue");
                e
            })?;

        let message = WithdrawalMessage {
            broker_id: self.broker_id.clone(),
            chain_id: self.chain_id,
            receiver: wallet.solana_address.clone(),
            token: VENUE_TOKEN.to_string(),
            amount: amount_lamports.to_string(),
            withdraw_nonce: nonce.to_string(),
            timestamp: Utc::now().timestamp_millis().to_string(),
            chain_type: VENUE_CHAIN_TYPE.to_string(),
            allow_cross_chain_withdraw: false,
        };

        // The venue verifies the wallet signature over this exact payload
        let payload = serde_json::to_string(&message)
            .map_err(|e| OrchestratorError::Internal(e.to_string()))?;
        let solana_key = self.keyvault.decrypt(&wallet.solana_key)?;
        let signature = sign_message_base58(&solana_key, &payload)?;

        let request = WithdrawalRequest {
            signature,
            user_address: wallet.solana_address.clone(),
            verifying_contract: self.ledger_contract.clone(),
            message,
        };
        let venue_tx_id = self
            .venue
            .submit_withdrawal(&account_id, &api_key, &request)
            .await
            .map_err(|e| {
                metrics::record_adapter_error("venue");
                e
            })?;

        self.ledger.set_venue_tx_id(tx.id, &venue_tx_id).await?;
        info!(
            "Submitted withdrawal swap {} to the venue (request {})",
            tx.id, venue_tx_id
        );

        self.ledger.get(tx.id).await
    }

    /// One confirmation step for a pending withdrawal row. Scans the venue's
    /// asset history for a completed withdrawal of exactly the row's amount;
    /// no match leaves the row untouched for the next sweep.
    pub async fn poll_confirmation(&self, tx: &SwapTransaction) -> OrchestratorResult<()> {
        let wallet = self.ledger.get_wallet(&tx.user_address).await?;
        let account_id = wallet
            .venue_account_id
            .clone()
            .ok_or_else(|| OrchestratorError::VenueAccountMissing {
                wallet_address: tx.user_address.clone(),
            })?;

        let api_key = self.keyvault.decrypt(&wallet.venue_key)?;
        let history = self
            .venue
            .get_asset_history(
                &account_id,
                &api_key,
                &AssetHistoryFilter {
                    token: VENUE_TOKEN.to_string(),
                    side: HISTORY_SIDE_WITHDRAW.to_string(),
                },
            )
            .await
            .map_err(|e| {
                metrics::record_adapter_error("venue");
                e
            })?;

        // Amount equality is the only join key the history offers; the venue
        // does not echo our request id back. TODO: switch to the venue's
        // withdrawal id once it is exposed in the history response.
        let confirmed = history.iter().any(|row| {
            row.side == HISTORY_SIDE_WITHDRAW
                && row.trans_status == HISTORY_STATUS_COMPLETED
                && row.amount == tx.from_amount
        });
        if !confirmed {
            debug!("Withdrawal swap {} not yet visible in venue history", tx.id);
            return Ok(());
        }

        self.ledger
            .transition(
                tx.id,
                Direction::Withdraw,
                SwapStatus::VenueWithdrawPending,
                SwapStatus::VenueWithdrawConfirmed,
            )
            .await?;
        metrics::record_transition(
            Direction::Withdraw.as_str(),
            SwapStatus::VenueWithdrawConfirmed.as_str(),
        );
        info!("Withdrawal swap {} confirmed by the venue", tx.id);

        self.trigger_reverse_exchange(tx.id).await
    }

    /// Create and fund the reverse SOL -> ADA conversion.
    ///
    /// Reloads the row and refuses to act unless it is a withdrawal sitting
    /// at exactly `VENUE_WITHDRAW_CONFIRMED`, so a repeated or misdirected
    /// call can never create a second order.
    pub async fn trigger_reverse_exchange(&self, id: Uuid) -> OrchestratorResult<()> {
        let tx = self.ledger.get(id).await?;
        if tx.direction != Direction::Withdraw || tx.status != SwapStatus::VenueWithdrawConfirmed {
            debug!(
                "Skipping reverse exchange for swap {} ({} at {})",
                id, tx.direction, tx.status
            );
            return Ok(());
        }

        let wallet = self.ledger.get_wallet(&tx.user_address).await?;
        let order = self
            .exchange
            .create_exchange(&CreateExchangeRequest {
                from_currency: SOL_CURRENCY.to_string(),
                to_currency: ADA_CURRENCY.to_string(),
                from_network: SOL_NETWORK.to_string(),
                to_network: ADA_NETWORK.to_string(),
                from_amount: tx.from_amount,
                address: wallet.cardano_address.clone(),
                refund_address: Some(wallet.solana_address.clone()),
                flow: self.flow.clone(),
            })
            .await
            .map_err(|e| {
                metrics::record_adapter_error("exchange");
                e
            })?;

        self.ledger
            .set_exchange_order(id, &order.id, &order.payin_address)
            .await?;
        self.ledger
            .transition(
                id,
                Direction::Withdraw,
                SwapStatus::VenueWithdrawConfirmed,
                SwapStatus::ExchangeConverting,
            )
            .await?;
        metrics::record_transition(
            Direction::Withdraw.as_str(),
            SwapStatus::ExchangeConverting.as_str(),
        );
        info!(
            "Created reverse exchange order {} for withdrawal swap {}",
            order.id, id
        );

        // Fund the amount the gateway quoted back, not the requested amount;
        // the two can differ when the gateway adjusts the order.
        let lamports = to_smallest_unit(order.from_amount, LAMPORT_DECIMALS)?;
        let solana_key = self.keyvault.decrypt(&wallet.solana_key)?;
        match self
            .solana
            .send_payment(&solana_key, &order.payin_address, lamports)
            .await
        {
            Ok(funding_hash) => {
                self.ledger.set_funding_hash(id, &funding_hash).await?;
                info!(
                    "Funded reverse exchange for swap {} with {} lamports ({})",
                    id, lamports, funding_hash
                );
                Ok(())
            }
            Err(e) => {
                // The order exists but was never funded; it will expire on
                // the gateway side. The SOL stays in the user's wallet.
                warn!("Funding reverse exchange for swap {} failed: {}", id, e);
                metrics::record_adapter_error("solana");
                self.ledger.mark_failed(id, Direction::Withdraw).await?;
                metrics::record_swap_failed(Direction::Withdraw.as_str());
                Err(e)
            }
        }
    }
}
