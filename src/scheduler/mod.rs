//! Polling scheduler
//!
//! Two recurring sweeps drive all asynchronous progress: the exchange sweep
//! reconciles in-flight conversion orders (both directions), the withdrawal
//! sweep watches pending venue withdrawals. Rows are processed strictly
//! sequentially; a slow adapter stretches the sweep rather than fanning out.

use crate::ledger::Ledger;
use crate::metrics;
use crate::orchestrator::{DepositOrchestrator, WithdrawalOrchestrator};
use crate::swap::SwapStatus;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

const EXCHANGE_SWEEP: &str = "exchange";
const WITHDRAWAL_SWEEP: &str = "withdrawal";

pub struct PollingScheduler {
    ledger: Arc<dyn Ledger>,
    deposits: Arc<DepositOrchestrator>,
    withdrawals: Arc<WithdrawalOrchestrator>,
    exchange_interval: Duration,
    withdrawal_interval: Duration,
    shutdown: Arc<RwLock<bool>>,
}

impl PollingScheduler {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        deposits: Arc<DepositOrchestrator>,
        withdrawals: Arc<WithdrawalOrchestrator>,
        exchange_interval_secs: u64,
        withdrawal_interval_secs: u64,
        shutdown: Arc<RwLock<bool>>,
    ) -> Self {
        Self {
            ledger,
            deposits,
            withdrawals,
            exchange_interval: Duration::from_secs(exchange_interval_secs),
            withdrawal_interval: Duration::from_secs(withdrawal_interval_secs),
            shutdown,
        }
    }

    /// Main loop. Returns when the shutdown flag is raised; an in-progress
    /// sweep finishes its current row first.
    pub async fn run(&self) {
        let mut exchange_tick = interval(self.exchange_interval);
        let mut withdrawal_tick = interval(self.withdrawal_interval);

        info!(
            "Polling scheduler started (exchange sweep every {:?}, withdrawal sweep every {:?})",
            self.exchange_interval, self.withdrawal_interval
        );

        loop {
            if *self.shutdown.read().await {
                info!("Polling scheduler shutting down");
                break;
            }

            tokio::select! {
                _ = exchange_tick.tick() => self.run_exchange_sweep().await,
                _ = withdrawal_tick.tick() => self.run_withdrawal_sweep().await,
            }
        }
    }

    /// One pass over rows with an in-flight exchange leg. A per-row error
    /// marks that row failed and moves on to the next.
    pub async fn run_exchange_sweep(&self) {
        metrics::record_sweep_run(EXCHANGE_SWEEP);
        let started = Instant::now();

        let rows = match self
            .ledger
            .pending_with_status(SwapStatus::exchange_sweep_set())
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!("Exchange sweep could not load pending rows: {}", e);
                metrics::record_sweep_error(EXCHANGE_SWEEP);
                return;
            }
        };

        if rows.is_empty() {
            debug!("Exchange sweep: nothing pending");
        }

        for row in rows {
            if let Err(e) = self.deposits.reconcile(&row).await {
                warn!("Exchange sweep failed on swap {}: {}", row.id, e);
                metrics::record_sweep_error(EXCHANGE_SWEEP);
                match self.ledger.mark_failed(row.id, row.direction).await {
                    Ok(()) => metrics::record_swap_failed(row.direction.as_str()),
                    Err(mark_err) => {
                        error!("Could not mark swap {} failed: {}", row.id, mark_err)
                    }
                }
            }
        }

        metrics::record_sweep_duration(EXCHANGE_SWEEP, started.elapsed().as_secs_f64());
    }

    /// One pass over pending venue withdrawals. Per-row errors are logged
    /// and the row is retried on the next sweep; unlike the exchange sweep,
    /// nothing is marked failed here.
    pub async fn run_withdrawal_sweep(&self) {
        metrics::record_sweep_run(WITHDRAWAL_SWEEP);
        let started = Instant::now();

        let rows = match self
            .ledger
            .pending_with_status(SwapStatus::withdrawal_sweep_set())
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                error!("Withdrawal sweep could not load pending rows: {}", e);
                metrics::record_sweep_error(WITHDRAWAL_SWEEP);
                return;
            }
        };

        if rows.is_empty() {
            debug!("Withdrawal sweep: nothing pending");
        }

        for row in rows {
            if let Err(e) = self.withdrawals.poll_confirmation(&row).await {
                warn!(
                    "Withdrawal sweep failed on swap {}, will retry next sweep: {}",
                    row.id, e
                );
                metrics::record_sweep_error(WITHDRAWAL_SWEEP);
            }
        }

        metrics::record_sweep_duration(WITHDRAWAL_SWEEP, started.elapsed().as_secs_f64());
    }
}
