//! Passage Orchestrator - Cross-chain swap orchestration between Cardano,
//! Solana, and a custodial trading venue
//!
//! Drives swap rows through their state machine: deposits convert ADA to SOL
//! through a conversion gateway and push the proceeds into the venue's
//! on-chain vault; withdrawals pull custodial SOL back out and convert it to
//! ADA. Two polling sweeps reconcile all asynchronous external steps.

use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

mod api;
mod chains;
mod config;
mod error;
mod exchange;
mod keyvault;
mod ledger;
mod metrics;
mod orchestrator;
mod scheduler;
mod swap;
mod venue;

use chains::{CardanoTransactor, SolanaTransactor};
use config::Settings;
use exchange::ExchangeClient;
use keyvault::KeyVault;
use ledger::PgLedger;
use metrics::MetricsServer;
use orchestrator::{DepositOrchestrator, WithdrawalOrchestrator};
use scheduler::PollingScheduler;
use venue::VenueClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    info!("Starting Passage Orchestrator v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!(
        "Loaded configuration for instance {}",
        settings.orchestrator.instance_id
    );

    // Initialize database connection
    let ledger = Arc::new(PgLedger::new(&settings.database).await?);
    info!("Database connection established");

    // Run migrations
    ledger.run_migrations().await?;

    // Initialize metrics server
    let metrics_server = if settings.metrics.enabled {
        Some(MetricsServer::new(settings.metrics.port))
    } else {
        None
    };

    // Initialize adapters
    let keyvault = Arc::new(KeyVault::new(&settings.keyvault)?);
    let exchange = Arc::new(ExchangeClient::new(&settings.exchange));
    let venue = Arc::new(VenueClient::new(&settings.venue));
    let cardano = Arc::new(CardanoTransactor::new(&settings.cardano));
    let solana = Arc::new(SolanaTransactor::new(&settings.solana, &settings.venue.vault));
    info!("External adapters initialized");

    // Initialize orchestrators
    let deposits = Arc::new(DepositOrchestrator::new(
        ledger.clone(),
        exchange.clone(),
        cardano,
        solana.clone(),
        keyvault.clone(),
        settings.venue.broker_id.clone(),
        settings.exchange.flow.clone(),
    ));
    let withdrawals = Arc::new(WithdrawalOrchestrator::new(
        ledger.clone(),
        exchange,
        venue,
        solana,
        keyvault,
        settings.venue.broker_id.clone(),
        settings.venue.chain_id,
        settings.venue.ledger_contract.clone(),
        settings.exchange.flow.clone(),
    ));
    info!("Orchestrators initialized");

    // Shared shutdown flag checked by the scheduler loop
    let shutdown = Arc::new(RwLock::new(false));

    let polling_scheduler = Arc::new(PollingScheduler::new(
        ledger.clone(),
        deposits,
        withdrawals,
        settings.orchestrator.exchange_sweep_interval_secs,
        settings.orchestrator.withdrawal_sweep_interval_secs,
        shutdown.clone(),
    ));

    // Start API server
    let api_handle = tokio::spawn({
        let api_config = settings.api.clone();
        let ledger = ledger.clone();
        async move {
            if let Err(e) = api::run_server(api_config, ledger).await {
                error!("API server error: {}", e);
            }
        }
    });

    // Start metrics server
    let metrics_handle = metrics_server.map(|server| {
        tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        })
    });

    // Start the polling scheduler
    let scheduler_handle = tokio::spawn({
        let polling_scheduler = polling_scheduler.clone();
        async move {
            polling_scheduler.run().await;
        }
    });

    // Health check loop
    let health_handle = tokio::spawn({
        let ledger = ledger.clone();
        let interval = settings.orchestrator.health_check_interval_secs;
        async move {
            loop {
                tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;

                match ledger.health_check().await {
                    Ok(()) => metrics::record_health_check(),
                    Err(e) => {
                        warn!("Database health check failed: {}", e);
                        metrics::record_health_check_failure();
                    }
                }
            }
        }
    });

    info!("Passage Orchestrator is running");
    info!("API server: http://{}:{}", settings.api.host, settings.api.port);
    if settings.metrics.enabled {
        info!("Metrics: http://0.0.0.0:{}/metrics", settings.metrics.port);
    }

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutdown signal received, stopping...");

    // Let the scheduler finish its current row before exiting
    *shutdown.write().await = true;

    // Abort background tasks
    api_handle.abort();
    scheduler_handle.abort();
    health_handle.abort();
    if let Some(h) = metrics_handle {
        h.abort();
    }

    info!("Passage Orchestrator stopped");
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,passage_orchestrator=debug,sqlx=warn,hyper=warn")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
