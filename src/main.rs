use anyhow::Context;
use pesaflow::config::AppConfig;
use pesaflow::fees::FeeEngine;
use pesaflow::ledger::{InMemoryTransactionStore, TransactionLedger};
use pesaflow::logging::init_tracing;
use pesaflow::merchants::{InMemoryMerchantStore, MerchantAggregator};
use pesaflow::payments::ProviderFactory;
use pesaflow::reconciliation::{CallbackProcessor, ReconciliationEngine};
use pesaflow::services::{CheckoutConfig, CheckoutService, HousekeepingService};
use pesaflow::workers::MonthlyResetWorker;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().context("loading configuration")?;
    init_tracing(&config.logging);

    let fees = Arc::new(FeeEngine::standard().context("building fee schedule")?);
    let transaction_store = Arc::new(InMemoryTransactionStore::new());
    let merchant_store = Arc::new(InMemoryMerchantStore::new());

    let ledger = Arc::new(TransactionLedger::new(transaction_store, fees.clone()));
    let merchants = Arc::new(MerchantAggregator::new(merchant_store, fees));
    let engine = Arc::new(ReconciliationEngine::new(ledger.clone(), merchants.clone()));
    let callbacks = Arc::new(CallbackProcessor::new(
        engine.clone(),
        config.callback.ack_internal_failures,
    ));

    let providers = Arc::new(ProviderFactory::from_env().context("configuring providers")?);
    let checkout = Arc::new(CheckoutService::new(
        ledger.clone(),
        merchants.clone(),
        providers.clone(),
        CheckoutConfig {
            provider_timeout: config.provider.initiate_timeout,
        },
    ));
    let housekeeping = Arc::new(HousekeepingService::new(merchants.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reset_worker = MonthlyResetWorker::new(
        housekeeping.clone(),
        config.housekeeping.reset_interval,
        shutdown_rx,
    );
    let worker_handle = tokio::spawn(reset_worker.run());

    info!(
        providers = ?providers.enabled(),
        "pesaflow_started"
    );

    // Keep the composed services alive until shutdown; the serving
    // surface (HTTP intake for checkouts and callbacks) plugs in here.
    let _ = (checkout, callbacks, engine);

    shutdown_signal().await;
    info!("shutdown_signal_received");

    if shutdown_tx.send(true).is_err() {
        error!("shutdown channel closed before workers stopped");
    }
    worker_handle.await.context("joining reset worker")?;

    info!("pesaflow_stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install sigterm handler")
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
