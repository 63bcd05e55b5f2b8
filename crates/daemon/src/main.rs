//! Pricewatch - Main Entry Point
//! Scrapes catalog prices on an interval and notifies subscribers about drops

mod config;
mod health;
mod seed;
mod telemetry;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use pricewatch_core::application::{
    shutdown_channel, CloseStack, FatalErrors, MemoryQueue, ProductService, TrackingService,
    Worker,
};
use pricewatch_core::domain::{Product, TrackingLog, TrackingResult};
use pricewatch_core::port::time_provider::SystemTimeProvider;
use pricewatch_core::port::{NotificationSender, ProductRepository, TrackingRepository};
use pricewatch_infra_http::{HttpProductClient, TelegramSender, DEFAULT_USER_AGENT};
use pricewatch_infra_memory::MemoryStore;

use config::Args;
use health::HealthServer;
use seed::Seed;

/// Stand-in sender used when no bot token is configured
struct LoggingSender;

#[async_trait]
impl NotificationSender for LoggingSender {
    async fn send(&self, result: &TrackingResult) -> pricewatch_core::Result<()> {
        info!(
            chat_id = result.chat_id,
            product_id = result.product_id,
            size = %result.size,
            previous_price = result.previous_price,
            current_price = result.current_price,
            diff_percent = result.diff_percent,
            "Price drop (telegram disabled)"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1. Logging
    let _log_guard = telemetry::init_tracing(args.log_dir.as_deref())?;
    telemetry::install_panic_hook();
    info!("Pricewatch v{} starting...", pricewatch_core::VERSION);

    // 2. Configuration
    let queue_config = args.queue_config()?;
    let update_interval = args.update_interval()?;
    let notify_interval = args.notify_interval()?;
    let http_timeout = args.http_timeout()?;
    let seed = match &args.seed {
        Some(path) => Seed::load(path)?,
        None => Seed::default(),
    };

    // 3. Lifecycle primitives
    let closers = CloseStack::new();
    let fatal = FatalErrors::new();
    let (shutdown_tx, shutdown) = shutdown_channel();

    // Registered first so liveness keeps answering until everything else closed
    HealthServer::start(args.listen_addr, &closers, fatal.clone());

    // 4. Adapters
    let store = Arc::new(MemoryStore::new(Arc::new(SystemTimeProvider)));
    store.seed_categories(seed.categories).await?;

    let client = Arc::new(HttpProductClient::new(DEFAULT_USER_AGENT, http_timeout)?);
    let sender: Arc<dyn NotificationSender> = match &args.telegram_token {
        Some(token) => Arc::new(TelegramSender::new(&args.telegram_api_url, token, http_timeout)?),
        None => {
            warn!("No telegram token configured, notifications will only be logged");
            Arc::new(LoggingSender)
        }
    };

    // 5. Queues before the worker: teardown runs in reverse, so the worker
    //    stops producing before the queues drain
    let product_store = store.clone();
    let products = MemoryQueue::new(
        "products",
        queue_config,
        move |batch: Vec<Product>| {
            let store = product_store.clone();
            async move { store.update(&batch).await }
        },
        &closers,
    )?;

    let log_store = store.clone();
    let logs = MemoryQueue::new(
        "tracking logs",
        queue_config,
        move |batch: Vec<TrackingLog>| {
            let store = log_store.clone();
            async move { store.save_logs(&batch).await }
        },
        &closers,
    )?;

    let worker = Worker::new(&closers);

    // 6. Services
    let product_service = ProductService::new(
        worker.clone(),
        client,
        store.clone(),
        products,
        fatal.clone(),
    );
    let tracking_service =
        TrackingService::new(worker.clone(), store.clone(), store.clone(), sender, logs);

    for settings in seed.tracking {
        tracking_service.add_tracking(settings).await?;
    }

    // 7. Background cycles
    worker.run_with_interval(&shutdown, "run updates", update_interval, move |token| {
        let service = product_service.clone();
        async move { service.run_update_workers(&token).await.map(|_| ()) }
    })?;

    worker.run_with_interval(
        &shutdown,
        "send notifications",
        notify_interval,
        move |token| {
            let service = tracking_service.clone();
            async move { service.run_notification_workers(&token).await.map(|_| ()) }
        },
    )?;

    info!(
        update_interval_secs = update_interval.as_secs(),
        notify_interval_secs = notify_interval.as_secs(),
        "System ready"
    );

    // 8. Wait for a signal or the first fatal error
    wait_for_exit(&fatal).await;

    // 9. Graceful shutdown
    shutdown_tx.shutdown();
    match tokio::time::timeout(args.shutdown_timeout(), closers.close_all()).await {
        Ok(0) => info!("Shutdown complete."),
        Ok(failed) => warn!(failed, "Shutdown complete with errors"),
        Err(_) => error!(
            timeout_secs = args.shutdown_timeout().as_secs(),
            "Shutdown timed out"
        ),
    }

    Ok(())
}

async fn wait_for_exit(fatal: &FatalErrors) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        res = tokio::signal::ctrl_c() => match res {
            Ok(()) => info!("Interrupt received, shutting down"),
            Err(e) => error!(error = %e, "Failed to listen for interrupt, shutting down"),
        },
        _ = terminate => info!("Terminate signal received, shutting down"),
        Some(err) = fatal.recv() => error!(error = %err, "Fatal error, shutting down"),
    }
}
