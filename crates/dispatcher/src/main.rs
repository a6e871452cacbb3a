//! Dispatcher entry point.

use dispatcher::Config;
use event_channel::{OutboxDispatcher, ReadModel};
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::postgres::PgPoolOptions;
use stock_store::PostgresStockStore;
use tokio::signal;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env()?;
    dispatcher::init_tracing(&config);

    // 2. Install Prometheus metrics recorder and its HTTP listener
    PrometheusBuilder::new()
        .with_http_listener(config.metrics_addr)
        .install()?;
    tracing::info!(addr = %config.metrics_addr, "metrics listener started");

    // 3. Connect to Postgres and apply migrations
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = PostgresStockStore::new(pool);
    store.run_migrations().await?;

    // 4. Run the dispatcher until shutdown
    let (bus, prepared_orders) = dispatcher::default_bus();
    let outbox =
        OutboxDispatcher::new(store, bus).with_batch_size(config.batch_size);
    outbox
        .run(config.dispatch_interval, shutdown_signal())
        .await?;

    tracing::info!(
        prepared_orders = prepared_orders.count(),
        "dispatcher shut down gracefully"
    );
    Ok(())
}
