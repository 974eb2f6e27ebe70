//! API server entry point.

use std::sync::Arc;

use cart::{CartService, PgPriceOracle, RedisCartStore};
use checkout::{NotificationFanout, PgUserDirectory};
use ledger::PostgresOrderLedger;
use notification::{AmqpConnection, AmqpPublisher, QueueSettings};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use api::config::Config;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
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
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Connect backing services
    let connect_options: PgConnectOptions = config
        .database_url
        .parse()
        .expect("invalid DATABASE_URL");
    let connect_options = connect_options.options([(
        "statement_timeout",
        config.io_timeout.as_millis().to_string(),
    )]);
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(config.io_timeout)
        .connect_with(connect_options)
        .await
        .expect("failed to connect to PostgreSQL");

    let ledger = PostgresOrderLedger::new(pool.clone()).with_timeout(config.io_timeout);
    ledger
        .run_migrations()
        .await
        .expect("failed to run migrations");

    let store = RedisCartStore::connect(&config.redis_url, config.io_timeout)
        .await
        .expect("failed to connect to Redis");

    let broker = AmqpConnection::connect(&config.amqp_url, config.io_timeout)
        .await
        .expect("failed to connect to broker");
    let publisher = AmqpPublisher::new(
        &broker,
        QueueSettings::new(config.notification_queue.clone()),
        config.io_timeout,
    )
    .await
    .expect("failed to open publisher channel");

    // 4. Wire services
    let oracle = PgPriceOracle::new(pool.clone()).with_timeout(config.io_timeout);
    let cart = Arc::new(CartService::new(store, oracle));
    let fanout = Arc::new(NotificationFanout::spawn(
        Arc::new(PgUserDirectory::new(pool.clone()).with_timeout(config.io_timeout)),
        Arc::new(publisher),
    ));
    let state = Arc::new(api::AppState::new(cart, ledger, fanout.clone()));

    // 5. Build the application
    let app = api::create_app(state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 7. Drain pending notifications, then release connections
    fanout.shutdown().await;
    if let Err(e) = broker.close().await {
        tracing::warn!(error = %e, "failed to close broker connection");
    }
    pool.close().await;

    tracing::info!("server shut down gracefully");
}
