//! Notification worker entry point.
//!
//! Consumes the notification queue until SIGINT/SIGTERM, or exits with a
//! non-zero status when the broker channel closes underneath it.

use std::process::ExitCode;
use std::sync::Arc;

use futures_util::StreamExt;
use notification::{
    AmqpConnection, AmqpDelivery, HttpSmsGateway, NotificationConsumer, NotificationDispatcher,
    QueueSettings, SmtpEmailGateway, WorkerConfig,
};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

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
            tracing::info!("received SIGINT, stopping worker");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, stopping worker");
        }
    }
}

async fn run(config: WorkerConfig) -> notification::Result<bool> {
    let sms = HttpSmsGateway::new(config.sms.clone())?;
    let email = SmtpEmailGateway::new(&config.smtp)?;
    let consumer = NotificationConsumer::new(NotificationDispatcher::new(
        Arc::new(sms),
        Arc::new(email),
    ));

    let connection = AmqpConnection::connect(&config.amqp_url, config.io_timeout).await?;
    let deliveries = connection
        .consume(&QueueSettings::new(config.queue.clone()))
        .await?
        .map(|delivery| delivery.map(AmqpDelivery));

    tracing::info!(queue = %config.queue, "waiting for notifications");

    let interrupted = tokio::select! {
        outcome = consumer.run(deliveries) => {
            match outcome {
                Ok(stats) => tracing::error!(
                    delivered = stats.delivered,
                    rejected = stats.rejected,
                    "broker channel closed"
                ),
                Err(e) => tracing::error!(error = %e, "consumer failed"),
            }
            false
        }
        () = shutdown_signal() => true,
    };

    if connection.is_connected() {
        connection.close().await?;
    }
    Ok(interrupted)
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match WorkerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(config).await {
        Ok(true) => {
            tracing::info!("worker shut down gracefully");
            ExitCode::SUCCESS
        }
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "worker stopped");
            ExitCode::FAILURE
        }
    }
}
