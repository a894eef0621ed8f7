//! Campusmail Worker - async RabbitMQ consumer for notification jobs.
//!
//! This worker consumes jobs from the notification queue, renders report
//! PDFs with a headless browser where needed and delivers the resulting
//! emails over SMTP. At most `WORKER_CONCURRENCY` jobs run at once.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{signal, sync::watch};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use campusmail::mail::{MailTransport, SmtpMailer};
use campusmail::render::{ChromiumEngine, RenderEngine};
use campusmail::{web, AmqpQueue, Config, JobWorkerPool, NotificationDispatcher, ReportRenderer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("worker_starting");

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        amqp_url_set = !config.amqp_url.is_empty(),
        queue = %config.queue_name,
        concurrency = config.worker_concurrency,
        production = config.production,
        smtp_host = %config.smtp_host,
        chrome_path = ?config.chrome_path,
        "config_loaded"
    );

    // Long-lived collaborators, shared by every job
    let engine: Arc<dyn RenderEngine> = Arc::new(ChromiumEngine::new(config.browser_settings()));
    let renderer = ReportRenderer::new(engine)
        .context("Failed to compile report templates")?
        .with_policy(config.launch_policy());
    let mailer: Arc<dyn MailTransport> =
        Arc::new(SmtpMailer::from_config(&config).context("Failed to configure SMTP transport")?);
    let dispatcher = Arc::new(
        NotificationDispatcher::new(mailer, renderer, config.mail_from.clone())
            .context("Failed to compile email templates")?,
    );

    let prefetch = u16::try_from(config.worker_concurrency).unwrap_or(u16::MAX);
    let mut queue = AmqpQueue::connect(&config.amqp_url, &config.queue_name, prefetch).await?;

    // Health endpoint outside production, stopped together with the worker
    let (stop_tx, stop_rx) = watch::channel(false);
    let health = if config.production {
        None
    } else {
        let port = config.port;
        let service_name = config.service_name.clone();
        let mut stop_rx = stop_rx.clone();
        Some(tokio::spawn(async move {
            let stopped = async move {
                let _ = stop_rx.changed().await;
            };
            if let Err(e) = web::serve(port, &service_name, stopped).await {
                error!(error = %e, "health_server_failed");
            }
        }))
    };

    let pool = JobWorkerPool::new(dispatcher).concurrency(config.worker_concurrency);
    pool.run(&mut queue, shutdown_signal()).await;

    let _ = stop_tx.send(true);
    if let Some(health) = health {
        let _ = health.await;
    }

    queue.close().await;

    info!("worker_exit");
    Ok(())
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
