use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use feed_aggregator::config::Config;
use feed_aggregator::db::Database;
use feed_aggregator::scraper::{FeedFetcher, Scheduler};
use feed_aggregator::web;

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    // No subscriber is installed yet, so this one goes to stderr
    if let Err(e) = init_tracing() {
        eprintln!("Fatal error: {e:#}");
        std::process::exit(1);
    }

    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    info!("Starting feed-aggregator");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        database = %config.database_path.display(),
        concurrency = config.scrape_concurrency,
        interval_secs = config.scrape_interval.as_secs(),
        "Configuration loaded"
    );

    if let Some(parent) = config.database_path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create database directory: {}", parent.display())
        })?;
    }

    let db = Database::new(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    info!("Database initialized");

    let shutdown = CancellationToken::new();

    // Start the feed scraper
    let fetcher = FeedFetcher::new().context("Failed to build HTTP client")?;
    let scheduler = Scheduler::new(
        Arc::new(db.clone()),
        fetcher,
        config.scrape_concurrency,
        config.scrape_interval,
    )
    .context("Invalid scraper settings")?;

    let scrape_token = shutdown.clone();
    let scrape_handle = tokio::spawn(async move {
        scheduler.run(scrape_token).await;
    });

    // Start web server in background
    let web_config = config.clone();
    let web_token = shutdown.clone();
    let web_handle = tokio::spawn(async move {
        if let Err(e) = web::serve(web_config, db, web_token.clone()).await {
            error!("Web server error: {e:#}");
            // Without the API there is nothing left to serve
            web_token.cancel();
        }
    });

    tokio::select! {
        () = shutdown_signal() => {},
        () = shutdown.cancelled() => {},
    }

    info!("Shutting down...");
    shutdown.cancel();

    // An in-flight scrape batch is allowed to finish within the grace period
    if tokio::time::timeout(config.shutdown_grace, scrape_handle)
        .await
        .is_err()
    {
        warn!(
            grace_secs = config.shutdown_grace.as_secs(),
            "Scrape batch still running after grace period, abandoning it"
        );
    }
    if tokio::time::timeout(config.shutdown_grace, web_handle)
        .await
        .is_err()
    {
        warn!("Web server did not stop within grace period");
    }

    info!("Shutdown complete");

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,feed_aggregator=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_reports_second_install() {
        let _ = init_tracing();
        // The global subscriber is now taken, so main must report via stderr
        assert!(init_tracing().is_err());
    }
}
