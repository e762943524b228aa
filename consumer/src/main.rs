mod broker;
mod config;
mod errors;
mod metrics;
mod payload;
mod storage;
mod supervisor;

use anyhow::{anyhow, Context};
use axum::{routing::get, Router};
use clap::Parser;
use config::Config;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::parse();

    tracing_subscriber::fmt::init();

    info!("Starting telemetry consumer");
    info!("Broker: {}, group: {}", cfg.broker_addr, cfg.group_id);
    info!(
        "Storage: {} (database {})",
        cfg.storage_url.split('@').last().unwrap_or("***"),
        cfg.storage_database
    );

    metrics::init_metrics();

    let pool = storage::make_pool(&cfg).await.context("storage setup failed")?;

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz));
    let listener = tokio::net::TcpListener::bind(&cfg.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.http_addr))?;
    info!("HTTP server listening on {}", cfg.http_addr);
    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    });

    let policy = cfg.restart_policy();
    let consumer_pool = pool.clone();
    let outcome: anyhow::Result<()> = tokio::select! {
        res = supervisor::run_supervised(&policy, || {
            broker::run_consumer(cfg.clone(), consumer_pool.clone())
        }) => res.map_err(|e| anyhow!("consumer failed permanently: {e}")),
        _ = server => Err(anyhow!("HTTP server terminated unexpectedly")),
    };

    info!("Shutting down");
    pool.close().await;
    outcome
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}

async fn healthz() -> &'static str {
    "ok"
}
