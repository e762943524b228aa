mod config;
mod reading;
mod session;

use anyhow::Context;
use clap::Parser;
use config::Config;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::parse();

    tracing_subscriber::fmt::init();

    info!("Starting telemetry generator");
    info!(
        "Bind: {}:{}, tick: {}s, sessions: {}",
        cfg.bind_addr, cfg.port, cfg.tick_seconds, cfg.max_sessions
    );

    session::serve(&cfg).await.context("generator socket failed")?;

    Ok(())
}
