mod config;
mod errors;
mod framing;
mod publish;
mod supervisor;

use anyhow::anyhow;
use clap::Parser;
use config::Config;
use errors::{Error, Result};
use framing::{FrameReader, ReadEvent};
use publish::{Delivery, Publisher};
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::parse();

    tracing_subscriber::fmt::init();

    info!("Starting telemetry relay");
    info!(
        "Generator: {}:{}, broker: {}",
        cfg.generator_host, cfg.generator_port, cfg.broker_addr
    );

    let policy = cfg.restart_policy();
    if let Err(e) = supervisor::run_supervised(&policy, || run_instance(cfg.clone())).await {
        error!("Relay failed permanently: {}", e);
        return Err(anyhow!("relay failed: {e}"));
    }

    info!("Relay stopped");
    Ok(())
}

/// One relay instance: a single generator connection and a single broker
/// client, alive until a fatal condition or an interrupt. The supervisor
/// decides whether a failed instance is replaced.
async fn run_instance(cfg: Config) -> Result<()> {
    info!(
        "Connecting to generator at {}:{}",
        cfg.generator_host, cfg.generator_port
    );
    let stream = TcpStream::connect((cfg.generator_host.as_str(), cfg.generator_port)).await?;
    info!("Connected to generator");

    let mut frames = FrameReader::new(stream);
    let mut publisher = Publisher::connect(
        &cfg.broker_addr.host,
        cfg.broker_addr.port,
        cfg.confirm_timeout(),
    );

    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received, closing relay");
                return Ok(());
            }
            event = frames.next_event(cfg.read_timeout()) => event?,
        };

        match event {
            ReadEvent::IdleTimeout => {
                info!(
                    "No messages received in the last {}s",
                    cfg.read_timeout_secs
                );
            }
            ReadEvent::EmptyFrame => {
                warn!("Received empty message from generator");
            }
            ReadEvent::Closed => {
                warn!("Generator closed the connection");
                return Err(Error::PeerClosed);
            }
            ReadEvent::Frame(text) => {
                debug!("Received message from generator: {}", text);
                match serde_json::from_str::<serde_json::Value>(&text) {
                    Err(e) => warn!("Skipping malformed message ({}): {}", e, text),
                    // Forward the frame as received; the parse only gates
                    // malformed data out of the topic.
                    Ok(_) => match publisher.publish_confirmed(text.into_bytes()).await? {
                        Delivery::Confirmed => debug!("Message delivered to {}", publish::TOPIC),
                        Delivery::Unconfirmed => {}
                    },
                }
            }
        }
    }
}
