use crate::config::Config;
use crate::errors::Result;
use crate::metrics::{
    DECODE_ERRORS_TOTAL, DOCUMENTS_INSERTED_TOTAL, INVALID_PAYLOADS_TOTAL, MESSAGES_TOTAL,
};
use crate::payload::{self, Payload};
use crate::storage;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

pub const TOPIC: &str = "device_data_stream";

const POLL_WAIT: Duration = Duration::from_secs(1);

/// One consumer instance: subscribes under the group's durable session,
/// polls until an interrupt or a fatal broker error, and closes the broker
/// connection on every exit path. Messages are acknowledged only after
/// processing, so a crash mid-message causes redelivery rather than loss.
pub async fn run_consumer(cfg: Config, pool: PgPool) -> Result<()> {
    info!(
        "Connecting to broker at {} as group {}",
        cfg.broker_addr, cfg.group_id
    );

    let mut options = MqttOptions::new(&cfg.group_id, &cfg.broker_addr.host, cfg.broker_addr.port);
    options.set_keep_alive(Duration::from_secs(30));
    options.set_clean_session(false);
    options.set_manual_acks(true);

    let (client, mut eventloop) = AsyncClient::new(options, 100);

    client.subscribe(TOPIC, QoS::AtLeastOnce).await?;
    info!("Subscribed to {} with QoS 1", TOPIC);

    let result = poll_loop(&client, &mut eventloop, &cfg, &pool).await;

    // Commit-then-close: every processed message was already acknowledged,
    // so teardown only has to drop the session connection.
    if let Err(e) = client.disconnect().await {
        warn!("Broker disconnect failed: {}", e);
    }
    info!("Broker connection closed");

    result
}

async fn poll_loop(
    client: &AsyncClient,
    eventloop: &mut EventLoop,
    cfg: &Config,
    pool: &PgPool,
) -> Result<()> {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Consumer interrupted");
                return Ok(());
            }
            polled = timeout(POLL_WAIT, eventloop.poll()) => match polled {
                // An empty poll is not an error.
                Err(_) => continue,
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    handle_publish(pool, cfg, &publish).await;
                    client.ack(&publish).await?;
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    error!("Consumer error: {}", e);
                    // The client reconnects on its own; hold off one poll
                    // interval rather than spinning.
                    tokio::time::sleep(POLL_WAIT).await;
                }
            }
        }
    }
}

/// Processes one message under the per-message isolation policy: every
/// decode or insert failure is logged with the message content and the loop
/// moves on. One malformed message must never block the stream.
async fn handle_publish(pool: &PgPool, cfg: &Config, publish: &Publish) {
    MESSAGES_TOTAL.inc();
    debug!(
        "Raw message received: {}",
        String::from_utf8_lossy(&publish.payload)
    );

    match payload::decode(&publish.payload) {
        Ok(Payload::Batch(docs)) => {
            match storage::insert_many(pool, &docs, cfg.write_timeout()).await {
                Ok(ids) => {
                    DOCUMENTS_INSERTED_TOTAL.inc_by(ids.len() as f64);
                    info!("Inserted {} documents", ids.len());
                }
                Err(e) => {
                    error!(
                        "Error processing message: {}; content: {}",
                        e,
                        String::from_utf8_lossy(&publish.payload)
                    );
                }
            }
        }
        Ok(Payload::Single(doc)) => {
            match storage::insert_one(pool, &doc, cfg.write_timeout()).await {
                Ok(id) => {
                    DOCUMENTS_INSERTED_TOTAL.inc();
                    info!("Inserted 1 document with id: {}", id);
                }
                Err(e) => {
                    error!(
                        "Error processing message: {}; content: {}",
                        e,
                        String::from_utf8_lossy(&publish.payload)
                    );
                }
            }
        }
        Ok(Payload::Invalid(value)) => {
            INVALID_PAYLOADS_TOTAL.inc();
            warn!("Invalid data format: {}", value);
        }
        Err(e) => {
            DECODE_ERRORS_TOTAL.inc();
            error!(
                "Error processing message: {}; content: {}",
                e,
                String::from_utf8_lossy(&publish.payload)
            );
        }
    }
}
