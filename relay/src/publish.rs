use crate::errors::{Error, Result};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

pub const TOPIC: &str = "device_data_stream";

/// Unconfirmed publishes the instance tolerates before treating the broker
/// as unavailable.
const MAX_IN_FLIGHT: usize = 64;

/// Whether the broker confirmed a publish within the wait window.
#[derive(Debug, PartialEq)]
pub enum Delivery {
    Confirmed,
    Unconfirmed,
}

pub struct Publisher {
    client: AsyncClient,
    eventloop: EventLoop,
    in_flight: usize,
    confirm_timeout: Duration,
}

impl Publisher {
    pub fn connect(host: &str, port: u16, confirm_timeout: Duration) -> Self {
        // A fresh client id per instance; the client retransmits its own
        // pending QoS 1 publishes on reconnect, so no broker-side session
        // state needs to survive a restart.
        let client_id = format!("relay-{}", uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, 100);
        info!("Publishing to {} at {}:{}", TOPIC, host, port);

        Self {
            client,
            eventloop,
            in_flight: 0,
            confirm_timeout,
        }
    }

    /// Publishes one payload at QoS 1 and drives the event loop until the
    /// broker acknowledges it or the wait window closes. The caller reads
    /// the next frame only after this returns, which bounds relay memory to
    /// the unconfirmed window and gives the loop its back-pressure point.
    pub async fn publish_confirmed(&mut self, payload: Vec<u8>) -> Result<Delivery> {
        self.client
            .publish(TOPIC, QoS::AtLeastOnce, false, payload)
            .await?;
        self.in_flight += 1;

        let deadline = Instant::now() + self.confirm_timeout;
        loop {
            match timeout_at(deadline, self.eventloop.poll()).await {
                Err(_) => {
                    if self.in_flight > MAX_IN_FLIGHT {
                        return Err(Error::BrokerUnavailable(self.in_flight));
                    }
                    warn!(
                        "Publish unconfirmed after {:?} ({} in flight); client retransmits on reconnect",
                        self.confirm_timeout, self.in_flight
                    );
                    return Ok(Delivery::Unconfirmed);
                }
                Ok(Ok(Event::Incoming(Packet::PubAck(ack)))) => {
                    self.in_flight = self.in_flight.saturating_sub(1);
                    debug!("Publish {} acknowledged", ack.pkid);
                    if self.in_flight == 0 {
                        return Ok(Delivery::Confirmed);
                    }
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    error!("Broker connection error: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}
