use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection reset by peer")]
    ConnectionReset,

    #[error("generator closed the connection")]
    PeerClosed,

    #[error("broker client error: {0}")]
    Broker(#[from] rumqttc::ClientError),

    #[error("broker unavailable: {0} unconfirmed publishes in flight")]
    BrokerUnavailable(usize),
}

pub type Result<T> = std::result::Result<T, Error>;
