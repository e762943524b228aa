use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("broker error: {0}")]
    Broker(#[from] rumqttc::ClientError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("storage write timed out")]
    WriteTimeout,
}

pub type Result<T> = std::result::Result<T, Error>;
