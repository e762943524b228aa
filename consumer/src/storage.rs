use crate::config::Config;
use crate::errors::{Error, Result};
use crate::metrics::{DB_FAILURES_TOTAL, INSERT_LATENCY_SECONDS};
use crate::payload::Document;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{error, info, warn};

const MAX_ATTEMPTS: u32 = 5;

pub async fn make_pool(cfg: &Config) -> Result<PgPool> {
    let options = PgConnectOptions::from_str(&cfg.storage_url)?.database(&cfg.storage_database);

    info!("Connecting to storage database {}...", cfg.storage_database);
    let pool = PgPoolOptions::new()
        .max_connections(cfg.pool_size)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await?;

    info!("Storage connection established");
    info!("Running storage migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed");

    Ok(pool)
}

/// Writes one document and returns its generated id. Redelivered messages
/// insert again; the table has no uniqueness to violate.
pub async fn insert_one(pool: &PgPool, doc: &Document, write_timeout: Duration) -> Result<i64> {
    let value = Value::Object(doc.clone());
    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let write = sqlx::query_scalar::<_, i64>(
            "INSERT INTO devices (doc) VALUES ($1) RETURNING id",
        )
        .bind(&value)
        .fetch_one(pool);

        match timeout(write_timeout, write).await {
            Ok(Ok(id)) => {
                INSERT_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());
                return Ok(id);
            }
            Ok(Err(e)) => retry_or_bail(attempts, e).await?,
            Err(_) => {
                error!("Storage write timed out after {:?}", write_timeout);
                return Err(Error::WriteTimeout);
            }
        }
    }
}

/// Writes a batch in one statement and returns the generated ids.
pub async fn insert_many(
    pool: &PgPool,
    docs: &[Document],
    write_timeout: Duration,
) -> Result<Vec<i64>> {
    let values: Vec<Value> = docs.iter().cloned().map(Value::Object).collect();
    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let write = sqlx::query_scalar::<_, i64>(
            "INSERT INTO devices (doc) SELECT * FROM UNNEST($1::jsonb[]) RETURNING id",
        )
        .bind(&values)
        .fetch_all(pool);

        match timeout(write_timeout, write).await {
            Ok(Ok(ids)) => {
                INSERT_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());
                return Ok(ids);
            }
            Ok(Err(e)) => retry_or_bail(attempts, e).await?,
            Err(_) => {
                error!("Storage write timed out after {:?}", write_timeout);
                return Err(Error::WriteTimeout);
            }
        }
    }
}

async fn retry_or_bail(attempts: u32, err: sqlx::Error) -> Result<()> {
    if attempts >= MAX_ATTEMPTS || !is_transient_error(&err) {
        error!(
            "Storage insert failed permanently after {} attempt(s): {}",
            attempts, err
        );
        return Err(Error::Database(err));
    }

    let wait_ms = 100 * 2_u64.pow((attempts - 1).min(5));
    warn!(
        "Storage insert failed (attempt {}/{}), retrying in {}ms: {}",
        attempts, MAX_ATTEMPTS, wait_ms, err
    );
    DB_FAILURES_TOTAL.inc();
    tokio::time::sleep(Duration::from_millis(wait_ms)).await;
    Ok(())
}

fn is_transient_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| {
            code == "08000" || // connection_exception
            code == "08003" || // connection_does_not_exist
            code == "08006" || // connection_failure
            code == "57P03" || // cannot_connect_now
            code == "53300" // too_many_connections
        }),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_exhaustion_is_transient() {
        assert!(is_transient_error(&sqlx::Error::PoolTimedOut));
        assert!(is_transient_error(&sqlx::Error::PoolClosed));
    }

    #[test]
    fn row_not_found_is_not_transient() {
        assert!(!is_transient_error(&sqlx::Error::RowNotFound));
    }
}
