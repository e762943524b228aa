use crate::supervisor::RestartPolicy;
use clap::Parser;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Broker bootstrap address, `host:port` on the wire.
#[derive(Debug, Clone)]
pub struct BrokerAddr {
    pub host: String,
    pub port: u16,
}

impl FromStr for BrokerAddr {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected host:port, got {s:?}"))?;
        if host.is_empty() {
            return Err(format!("empty host in {s:?}"));
        }
        let port = port
            .parse()
            .map_err(|e| format!("invalid port in {s:?}: {e}"))?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for BrokerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Parser, Debug, Clone)]
#[command(about = "Persists telemetry from the broker topic into storage")]
pub struct Config {
    /// Broker bootstrap address as host:port
    #[arg(long, env = "BROKER_ADDR")]
    pub broker_addr: BrokerAddr,

    /// Consumer group identity; names the durable broker session
    #[arg(long, env = "CONSUMER_GROUP_ID")]
    pub group_id: String,

    /// Storage connection string
    #[arg(long, env = "STORAGE_URL")]
    pub storage_url: String,

    /// Storage database name
    #[arg(long, env = "STORAGE_DATABASE")]
    pub storage_database: String,

    /// Address of the metrics/health HTTP listener
    #[arg(long, env = "HTTP_ADDR", default_value = "0.0.0.0:8080")]
    pub http_addr: String,

    /// Upper bound on a single storage write
    #[arg(long, env = "WRITE_TIMEOUT_SECS", default_value_t = 10)]
    pub write_timeout_secs: u64,

    /// Storage connection pool size
    #[arg(long, env = "POOL_SIZE", default_value_t = 20)]
    pub pool_size: u32,

    /// Backoff before the first restart of a failed instance, in milliseconds
    #[arg(long, env = "RESTART_INITIAL_MS", default_value_t = 500)]
    pub restart_initial_ms: u64,

    /// Backoff ceiling, in milliseconds
    #[arg(long, env = "RESTART_MAX_BACKOFF_MS", default_value_t = 30_000)]
    pub restart_max_backoff_ms: u64,

    /// Restarts before giving up; 0 means restart without limit
    #[arg(long, env = "RESTART_MAX_ATTEMPTS", default_value_t = 10)]
    pub restart_max_attempts: u32,
}

impl Config {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn restart_policy(&self) -> RestartPolicy {
        RestartPolicy {
            initial_backoff: Duration::from_millis(self.restart_initial_ms),
            max_backoff: Duration::from_millis(self.restart_max_backoff_ms),
            max_restarts: self.restart_max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_broker_addr() {
        let addr: BrokerAddr = "localhost:1883".parse().unwrap();
        assert_eq!(addr.host, "localhost");
        assert_eq!(addr.port, 1883);
        assert_eq!(addr.to_string(), "localhost:1883");
    }

    #[test]
    fn rejects_malformed_broker_addr() {
        assert!("".parse::<BrokerAddr>().is_err());
        assert!("host".parse::<BrokerAddr>().is_err());
        assert!("host:0x1".parse::<BrokerAddr>().is_err());
    }
}
