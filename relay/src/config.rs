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
#[command(about = "Forwards generator telemetry frames onto the broker topic")]
pub struct Config {
    /// Generator host to read frames from
    #[arg(long, env = "GENERATOR_HOST")]
    pub generator_host: String,

    /// Generator port
    #[arg(long, env = "GENERATOR_PORT")]
    pub generator_port: u16,

    /// Broker bootstrap address as host:port
    #[arg(long, env = "BROKER_ADDR")]
    pub broker_addr: BrokerAddr,

    /// Idle window on the generator socket before logging a stall
    #[arg(long, env = "READ_TIMEOUT_SECS", default_value_t = 10)]
    pub read_timeout_secs: u64,

    /// How long to wait for broker acknowledgment of one publish
    #[arg(long, env = "CONFIRM_TIMEOUT_SECS", default_value_t = 5)]
    pub confirm_timeout_secs: u64,

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
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
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
        let addr: BrokerAddr = "broker.local:1883".parse().unwrap();
        assert_eq!(addr.host, "broker.local");
        assert_eq!(addr.port, 1883);
    }

    #[test]
    fn rejects_malformed_broker_addr() {
        assert!("no-port".parse::<BrokerAddr>().is_err());
        assert!(":1883".parse::<BrokerAddr>().is_err());
        assert!("host:notaport".parse::<BrokerAddr>().is_err());
    }
}
