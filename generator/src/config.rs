use clap::Parser;
use std::net::IpAddr;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(about = "Simulated device server emitting telemetry batches over TCP")]
pub struct Config {
    /// Address to bind the device socket on
    #[arg(long, env = "GENERATOR_BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: IpAddr,

    /// Port to listen on
    #[arg(long, env = "GENERATOR_PORT")]
    pub port: u16,

    /// Seconds between emitted batches
    #[arg(long, env = "TICK_SECONDS", default_value_t = 10)]
    pub tick_seconds: u64,

    /// Number of client sessions served before exiting, one at a time
    #[arg(long, env = "MAX_SESSIONS", default_value_t = 1)]
    pub max_sessions: u32,
}

impl Config {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_seconds)
    }
}
