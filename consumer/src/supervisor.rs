use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

/// Restart policy for a failed consumer instance: exponential backoff
/// between attempts, bounded attempt count.
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// 0 means restart without limit.
    pub max_restarts: u32,
}

/// Runs one instance at a time, restarting per the policy. Returns the last
/// error once restarts are exhausted, or Ok when an instance exits cleanly
/// (interrupt).
pub async fn run_supervised<F, Fut, E>(policy: &RestartPolicy, mut run: F) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let mut backoff = policy.initial_backoff;
    let mut restarts: u32 = 0;

    loop {
        match run().await {
            Ok(()) => return Ok(()),
            Err(e) => {
                restarts += 1;
                if policy.max_restarts != 0 && restarts > policy.max_restarts {
                    error!("Giving up after {} restarts: {}", policy.max_restarts, e);
                    return Err(e);
                }
                warn!(
                    "Instance failed: {}; restarting in {:?} (restart {})",
                    e, backoff, restarts
                );
                sleep(backoff).await;
                backoff = (backoff * 2).min(policy.max_backoff);
            }
        }
    }
}
