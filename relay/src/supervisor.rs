use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

/// Restart policy for a failed instance: exponential backoff between
/// attempts, bounded attempt count.
#[derive(Debug, Clone)]
pub struct RestartPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// 0 means restart without limit.
    pub max_restarts: u32,
}

/// Runs one instance at a time, restarting per the policy. Returns the last
/// error once restarts are exhausted, or Ok when an instance exits cleanly.
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn tight_policy(max_restarts: u32) -> RestartPolicy {
        RestartPolicy {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            max_restarts,
        }
    }

    #[test]
    fn exhausts_restarts_and_returns_last_error() {
        tokio_test::block_on(async {
            let runs = Cell::new(0u32);
            let result = run_supervised(&tight_policy(3), || {
                runs.set(runs.get() + 1);
                async { Err::<(), &str>("boom") }
            })
            .await;

            assert_eq!(result, Err("boom"));
            // Initial attempt plus three restarts.
            assert_eq!(runs.get(), 4);
        });
    }

    #[test]
    fn stops_restarting_after_clean_exit() {
        tokio_test::block_on(async {
            let runs = Cell::new(0u32);
            let result = run_supervised(&tight_policy(10), || {
                let attempt = runs.get() + 1;
                runs.set(attempt);
                async move {
                    if attempt < 3 {
                        Err("flaky")
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

            assert_eq!(result, Ok(()));
            assert_eq!(runs.get(), 3);
        });
    }
}
