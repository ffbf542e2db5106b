use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

use crate::error::GfsError;

/// Fixed-delay retry. `max_attempts` of `None` retries forever.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Builds a policy from the configured attempt count, `-1` (or any
    /// negative value) meaning unbounded.
    pub fn from_attempts(attempts: i64, delay: Duration) -> Self {
        let max_attempts = if attempts < 0 {
            None
        } else {
            Some(attempts.max(1) as u32)
        };
        Self {
            max_attempts,
            delay,
        }
    }

    pub async fn retry<F, Fut, R, P>(&self, mut f: F, should_retry: P) -> Result<R, GfsError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<R, GfsError>>,
        P: Fn(&GfsError) -> bool,
    {
        let mut curr_try = 1;
        loop {
            match f(curr_try).await {
                Ok(v) => {
                    return Ok(v);
                }
                Err(e) => {
                    error!(error=%e,retry=%curr_try,"Error happened while running closure");
                    if !should_retry(&e) {
                        return Err(e);
                    }
                    if self.max_attempts.is_some_and(|max| curr_try >= max) {
                        error!("Reached max retries return error");
                        return Err(e);
                    }
                }
            }
            curr_try += 1;
            info!(sleep_duration = ?self.delay, "Waiting before retry");
            sleep(self.delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(5),
            delay: Duration::from_secs(3),
        }
    }
}
