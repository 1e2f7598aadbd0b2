use log::{error, warn};
use std::future::Future;
use std::time::Duration;

use crate::mail::{MailClient, MailError};

/// Attempt budget and exponential backoff for mail transport calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (1-based); the first attempt has none.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 2);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Every delay the policy can wait, in order.
    pub fn delays(&self) -> Vec<Duration> {
        (2..=self.max_attempts).map(|k| self.delay_before(k)).collect()
    }
}

/// Run `op` under `policy`.
///
/// Retryable failures wait the backoff delay and reset the client's
/// transport before the next attempt. Anything else is returned at once.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mail: &dyn MailClient,
    what: &str,
    mut op: F,
) -> Result<T, MailError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, MailError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                attempt += 1;
                let delay = policy.delay_before(attempt);
                warn!(
                    "{what} failed (attempt {}/{}): {e}; retrying in {delay:?}",
                    attempt - 1,
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
                if let Err(reset) = mail.reset_transport().await {
                    warn!("transport reset before retrying {what} failed: {reset}");
                }
            }
            Err(e) => {
                if e.is_retryable() {
                    error!("{what} failed after {attempt} attempts: {e}");
                }
                return Err(e);
            }
        }
    }
}
