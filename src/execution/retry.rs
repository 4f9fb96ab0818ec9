use anyhow::Result;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

/// Longest single sleep between attempts.
pub const MAX_DELAY: Duration = Duration::from_secs(300);

/// Exponential backoff for flaky multi-step calls (login, page scraping).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    backoff_factor: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_factor: f64) -> Result<Self> {
        anyhow::ensure!(backoff_factor > 1.0, "backoff_factor must be greater than 1");
        anyhow::ensure!(max_attempts >= 1, "max_attempts must be at least 1");
        anyhow::ensure!(!initial_delay.is_zero(), "initial_delay must be greater than 0");
        Ok(Self {
            max_attempts,
            initial_delay,
            backoff_factor,
        })
    }

    /// 3 attempts, 3s then 6s.
    pub fn login() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(3),
            backoff_factor: 2.0,
        }
    }

    /// 5 attempts, 2s growing ×3.
    pub fn scrape() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            backoff_factor: 3.0,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Sleeps taken between attempts, in order.
    pub fn delays(&self) -> Vec<Duration> {
        let mut delay = self.initial_delay;
        (1..self.max_attempts)
            .map(|_| {
                let current = delay;
                delay = Duration::try_from_secs_f64(delay.as_secs_f64() * self.backoff_factor)
                    .map_or(MAX_DELAY, |next| next.min(MAX_DELAY));
                current
            })
            .collect()
    }

    /// Run `op` until it succeeds or attempts run out. The last error is returned.
    pub async fn run<T, E, F, Fut>(&self, name: &str, mut op: F) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: Display,
    {
        let mut delays = self.delays().into_iter();
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => match delays.next() {
                    Some(delay) => {
                        warn!(attempt, "{name} failed: {e}, retrying in {delay:?}");
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        error!(attempt, "{name} failed after {attempt} attempts: {e}");
                        return Err(e);
                    }
                },
            }
        }
    }
}
