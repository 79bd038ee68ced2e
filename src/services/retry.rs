//! Retry policy with exponential backoff
//!
//! One policy object shared by every price fetch: bounded attempts, capped
//! exponential delay with optional jitter, and a caller-supplied classifier
//! that stops retrying on permanent failures.

use crate::config::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration, multiplier: f64, jitter: bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            multiplier: multiplier.max(1.0),
            jitter,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.multiplier,
            config.jitter,
        )
    }

    /// Delay before the attempt following `failed_attempts` failures (no jitter)
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }

    fn delay_for(&self, failed_attempts: u32) -> Duration {
        let delay = self.backoff(failed_attempts);
        if self.jitter && !delay.is_zero() {
            // Equal jitter: half fixed, half random
            let factor = rand::thread_rng().gen_range(0.5..=1.0);
            delay.mul_f64(factor)
        } else {
            delay
        }
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. On failure the last error is
    /// returned together with the number of attempts made.
    pub async fn run<T, E, F, Fut, C>(&self, mut op: F, is_transient: C) -> Result<T, (E, u32)>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if !is_transient(&e) => {
                    debug!("Permanent failure on attempt {}: {}", attempt, e);
                    return Err((e, attempt));
                }
                Err(e) if attempt >= self.max_attempts => {
                    debug!("Giving up after {} attempts: {}", attempt, e);
                    return Err((e, attempt));
                }
                Err(e) => {
                    let delay = self.delay_for(attempt);
                    debug!(
                        "Attempt {}/{} failed ({}), retrying in {:?}",
                        attempt, self.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
