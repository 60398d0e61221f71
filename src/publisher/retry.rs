use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

/// Bounded exponential backoff applied around each publish call. Retries are
/// transparent to the caller, which observes either an ack or a terminal
/// error after the budget is spent.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            initial_delay: Duration::from_millis(100),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.initial_delay * self.multiplier.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Timer seam so backoff is testable without real sleeps.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Terminal outcome once the retry budget is spent.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last: E,
}

/// Runs `op` until it succeeds or the policy's attempt budget is spent,
/// sleeping the policy's delay between attempts.
pub async fn with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut op: F,
) -> Result<T, RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut + Send,
    Fut: Future<Output = Result<T, E>> + Send,
    T: Send,
    E: Send + std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(last) if attempt >= policy.max_attempts => {
                return Err(RetryExhausted {
                    attempts: attempt,
                    last,
                })
            }
            Err(error) => {
                let delay = policy.delay_after(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %error,
                    "transient publish failure, backing off");
                sleeper.sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct RecordingSleeper(Mutex<Vec<Duration>>);

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    #[test]
    fn delays_double_from_the_initial_value() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
        assert_eq!(policy.delay_after(7), Duration::from_millis(6400));
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::default();
        let sleeper = RecordingSleeper(Mutex::new(Vec::new()));
        let failures = AtomicU32::new(3);

        let result = with_backoff(&policy, &sleeper, |_| {
            let remaining = failures.fetch_sub(1, Ordering::SeqCst);
            async move {
                if remaining > 0 {
                    Err("broker busy")
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        let slept = sleeper.0.lock().unwrap().clone();
        assert_eq!(
            slept,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
            ]
        );
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let policy = RetryPolicy::default();
        let sleeper = RecordingSleeper(Mutex::new(Vec::new()));

        let result: Result<(), _> =
            with_backoff(&policy, &sleeper, |_| async { Err("still down") }).await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 8);
        assert_eq!(exhausted.last, "still down");
        // No sleep follows the final attempt.
        assert_eq!(sleeper.0.lock().unwrap().len(), 7);
    }
}
