use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Classification used to decide whether a failed attempt may be repeated
pub trait Retryable {
    /// Network, timeout and upstream-quota failures are transient;
    /// everything else is terminal.
    fn is_transient(&self) -> bool;
}

/// Failure of a retried operation
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// A terminal error; the operation was not retried
    #[error("terminal failure: {0}")]
    Terminal(E),

    /// Every attempt failed with a transient error; `last` is the final one
    #[error("failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Terminal(e) => e,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

/// Longest single backoff sleep
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Bounded exponential backoff parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            backoff_factor: if backoff_factor.is_finite() && backoff_factor >= 1.0 {
                backoff_factor
            } else {
                1.0
            },
        }
    }

    /// Sleep after the failed attempt number `attempt` (1-based):
    /// `initial_delay * backoff_factor^(attempt - 1)`, capped at [`MAX_BACKOFF`]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), 2.0)
    }
}

/// Runs a fallible async operation with bounded exponential backoff.
///
/// The executor cannot tell whether an operation is idempotent. A
/// non-idempotent operation wrapped here may take effect more than once
/// when an attempt fails after its side effect happened; only wrap calls
/// the caller knows to be safe to repeat (directory reads are).
///
/// Sleeps are `tokio::time::sleep`, so dropping the returned future aborts
/// a pending backoff immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Execute `op` under the executor's default policy
    pub async fn execute<T, E, F, Fut>(&self, name: &str, op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        self.execute_with(self.policy, name, op).await
    }

    /// Execute `op` under an explicit policy
    pub async fn execute_with<T, E, F, Fut>(
        &self,
        policy: RetryPolicy,
        name: &str,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::debug!("{} succeeded on attempt {}", name, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_transient() => {
                    tracing::debug!("{} failed with terminal error: {}", name, e);
                    return Err(RetryError::Terminal(e));
                }
                Err(e) if attempt >= policy.max_attempts => {
                    tracing::error!("{} failed after {} attempts: {}", name, attempt, e);
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    let delay = policy.delay_after(attempt);
                    tracing::warn!(
                        "{} failed: {}. Retrying in {:?}",
                        attempt_label(name, attempt, policy.max_attempts),
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn attempt_label(name: &str, attempt: u32, max_attempts: u32) -> String {
    format!("{} attempt {} of {}", name, attempt, max_attempts)
}
