//! Bounded-backoff retry for transient external failures.
//!
//! Store, generation, and embedding calls are retried at the call site;
//! after exhaustion the error propagates and the containing evidence item
//! moves to `error` status.

use std::time::Duration;
use tracing::warn;

/// A bounded retry policy with linearly growing backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Run a fallible operation, sleeping `backoff * attempt` between
    /// attempts. Returns the final error once attempts are exhausted.
    pub async fn run<T, E, F>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 1u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts => {
                    warn!(%attempt, operation = what, error = %err, "transient failure, retrying");
                    tokio::time::sleep(self.backoff * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn succeeds_without_retrying() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = Cell::new(0u32);
        let result: Result<i32, String> = policy
            .run("op", || {
                calls.set(calls.get() + 1);
                Ok(7)
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = Cell::new(0u32);
        let result: Result<&str, String> = policy
            .run("op", || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err("transient".to_string())
                } else {
                    Ok("done")
                }
            })
            .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let calls = Cell::new(0u32);
        let result: Result<(), String> = policy
            .run("op", || {
                calls.set(calls.get() + 1);
                Err(format!("failure {}", calls.get()))
            })
            .await;
        assert_eq!(result.unwrap_err(), "failure 2");
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn zero_attempts_is_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        let result: Result<i32, String> = policy.run("op", || Ok(1)).await;
        assert_eq!(result.unwrap(), 1);
    }
}
