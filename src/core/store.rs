//! Store adapter - the persistent store plus the retry policy for transient failures.
//!
//! All mutations go through a database transaction opened by the operation
//! itself; this module only decides whether a failed attempt is worth repeating.
//! Transient errors (busy database, lost connection, exhausted pool) are retried
//! with exponential backoff, everything else is returned on the first attempt.

use crate::{
    config::RetryConfig,
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded exponential backoff for transient store errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Cap for any single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay after the given failed attempt (1-based): `base * 2^(attempt-1)`, capped.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

/// Shared handle to the persistent store.
///
/// Cloning is cheap; the underlying connection is a pool.
#[derive(Debug, Clone)]
pub struct Store {
    db: DatabaseConnection,
    retry: RetryPolicy,
}

impl Store {
    /// Wraps a connection with a retry policy.
    #[must_use]
    pub const fn new(db: DatabaseConnection, retry: RetryPolicy) -> Self {
        Self { db, retry }
    }

    /// The underlying connection, for operations composed inside a transaction.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Runs `op`, repeating it while it fails with a transient store error.
    ///
    /// `op` must open and commit its own transaction so that a failed attempt
    /// leaves nothing behind. When the attempts run out the last error is
    /// reported as [`Error::StoreUnavailable`].
    pub async fn run<T, F, Fut>(&self, operation: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        with_retry(&self.retry, operation, op).await
    }
}

/// Retry loop behind [`Store::run`].
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                if attempt >= max_attempts {
                    warn!(operation, attempts = attempt, error = %err, "Store unavailable, giving up");
                    return Err(Error::StoreUnavailable {
                        operation: operation.to_string(),
                        attempts: attempt,
                        message: err.to_string(),
                    });
                }
                let delay = policy.delay_for(attempt);
                debug!(operation, attempt, ?delay, error = %err, "Transient store error, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{ConnAcquireErr, DbErr};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn transient() -> Error {
        Error::Database(DbErr::ConnectionAcquire(ConnAcquireErr::Timeout))
    }

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(500),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_transient_error_is_retried_until_success() -> Result<()> {
        let calls = AtomicU32::new(0);
        let value = with_retry(&fast_policy(3), "test", || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move { if attempt < 2 { Err(transient()) } else { Ok(7) } }
        })
        .await?;

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_store_unavailable() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(2), "debit", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(transient()) }
        })
        .await;

        assert!(matches!(
            result,
            Err(Error::StoreUnavailable { attempts: 2, ref operation, .. }) if operation == "debit"
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_validation_and_invariant_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(5), "purchase", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Error::InvariantViolation {
                    message: "negative balance".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(Error::InvariantViolation { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_policy_from_config_has_at_least_one_attempt() {
        let policy = RetryPolicy::from(&RetryConfig {
            max_attempts: 0,
            base_delay_ms: 5,
            max_delay_ms: 10,
        });
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.base_delay, Duration::from_millis(5));
    }
}
