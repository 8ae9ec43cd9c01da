//! Destroy with a fixed retry budget.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::engine::{ProvisioningEngine, ProvisioningOptions};
use crate::errors::{HarnessError, TeardownError};

/// Default number of destroy attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default pause between destroy attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Result<Self, HarnessError> {
        if max_attempts == 0 {
            return Err(HarnessError::InvalidRetryPolicy(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            interval,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_RETRY_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownResult {
    pub attempts_used: u32,
    pub last_error: Option<String>,
    pub succeeded: bool,
}

impl TeardownResult {
    /// Escalate an exhausted teardown into the fatal error.
    pub fn into_result(self) -> Result<(), TeardownError> {
        if self.succeeded {
            return Ok(());
        }
        Err(TeardownError::Exhausted {
            attempts: self.attempts_used,
            last_error: self
                .last_error
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }
}

/// Runs destroy until it succeeds or the policy is exhausted.
///
/// Destroy is assumed idempotent: a success against already-absent resources is a
/// success, and no error is special-cased as "already destroyed".
#[derive(Clone)]
pub struct RetryingTeardown {
    engine: Arc<dyn ProvisioningEngine>,
}

impl RetryingTeardown {
    pub fn new(engine: Arc<dyn ProvisioningEngine>) -> Self {
        Self { engine }
    }

    pub async fn teardown(
        &self,
        options: &ProvisioningOptions,
        policy: &RetryPolicy,
    ) -> TeardownResult {
        let max = policy.max_attempts();
        let mut last_error = None;

        for attempt in 1..=max {
            info!(attempt, max_attempts = max, "attempting destroy");

            match self.engine.destroy(options).await {
                Ok(log) => {
                    info!(attempt, log_bytes = log.len(), "destroy succeeded");
                    return TeardownResult {
                        attempts_used: attempt,
                        last_error: None,
                        succeeded: true,
                    };
                }
                Err(e) => {
                    warn!(attempt, max_attempts = max, error = %e, "destroy attempt failed");
                    last_error = Some(e.to_string());
                }
            }

            if attempt < max {
                info!(retry_in_secs = policy.interval().as_secs_f64(), "retrying destroy");
                tokio::time::sleep(policy.interval()).await;
            }
        }

        error!(
            attempts = max,
            error = last_error.as_deref().unwrap_or_default(),
            "destroy failed on every attempt"
        );
        TeardownResult {
            attempts_used: max,
            last_error,
            succeeded: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_rejects_zero_attempts() {
        let err = RetryPolicy::new(0, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidRetryPolicy(_)));
    }

    #[test]
    fn test_retry_policy_allows_zero_interval() {
        let policy = RetryPolicy::new(1, Duration::ZERO).unwrap();
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.interval(), Duration::ZERO);
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_teardown_result_into_result() {
        let ok = TeardownResult {
            attempts_used: 2,
            last_error: None,
            succeeded: true,
        };
        assert!(ok.into_result().is_ok());

        let failed = TeardownResult {
            attempts_used: 5,
            last_error: Some("ResourceGroupBeingDeleted".to_string()),
            succeeded: false,
        };
        match failed.into_result() {
            Err(TeardownError::Exhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 5);
                assert_eq!(last_error, "ResourceGroupBeingDeleted");
            }
            other => panic!("Expected Exhausted, got {other:?}"),
        }
    }
}
