//! The retry executor: bounded attempts with a fixed inter-attempt
//! delay.

use super::stage::{Stage, StageAdvance};
use crate::errors::StageFailure;

/// A stage invocation that eventually succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySuccess {
    /// How the pipeline should proceed.
    pub advance: StageAdvance,
    /// How many invocations it took.
    pub attempts: usize,
}

/// Runs a stage under its retry policy.
///
/// Retryable errors are re-attempted after the policy's fixed delay
/// until the attempt budget is exhausted; fatal errors propagate
/// immediately. Either way the returned [`StageFailure`] carries the
/// stage name, the attempt count, and the final cause.
pub async fn run_with_retry(stage: &dyn Stage) -> Result<RetrySuccess, StageFailure> {
    let policy = stage.retry_policy();
    let mut attempts = 0;

    loop {
        attempts += 1;
        match stage.run().await {
            Ok(advance) => {
                return Ok(RetrySuccess { advance, attempts });
            }
            Err(err) if err.is_retryable() && attempts < policy.max_attempts => {
                tracing::warn!(
                    stage = stage.name(),
                    attempt = attempts,
                    max_attempts = policy.max_attempts,
                    delay_secs = policy.delay.as_secs_f64(),
                    error = %err,
                    "stage failed; retrying after delay"
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(err) => {
                return Err(StageFailure {
                    stage: stage.name().to_string(),
                    attempts,
                    last_cause: err,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StageError;
    use crate::pipeline::stage::{FnStage, RetryPolicy};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let stage = FnStage::new("ok", || async { Ok(StageAdvance::Continue) });
        let success = run_with_retry(&stage).await.unwrap();
        assert_eq!(success.attempts, 1);
        assert_eq!(success.advance, StageAdvance::Continue);
    }

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let stage = FnStage::new("flaky", move || {
            let calls = Arc::clone(&counter);
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(StageError::retryable("not yet"))
                } else {
                    Ok(StageAdvance::Continue)
                }
            }
        })
        .with_retry_policy(RetryPolicy::new(5, Duration::from_millis(1)));

        let success = run_with_retry(&stage).await.unwrap();
        assert_eq!(success.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_invokes_exactly_max_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let delay = Duration::from_millis(20);
        let stage = FnStage::new("doomed", move || {
            let calls = Arc::clone(&counter);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StageError::retryable("still broken"))
            }
        })
        .with_retry_policy(RetryPolicy::new(3, delay));

        let started = Instant::now();
        let failure = run_with_retry(&stage).await.unwrap_err();

        assert_eq!(failure.stage, "doomed");
        assert_eq!(failure.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two inter-attempt delays elapsed, never a third.
        assert!(started.elapsed() >= delay * 2);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let stage = FnStage::new("invalid", move || {
            let calls = Arc::clone(&counter);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StageError::fatal("payload is not a list"))
            }
        })
        .with_retry_policy(RetryPolicy::new(5, Duration::from_millis(1)));

        let failure = run_with_retry(&stage).await.unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
