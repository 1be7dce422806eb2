//! Stage trait and retry policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::StageError;

/// How the pipeline should proceed after a successful stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageAdvance {
    /// Move on to the next stage.
    Continue,
    /// Skip every remaining stage and complete the run.
    ///
    /// Used for graceful early completion, e.g. when ingestion finds
    /// no records and the data-dependent stages have nothing to act on.
    SkipRemaining,
}

/// Bounded retry with a fixed inter-attempt delay. No backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempt budget, including the first invocation.
    pub max_attempts: usize,
    /// Sleep between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A single attempt with no retries.
    #[must_use]
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

/// One named, retryable unit of work in a pipeline.
///
/// Actions must be idempotent or safely re-runnable; the retry
/// executor re-invokes them from scratch. That is a precondition of
/// inclusion in a pipeline, not something the executor can enforce.
#[async_trait]
pub trait Stage: Send + Sync {
    /// The stage name, used in reports and failure context.
    fn name(&self) -> &str;

    /// The retry budget for this stage.
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Stabilization wait after success, before the next stage runs.
    ///
    /// Models eventual consistency in freshly created remote
    /// resources; zero means advance immediately.
    fn post_delay(&self) -> Duration {
        Duration::ZERO
    }

    /// Runs the stage action once.
    async fn run(&self) -> Result<StageAdvance, StageError>;
}

/// An async closure-backed stage for small units of work.
pub struct FnStage<F, Fut>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<StageAdvance, StageError>> + Send,
{
    name: String,
    func: F,
    retry_policy: RetryPolicy,
    post_delay: Duration,
}

impl<F, Fut> FnStage<F, Fut>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<StageAdvance, StageError>> + Send,
{
    /// Creates a closure-backed stage with the default retry policy.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
            retry_policy: RetryPolicy::default(),
            post_delay: Duration::ZERO,
        }
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the stabilization wait after success.
    #[must_use]
    pub fn with_post_delay(mut self, delay: Duration) -> Self {
        self.post_delay = delay;
        self
    }
}

#[async_trait]
impl<F, Fut> Stage for FnStage<F, Fut>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<StageAdvance, StageError>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    fn post_delay(&self) -> Duration {
        self.post_delay
    }

    async fn run(&self) -> Result<StageAdvance, StageError> {
        (self.func)().await
    }
}
