//! The media pipeline: cluster bootstrap followed by a fixed sequence
//! of processing steps.
//!
//! Each step runs through the same retry executor as the lake stages,
//! with a stabilization wait between steps so a step's output has
//! settled before the next step reads it.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::clients::ClusterApi;
use crate::config::LakeConfig;
use crate::errors::StageError;
use crate::pipeline::{Pipeline, PipelineAborted, PipelineRun, RetryPolicy, Stage, StageAdvance};
use crate::resources::{ClusterHandle, ResourceHandle, ResourceKind, ResourceSpec};

/// One unit of media processing.
///
/// Steps are coarse-grained remote jobs (fetch highlights, transcode,
/// publish); the pipeline only cares that each one either finishes or
/// reports a retryable/fatal failure.
#[async_trait]
pub trait ProcessStep: Send + Sync {
    /// Step name, used in run records and failure reports.
    fn name(&self) -> &str;

    /// Executes the step once.
    async fn execute(&self) -> Result<(), StageError>;
}

/// Adapts a [`ProcessStep`] to the pipeline's [`Stage`] contract.
struct StepStage {
    step: Arc<dyn ProcessStep>,
    policy: RetryPolicy,
    post_delay: Duration,
}

#[async_trait]
impl Stage for StepStage {
    fn name(&self) -> &str {
        self.step.name()
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    fn post_delay(&self) -> Duration {
        self.post_delay
    }

    async fn run(&self) -> Result<StageAdvance, StageError> {
        self.step.execute().await?;
        Ok(StageAdvance::Continue)
    }
}

/// The bootstrap stage: create the compute cluster and verify it is
/// visible before any step is scheduled onto it.
struct BootstrapStage {
    name: String,
    handle: ClusterHandle,
    policy: RetryPolicy,
    post_delay: Duration,
}

#[async_trait]
impl Stage for BootstrapStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    fn post_delay(&self) -> Duration {
        self.post_delay
    }

    async fn run(&self) -> Result<StageAdvance, StageError> {
        self.handle.ensure_exists().await?;
        Ok(StageAdvance::Continue)
    }
}

/// Orchestrates cluster bootstrap plus an ordered list of processing
/// steps.
pub struct MediaPipeline {
    config: LakeConfig,
    cluster: Arc<dyn ClusterApi>,
    steps: Vec<Arc<dyn ProcessStep>>,
}

impl MediaPipeline {
    /// Creates a pipeline with no steps yet.
    #[must_use]
    pub fn new(config: LakeConfig, cluster: Arc<dyn ClusterApi>) -> Self {
        Self {
            config,
            cluster,
            steps: Vec::new(),
        }
    }

    /// Appends a processing step.
    #[must_use]
    pub fn with_step(mut self, step: Arc<dyn ProcessStep>) -> Self {
        self.steps.push(step);
        self
    }

    /// Runs bootstrap and then every step in order, fail-fast.
    ///
    /// A stabilization wait follows the bootstrap and every step
    /// except the last; there is nothing downstream of the last step
    /// to wait for.
    pub async fn run(&self) -> Result<PipelineRun, PipelineAborted> {
        let config = &self.config;
        let spec = ResourceSpec::new(ResourceKind::ComputeCluster, &config.cluster);
        let bootstrap = BootstrapStage {
            name: format!("bootstrap-{}", config.cluster),
            handle: ClusterHandle::new(spec, Arc::clone(&self.cluster), &config.region),
            policy: config.retry,
            post_delay: config.stabilization_wait,
        };

        let mut pipeline = Pipeline::new("media-pipeline").with_stage(Arc::new(bootstrap));
        let last = self.steps.len().saturating_sub(1);
        for (index, step) in self.steps.iter().enumerate() {
            let post_delay = if index == last {
                Duration::ZERO
            } else {
                config.stabilization_wait
            };
            pipeline = pipeline.with_stage(Arc::new(StepStage {
                step: Arc::clone(step),
                policy: config.retry,
                post_delay,
            }));
        }

        pipeline.run().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::InMemoryClusters;
    use crate::pipeline::{RunStatus, StageOutcome};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    struct RecordingStep {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl RecordingStep {
        fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                log: Arc::clone(log),
                fail: false,
            })
        }

        fn failing(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                log: Arc::clone(log),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl ProcessStep for RecordingStep {
        fn name(&self) -> &str {
            &self.name
        }

        async fn execute(&self) -> Result<(), StageError> {
            self.log.lock().push(self.name.clone());
            if self.fail {
                Err(StageError::fatal("step exploded"))
            } else {
                Ok(())
            }
        }
    }

    fn test_config() -> LakeConfig {
        LakeConfig::new()
            .with_retry(RetryPolicy::new(2, Duration::ZERO))
            .with_stabilization_wait(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_steps_run_in_order_after_bootstrap() {
        let clusters = Arc::new(InMemoryClusters::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let pipeline = MediaPipeline::new(test_config(), Arc::clone(&clusters) as Arc<dyn ClusterApi>)
            .with_step(RecordingStep::new("fetch-highlights", &log))
            .with_step(RecordingStep::new("process-videos", &log))
            .with_step(RecordingStep::new("publish", &log));

        let run = pipeline.run().await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(clusters.has_cluster("media-processing"));
        assert_eq!(
            *log.lock(),
            vec!["fetch-highlights", "process-videos", "publish"]
        );
    }

    #[tokio::test]
    async fn test_failing_step_aborts_before_later_steps() {
        let clusters = Arc::new(InMemoryClusters::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let pipeline = MediaPipeline::new(test_config(), Arc::clone(&clusters) as Arc<dyn ClusterApi>)
            .with_step(RecordingStep::new("fetch-highlights", &log))
            .with_step(RecordingStep::failing("process-videos", &log))
            .with_step(RecordingStep::new("publish", &log));

        let aborted = pipeline.run().await.unwrap_err();
        assert_eq!(aborted.failure.stage, "process-videos");
        // Fatal failures are not retried.
        assert_eq!(aborted.failure.attempts, 1);
        assert_eq!(aborted.run.status, RunStatus::Aborted);
        assert_eq!(*log.lock(), vec!["fetch-highlights", "process-videos"]);
    }

    #[tokio::test]
    async fn test_bootstrap_retries_until_cluster_is_visible() {
        let clusters = Arc::new(InMemoryClusters::new());
        clusters.delay_visibility(1);
        let log = Arc::new(Mutex::new(Vec::new()));

        let pipeline = MediaPipeline::new(test_config(), Arc::clone(&clusters) as Arc<dyn ClusterApi>)
            .with_step(RecordingStep::new("fetch-highlights", &log));

        let run = pipeline.run().await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(
            run.outcome_of("bootstrap-media-processing"),
            Some(&StageOutcome::Succeeded { attempts: 2 })
        );
        assert_eq!(*log.lock(), vec!["fetch-highlights"]);
    }
}
