//! Fail-fast sequential pipeline execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::retry::run_with_retry;
use super::stage::{Stage, StageAdvance};
use crate::errors::StageFailure;

/// Lifecycle of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run has not begun.
    NotStarted,
    /// Stages are being executed.
    Running,
    /// Every stage succeeded or was gracefully skipped.
    Completed,
    /// A stage failed terminally; remaining stages were not attempted.
    Aborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

/// The terminal outcome of one stage within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum StageOutcome {
    /// The stage succeeded.
    Succeeded {
        /// Invocations it took, including retries.
        attempts: usize,
    },
    /// The stage was skipped by an earlier graceful short-circuit.
    Skipped,
    /// The stage exhausted its retry budget or failed fatally.
    Failed {
        /// Invocations before giving up.
        attempts: usize,
        /// The rendered final cause.
        cause: String,
    },
}

/// One stage's entry in the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// The stage name.
    pub stage: String,
    /// What happened to it.
    pub outcome: StageOutcome,
}

/// The ephemeral report of one pipeline run.
///
/// Created at run start and handed back at run end; nothing is
/// persisted across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique id for this run.
    pub id: Uuid,
    /// The pipeline name.
    pub pipeline: String,
    /// Terminal status.
    pub status: RunStatus,
    /// Outcomes in execution order.
    pub stages: Vec<StageRecord>,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    fn new(pipeline: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline: pipeline.into(),
            status: RunStatus::NotStarted,
            stages: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Returns the recorded outcome for a stage, if it was reached.
    #[must_use]
    pub fn outcome_of(&self, stage: &str) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|record| record.stage == stage)
            .map(|record| &record.outcome)
    }

    /// Returns true if the run completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// A run that was aborted by a terminal stage failure.
///
/// Carries the partial run report alongside the failure so the caller
/// is never left guessing which stage aborted.
#[derive(Debug, Error)]
#[error("{failure}")]
pub struct PipelineAborted {
    /// The terminal failure.
    pub failure: StageFailure,
    /// The report up to and including the failing stage.
    pub run: PipelineRun,
}

/// An ordered list of stages executed strictly sequentially.
///
/// Fail-fast: the first terminal [`StageFailure`] aborts the run and
/// no later stage is attempted, since later stages would act on an
/// inconsistent resource state.
pub struct Pipeline {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Appends a stage.
    #[must_use]
    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs every stage in order.
    ///
    /// Each stage goes through the retry executor; after a success the
    /// stage's stabilization wait elapses before the next stage runs.
    /// A [`StageAdvance::SkipRemaining`] marks the rest of the stages
    /// skipped and completes the run.
    pub async fn run(&self) -> Result<PipelineRun, PipelineAborted> {
        let mut run = PipelineRun::new(&self.name);
        run.status = RunStatus::Running;
        tracing::info!(pipeline = %self.name, run_id = %run.id, stages = self.stages.len(), "pipeline run started");

        let mut cursor = 0;
        while cursor < self.stages.len() {
            let stage = &self.stages[cursor];
            match run_with_retry(stage.as_ref()).await {
                Ok(success) => {
                    run.stages.push(StageRecord {
                        stage: stage.name().to_string(),
                        outcome: StageOutcome::Succeeded {
                            attempts: success.attempts,
                        },
                    });
                    tracing::info!(
                        pipeline = %self.name,
                        stage = stage.name(),
                        attempts = success.attempts,
                        "stage completed"
                    );

                    if success.advance == StageAdvance::SkipRemaining {
                        for skipped in &self.stages[cursor + 1..] {
                            run.stages.push(StageRecord {
                                stage: skipped.name().to_string(),
                                outcome: StageOutcome::Skipped,
                            });
                        }
                        tracing::info!(
                            pipeline = %self.name,
                            after = stage.name(),
                            skipped = self.stages.len() - cursor - 1,
                            "remaining stages skipped"
                        );
                        break;
                    }

                    let wait = stage.post_delay();
                    if !wait.is_zero() && cursor + 1 < self.stages.len() {
                        tracing::debug!(
                            pipeline = %self.name,
                            stage = stage.name(),
                            wait_secs = wait.as_secs_f64(),
                            "waiting for resources to stabilize"
                        );
                        tokio::time::sleep(wait).await;
                    }
                }
                Err(failure) => {
                    run.stages.push(StageRecord {
                        stage: failure.stage.clone(),
                        outcome: StageOutcome::Failed {
                            attempts: failure.attempts,
                            cause: failure.last_cause.to_string(),
                        },
                    });
                    run.status = RunStatus::Aborted;
                    run.finished_at = Some(Utc::now());
                    tracing::error!(
                        pipeline = %self.name,
                        run_id = %run.id,
                        stage = %failure.stage,
                        attempts = failure.attempts,
                        error = %failure.last_cause,
                        "pipeline aborted"
                    );
                    return Err(PipelineAborted { failure, run });
                }
            }
            cursor += 1;
        }

        run.status = RunStatus::Completed;
        run.finished_at = Some(Utc::now());
        tracing::info!(pipeline = %self.name, run_id = %run.id, "pipeline run completed");
        Ok(run)
    }
}
