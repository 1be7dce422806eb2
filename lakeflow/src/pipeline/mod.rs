//! Stage execution: the retry executor and the fail-fast orchestrator.
//!
//! This module provides:
//! - The [`Stage`] trait and [`RetryPolicy`]
//! - [`run_with_retry`], bounded retry with a fixed inter-attempt delay
//! - [`Pipeline`], strictly sequential fail-fast execution with
//!   stabilization waits between stages

mod orchestrator;
mod retry;
mod stage;

pub use orchestrator::{
    Pipeline, PipelineAborted, PipelineRun, RunStatus, StageOutcome, StageRecord,
};
pub use retry::{run_with_retry, RetrySuccess};
pub use stage::{FnStage, RetryPolicy, Stage, StageAdvance};
