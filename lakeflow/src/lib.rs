//! # Lakeflow
//!
//! Lifecycle orchestration for a small cloud analytics data lake, plus
//! a multi-step media pipeline built on the same stage machinery.
//!
//! The crate is organized around a few small contracts:
//!
//! - **Resource handles**: idempotent create/verify/delete for each
//!   remote resource kind (bucket, catalog database and table, query
//!   workgroup, compute cluster)
//! - **Stages and retry**: bounded fixed-delay retry around each unit
//!   of work, with stabilization waits between dependent stages
//! - **Pipeline orchestrator**: fail-fast sequencing with a per-run
//!   record of every stage outcome
//! - **Teardown orchestrator**: best-effort reverse-dependency sweep
//!   that tolerates not-found and continues past failures
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use lakeflow::prelude::*;
//!
//! let config = LakeConfig::from_env()?;
//! let lake = DataLake::new(config, store, catalog, workgroups, provider);
//!
//! let report = lake.provision().await?;
//! println!("ingested {} records", report.records_ingested);
//!
//! let summary = lake.teardown().await?;
//! println!("removed {} resources", summary.removed);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod clients;
pub mod config;
pub mod errors;
pub mod lake;
pub mod media;
pub mod notify;
pub mod observability;
pub mod pipeline;
pub mod provider;
pub mod resources;
pub mod teardown;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clients::{
        Catalog, ClusterApi, NotificationChannel, ObjectStore, Workgroups,
    };
    pub use crate::config::LakeConfig;
    pub use crate::errors::{
        ConfigError, DataError, LakeflowError, OrderingError, ProvisionError,
        RemoteError, StageError, StageFailure, TeardownError,
    };
    pub use crate::lake::{DataLake, LakeReport};
    pub use crate::media::{MediaPipeline, ProcessStep};
    pub use crate::notify::Notifier;
    pub use crate::pipeline::{
        Pipeline, PipelineAborted, PipelineRun, RetryPolicy, RunStatus, Stage,
        StageAdvance, StageOutcome,
    };
    pub use crate::provider::{DataProvider, FixedDataProvider, HttpDataProvider};
    pub use crate::resources::{
        EnsureOutcome, ResourceHandle, ResourceKind, ResourceSpec, ResourceState,
    };
    pub use crate::teardown::{Teardown, TeardownSummary};
}
