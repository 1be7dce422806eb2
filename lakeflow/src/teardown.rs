//! Best-effort teardown in reverse dependency order.
//!
//! Not a retry-executor client: a failed deletion is logged and the
//! sweep moves on to the next resource, so one stuck deletion cannot
//! block the rest of the cleanup.

use serde::Serialize;
use std::sync::Arc;

use crate::errors::{OrderingError, TeardownError};
use crate::resources::{teardown_order, EnsureOutcome, ResourceHandle, ResourceSpec};

/// Tally of one teardown sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeardownSummary {
    /// Resources whose deletion changed remote state.
    pub removed: usize,
    /// Resources that were already absent.
    pub already_absent: usize,
    /// Resources whose deletion failed.
    pub failed: usize,
    /// The per-resource failures, in sweep order.
    #[serde(skip)]
    pub failures: Vec<TeardownError>,
}

impl TeardownSummary {
    /// Resources that ended up absent, whether or not we deleted them.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.removed + self.already_absent
    }

    /// Returns true if every resource ended up absent.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Deletes an inventory of resources, most-dependent first.
pub struct Teardown {
    handles: Vec<Arc<dyn ResourceHandle>>,
}

impl Teardown {
    /// Builds a teardown sweep over the given handles.
    ///
    /// The sweep order is computed once here, from the handles' specs:
    /// the reverse of the provisioning order, so tables go before the
    /// database that contains them and objects before their bucket.
    pub fn new(handles: Vec<Arc<dyn ResourceHandle>>) -> Result<Self, OrderingError> {
        let specs: Vec<ResourceSpec> = handles
            .iter()
            .map(|handle| handle.spec().clone())
            .collect();
        let order = teardown_order(&specs)?;
        let ordered = order
            .into_iter()
            .map(|i| Arc::clone(&handles[i]))
            .collect();
        Ok(Self { handles: ordered })
    }

    /// The resource names in sweep order.
    #[must_use]
    pub fn sweep_order(&self) -> Vec<&str> {
        self.handles
            .iter()
            .map(|handle| handle.spec().name.as_str())
            .collect()
    }

    /// Runs the sweep.
    ///
    /// Every resource is attempted exactly once regardless of earlier
    /// failures; individual failures are recorded in the summary and
    /// never raised. The caller decides whether a dirty summary should
    /// be escalated.
    pub async fn run(&self) -> TeardownSummary {
        let mut summary = TeardownSummary::default();
        tracing::info!(resources = self.handles.len(), "teardown sweep started");

        for handle in &self.handles {
            let spec = handle.spec();
            match handle.ensure_absent().await {
                Ok(EnsureOutcome::Applied) => summary.removed += 1,
                Ok(EnsureOutcome::AlreadySatisfied) => summary.already_absent += 1,
                Err(err) => {
                    tracing::warn!(
                        kind = %spec.kind,
                        resource = %spec.name,
                        error = %err,
                        "teardown failed for resource; continuing"
                    );
                    summary.failed += 1;
                    summary.failures.push(err);
                }
            }
        }

        tracing::info!(
            removed = summary.removed,
            already_absent = summary.already_absent,
            failed = summary.failed,
            "teardown sweep finished"
        );
        summary
    }
}
