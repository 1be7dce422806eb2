//! Error types for lakeflow.
//!
//! The taxonomy separates remote-signal conditions (already exists, not
//! found) from hard failures, and retryable stage errors from fatal ones.
//! Already-exists and not-found are normalized to success inside the
//! resource handles and never surface as errors to the orchestrators.

use thiserror::Error;

use crate::resources::ResourceKind;

/// An error reported by a remote service client.
///
/// `AlreadyExists` and `NotFound` are signals rather than failures: the
/// resource handles treat them as "already in the target state".
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The resource already exists.
    #[error("'{resource}' already exists")]
    AlreadyExists {
        /// The resource name.
        resource: String,
    },

    /// The resource does not exist.
    #[error("'{resource}' not found")]
    NotFound {
        /// The resource name.
        resource: String,
    },

    /// A transient failure (throttling, quota, network) that may clear
    /// on a later attempt.
    #[error("transient failure from {service}: {message}")]
    Transient {
        /// The remote service.
        service: String,
        /// The failure detail.
        message: String,
    },

    /// The remote service refused the request.
    #[error("access denied by {service}: {message}")]
    Denied {
        /// The remote service.
        service: String,
        /// The failure detail.
        message: String,
    },

    /// The request conflicts with the current remote state.
    #[error("conflict on '{resource}': {message}")]
    Conflict {
        /// The resource name.
        resource: String,
        /// The conflict detail.
        message: String,
    },

    /// The request itself was malformed.
    #[error("malformed request to {service}: {message}")]
    Malformed {
        /// The remote service.
        service: String,
        /// The failure detail.
        message: String,
    },
}

impl RemoteError {
    /// Creates an already-exists signal.
    #[must_use]
    pub fn already_exists(resource: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
        }
    }

    /// Creates a not-found signal.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a transient failure.
    #[must_use]
    pub fn transient(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Creates an access-denied failure.
    #[must_use]
    pub fn denied(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Denied {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Creates a state-conflict failure.
    #[must_use]
    pub fn conflict(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conflict {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Creates a malformed-request failure.
    #[must_use]
    pub fn malformed(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Returns true for the already-exists signal.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns true for the not-found signal.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if a later attempt may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

/// A hard failure while provisioning one resource.
#[derive(Debug, Clone, Error)]
#[error("failed to provision {kind} '{resource}': {source}")]
pub struct ProvisionError {
    /// The kind of resource being provisioned.
    pub kind: ResourceKind,
    /// The resource name.
    pub resource: String,
    /// The underlying remote failure.
    #[source]
    pub source: RemoteError,
}

impl ProvisionError {
    /// Creates a new provision error.
    #[must_use]
    pub fn new(kind: ResourceKind, resource: impl Into<String>, source: RemoteError) -> Self {
        Self {
            kind,
            resource: resource.into(),
            source,
        }
    }
}

/// A hard failure while tearing down one resource.
///
/// Teardown failures are recorded in the sweep summary and never abort
/// the remaining deletions.
#[derive(Debug, Clone, Error)]
#[error("failed to tear down {kind} '{resource}': {source}")]
pub struct TeardownError {
    /// The kind of resource being deleted.
    pub kind: ResourceKind,
    /// The resource name.
    pub resource: String,
    /// The underlying remote failure.
    #[source]
    pub source: RemoteError,
}

impl TeardownError {
    /// Creates a new teardown error.
    #[must_use]
    pub fn new(kind: ResourceKind, resource: impl Into<String>, source: RemoteError) -> Self {
        Self {
            kind,
            resource: resource.into(),
            source,
        }
    }
}

/// An invalid or unreachable upstream payload.
///
/// Distinct from remote-call failures: retrying will not fix a
/// structurally invalid response, so these are never retried.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    /// The request to the provider failed outright.
    #[error("data provider request failed: {0}")]
    Request(String),

    /// The payload decoded but was not a list of records.
    #[error("data provider returned a non-list payload")]
    NotAList,

    /// The payload could not be decoded at all.
    #[error("failed to decode provider payload: {0}")]
    Decode(String),
}

/// An error returned by a stage action.
///
/// The retry executor retries `Retryable` errors up to the stage's
/// attempt budget; `Fatal` errors propagate immediately.
#[derive(Debug, Clone, Error)]
pub enum StageError {
    /// The action may succeed if re-run.
    #[error("{0}")]
    Retryable(String),

    /// Retrying cannot help; fail the stage now.
    #[error("{0}")]
    Fatal(String),
}

impl StageError {
    /// Creates a retryable stage error from any displayable cause.
    #[must_use]
    pub fn retryable(cause: impl std::fmt::Display) -> Self {
        Self::Retryable(cause.to_string())
    }

    /// Creates a fatal stage error from any displayable cause.
    #[must_use]
    pub fn fatal(cause: impl std::fmt::Display) -> Self {
        Self::Fatal(cause.to_string())
    }

    /// Returns true if the executor may retry this error.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

impl From<ProvisionError> for StageError {
    fn from(err: ProvisionError) -> Self {
        if err.source.is_transient() {
            Self::retryable(&err)
        } else {
            Self::fatal(&err)
        }
    }
}

impl From<DataError> for StageError {
    fn from(err: DataError) -> Self {
        Self::fatal(err)
    }
}

/// A stage that exhausted its retry budget (or failed fatally).
///
/// Terminal for the pipeline run: no further stages are attempted.
#[derive(Debug, Clone, Error)]
#[error("stage '{stage}' failed after {attempts} attempt(s): {last_cause}")]
pub struct StageFailure {
    /// The failing stage name.
    pub stage: String,
    /// How many times the action was invoked.
    pub attempts: usize,
    /// The error from the final attempt.
    pub last_cause: StageError,
}

/// An invalid resource dependency declaration.
#[derive(Debug, Clone, Error)]
pub enum OrderingError {
    /// The dependency relation contains a cycle.
    #[error("resource dependency cycle among: {}", .0.join(", "))]
    Cycle(Vec<String>),

    /// A resource depends on a name that is not in the inventory.
    #[error("resource '{resource}' depends on unknown resource '{dependency}'")]
    UnknownDependency {
        /// The declaring resource.
        resource: String,
        /// The missing dependency name.
        dependency: String,
    },
}

/// An invalid or missing configuration value.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A required setting was not provided.
    #[error("missing required setting {name}")]
    Missing {
        /// The environment variable name.
        name: String,
    },

    /// A setting was provided but could not be parsed.
    #[error("invalid value '{value}' for {name}")]
    Invalid {
        /// The environment variable name.
        name: String,
        /// The rejected value.
        value: String,
    },
}

/// The top-level error type for lakeflow operations.
#[derive(Debug, Error)]
pub enum LakeflowError {
    /// A resource dependency declaration was invalid.
    #[error("{0}")]
    Ordering(#[from] OrderingError),

    /// A stage failed terminally and the run was aborted.
    #[error("{0}")]
    Stage(#[from] StageFailure),

    /// A resource could not be provisioned.
    #[error("{0}")]
    Provision(#[from] ProvisionError),

    /// A resource could not be deleted.
    #[error("{0}")]
    Teardown(#[from] TeardownError),

    /// The upstream payload was invalid or unreachable.
    #[error("{0}")]
    Data(#[from] DataError),

    /// The configuration was invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_signals() {
        assert!(RemoteError::already_exists("bucket").is_already_exists());
        assert!(RemoteError::not_found("bucket").is_not_found());
        assert!(RemoteError::transient("s3", "throttled").is_transient());
        assert!(!RemoteError::denied("glue", "no permission").is_transient());
    }

    #[test]
    fn test_provision_error_display() {
        let err = ProvisionError::new(
            ResourceKind::StorageBucket,
            "analytics-bucket",
            RemoteError::denied("object-store", "no permission"),
        );
        let rendered = err.to_string();
        assert!(rendered.contains("storage-bucket"));
        assert!(rendered.contains("analytics-bucket"));
    }

    #[test]
    fn test_transient_provision_error_is_retryable() {
        let err = ProvisionError::new(
            ResourceKind::ComputeCluster,
            "media",
            RemoteError::transient("ecs", "rate exceeded"),
        );
        assert!(StageError::from(err).is_retryable());
    }

    #[test]
    fn test_denied_provision_error_is_fatal() {
        let err = ProvisionError::new(
            ResourceKind::CatalogDatabase,
            "lake",
            RemoteError::denied("catalog", "no permission"),
        );
        assert!(!StageError::from(err).is_retryable());
    }

    #[test]
    fn test_data_error_is_fatal() {
        assert!(!StageError::from(DataError::NotAList).is_retryable());
    }

    #[test]
    fn test_stage_failure_display() {
        let failure = StageFailure {
            stage: "ingest-records".to_string(),
            attempts: 3,
            last_cause: StageError::retryable("timed out"),
        };
        assert_eq!(
            failure.to_string(),
            "stage 'ingest-records' failed after 3 attempt(s): timed out"
        );
    }

    #[test]
    fn test_ordering_error_display() {
        let err = OrderingError::Cycle(vec!["a".to_string(), "b".to_string()]);
        assert!(err.to_string().contains("a, b"));
    }
}
