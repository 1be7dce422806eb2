//! Declarative resource identities and dependency ordering.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::errors::OrderingError;

/// The closed set of remote resource kinds this crate manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// An object-store bucket.
    StorageBucket,
    /// A metadata catalog database.
    CatalogDatabase,
    /// A table inside a catalog database.
    CatalogTable,
    /// A query-execution workgroup.
    QueryWorkgroup,
    /// A compute cluster.
    ComputeCluster,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageBucket => write!(f, "storage-bucket"),
            Self::CatalogDatabase => write!(f, "catalog-database"),
            Self::CatalogTable => write!(f, "catalog-table"),
            Self::QueryWorkgroup => write!(f, "query-workgroup"),
            Self::ComputeCluster => write!(f, "compute-cluster"),
        }
    }
}

/// Identity and dependency edges for one remote resource.
///
/// The dependency relation across an inventory must be acyclic;
/// [`provisioning_order`] is a topological sort of it and teardown
/// order is the reverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// The resource kind.
    pub kind: ResourceKind,
    /// The resource name, unique within an inventory.
    pub name: String,
    /// Names of resources that must exist before this one.
    pub depends_on: Vec<String>,
}

impl ResourceSpec {
    /// Creates a spec with no dependencies.
    #[must_use]
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            depends_on: Vec::new(),
        }
    }

    /// Adds a dependency on another resource by name.
    #[must_use]
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }
}

/// The observed state of a remote resource.
///
/// Observed only; this crate never persists resource state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceState {
    /// The resource does not exist.
    Absent,
    /// The resource exists.
    Present,
    /// The state could not be determined.
    Unknown,
}

/// Computes the order in which an inventory must be provisioned.
///
/// Returns indices into `specs` such that every resource appears after
/// all of its dependencies. Resources with satisfied dependencies keep
/// their declaration order.
pub fn provisioning_order(specs: &[ResourceSpec]) -> Result<Vec<usize>, OrderingError> {
    let index: HashMap<&str, usize> = specs
        .iter()
        .enumerate()
        .map(|(i, spec)| (spec.name.as_str(), i))
        .collect();

    for spec in specs {
        for dep in &spec.depends_on {
            if !index.contains_key(dep.as_str()) {
                return Err(OrderingError::UnknownDependency {
                    resource: spec.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    let mut placed = vec![false; specs.len()];
    let mut order = Vec::with_capacity(specs.len());

    while order.len() < specs.len() {
        let mut progressed = false;
        for (i, spec) in specs.iter().enumerate() {
            let ready = !placed[i]
                && spec
                    .depends_on
                    .iter()
                    .all(|dep| placed[index[dep.as_str()]]);
            if ready {
                placed[i] = true;
                order.push(i);
                progressed = true;
            }
        }
        if !progressed {
            let stuck = specs
                .iter()
                .enumerate()
                .filter(|(i, _)| !placed[*i])
                .map(|(_, spec)| spec.name.clone())
                .collect();
            return Err(OrderingError::Cycle(stuck));
        }
    }

    Ok(order)
}

/// Computes the order in which an inventory must be torn down.
///
/// The reverse of [`provisioning_order`]: most-dependent resources first.
pub fn teardown_order(specs: &[ResourceSpec]) -> Result<Vec<usize>, OrderingError> {
    let mut order = provisioning_order(specs)?;
    order.reverse();
    Ok(order)
}
