//! Remote resource identities, ordering, and lifecycle handles.
//!
//! A [`ResourceSpec`] names one remote resource and its dependencies;
//! [`provisioning_order`] and [`teardown_order`] derive the two
//! traversal orders from the dependency relation. A [`ResourceHandle`]
//! carries the idempotent create/verify/delete operations for one
//! resource kind.

mod handles;
mod spec;

pub use handles::{
    BucketHandle, ClusterHandle, DatabaseHandle, EnsureOutcome, ResourceHandle, TableHandle,
    WorkgroupHandle,
};
pub use spec::{provisioning_order, teardown_order, ResourceKind, ResourceSpec, ResourceState};
