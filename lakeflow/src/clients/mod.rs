//! Client traits for the external services the orchestrator acts on.
//!
//! These traits are the seam between lifecycle logic and the actual
//! cloud SDKs: the object store, the metadata catalog, the
//! query-execution workgroup service, the compute cluster API, and the
//! notification channel. In-memory implementations back the tests.
//!
//! Create and delete calls signal "already exists" / "not found" as
//! distinct [`RemoteError`] variants; the resource handles normalize
//! those signals to success.

mod memory;

pub use memory::{
    InMemoryCatalog, InMemoryClusters, InMemoryObjectStore, InMemoryWorkgroups, RecordingChannel,
};

use async_trait::async_trait;

use crate::errors::RemoteError;

/// One page of object keys from a list operation.
///
/// Callers must keep requesting pages until `next_token` is `None`;
/// acting on the first page only silently misses objects.
#[derive(Debug, Clone, Default)]
pub struct KeyPage {
    /// The keys on this page.
    pub keys: Vec<String>,
    /// Opaque continuation token for the next page, if any.
    pub next_token: Option<String>,
}

/// Key/value blob storage with bucket lifecycle operations.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Creates a bucket in the given region.
    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<(), RemoteError>;

    /// Writes an object.
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), RemoteError>;

    /// Lists one page of keys under a prefix.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        token: Option<&str>,
    ) -> Result<KeyPage, RemoteError>;

    /// Deletes a batch of objects.
    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), RemoteError>;

    /// Deletes a bucket. Fails with a conflict if the bucket still
    /// holds objects.
    async fn delete_bucket(&self, bucket: &str) -> Result<(), RemoteError>;
}

/// A metadata catalog: a namespace of databases holding tables.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Creates a database.
    async fn create_database(&self, name: &str) -> Result<(), RemoteError>;

    /// Creates a table pointing at a storage location.
    async fn create_table(
        &self,
        database: &str,
        table: &str,
        location: &str,
    ) -> Result<(), RemoteError>;

    /// Lists the table names in a database.
    async fn list_tables(&self, database: &str) -> Result<Vec<String>, RemoteError>;

    /// Deletes a table.
    async fn delete_table(&self, database: &str, table: &str) -> Result<(), RemoteError>;

    /// Deletes a database. The caller is expected to delete its tables
    /// first.
    async fn delete_database(&self, name: &str) -> Result<(), RemoteError>;
}

/// A query-execution workgroup service.
#[async_trait]
pub trait Workgroups: Send + Sync {
    /// Creates a workgroup writing results to `output_location`.
    async fn create_workgroup(&self, name: &str, output_location: &str)
        -> Result<(), RemoteError>;

    /// Deletes a workgroup, recursively removing its state when asked.
    async fn delete_workgroup(&self, name: &str, recursive: bool) -> Result<(), RemoteError>;
}

/// A compute cluster control plane.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Creates a cluster in the given region.
    async fn create_cluster(&self, name: &str, region: &str) -> Result<(), RemoteError>;

    /// Returns whether the cluster is visible via a describe call.
    async fn describe_cluster(&self, name: &str, region: &str) -> Result<bool, RemoteError>;

    /// Deletes a cluster.
    async fn delete_cluster(&self, name: &str, region: &str) -> Result<(), RemoteError>;
}

/// A topic-based notification channel.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Publishes a message to a topic.
    async fn publish(&self, topic: &str, subject: &str, message: &str) -> Result<(), RemoteError>;
}
