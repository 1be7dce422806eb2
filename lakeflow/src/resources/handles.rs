//! Per-kind resource handles with idempotent ensure semantics.
//!
//! A handle owns the create/verify/delete logic for one remote
//! resource. Idempotence is the central correctness property here:
//! both ensure operations are safe to call any number of times, and a
//! resource found already in the target state is a success.

use async_trait::async_trait;
use std::sync::Arc;

use super::{ResourceSpec, ResourceState};
use crate::clients::{Catalog, ClusterApi, ObjectStore, Workgroups};
use crate::errors::{ProvisionError, RemoteError, TeardownError};

/// What an ensure operation observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// The operation changed remote state.
    Applied,
    /// The resource was already in the target state.
    AlreadySatisfied,
}

/// Idempotent lifecycle operations for one remote resource.
#[async_trait]
pub trait ResourceHandle: Send + Sync {
    /// The declarative identity of this resource.
    fn spec(&self) -> &ResourceSpec;

    /// Observes the current remote state, where the service allows it.
    async fn probe(&self) -> ResourceState {
        ResourceState::Unknown
    }

    /// Creates the resource if it does not exist.
    async fn ensure_exists(&self) -> Result<EnsureOutcome, ProvisionError>;

    /// Deletes the resource if it exists, emptying container resources
    /// first.
    async fn ensure_absent(&self) -> Result<EnsureOutcome, TeardownError>;
}

fn normalize_create(
    spec: &ResourceSpec,
    result: Result<(), RemoteError>,
) -> Result<EnsureOutcome, ProvisionError> {
    match result {
        Ok(()) => {
            tracing::info!(kind = %spec.kind, resource = %spec.name, "resource created");
            Ok(EnsureOutcome::Applied)
        }
        Err(err) if err.is_already_exists() => {
            tracing::debug!(kind = %spec.kind, resource = %spec.name, "resource already exists");
            Ok(EnsureOutcome::AlreadySatisfied)
        }
        Err(err) => Err(ProvisionError::new(spec.kind, &spec.name, err)),
    }
}

fn normalize_delete(
    spec: &ResourceSpec,
    result: Result<(), RemoteError>,
) -> Result<EnsureOutcome, TeardownError> {
    match result {
        Ok(()) => {
            tracing::info!(kind = %spec.kind, resource = %spec.name, "resource deleted");
            Ok(EnsureOutcome::Applied)
        }
        Err(err) if err.is_not_found() => {
            tracing::debug!(kind = %spec.kind, resource = %spec.name, "resource already absent");
            Ok(EnsureOutcome::AlreadySatisfied)
        }
        Err(err) => Err(TeardownError::new(spec.kind, &spec.name, err)),
    }
}

/// Deletes every object under a prefix, exhausting all list pages.
///
/// A missing bucket is treated as an already-empty prefix.
async fn purge_prefix(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
) -> Result<(), RemoteError> {
    let mut token: Option<String> = None;
    loop {
        let page = match store.list_page(bucket, prefix, token.as_deref()).await {
            Ok(page) => page,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };
        if !page.keys.is_empty() {
            tracing::debug!(bucket, prefix, count = page.keys.len(), "deleting object batch");
            store.delete_objects(bucket, &page.keys).await?;
        }
        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }
    Ok(())
}

/// Handle for an object-store bucket.
pub struct BucketHandle {
    spec: ResourceSpec,
    store: Arc<dyn ObjectStore>,
    region: String,
}

impl BucketHandle {
    /// Creates a bucket handle.
    #[must_use]
    pub fn new(spec: ResourceSpec, store: Arc<dyn ObjectStore>, region: impl Into<String>) -> Self {
        Self {
            spec,
            store,
            region: region.into(),
        }
    }
}

#[async_trait]
impl ResourceHandle for BucketHandle {
    fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    async fn probe(&self) -> ResourceState {
        match self.store.list_page(&self.spec.name, "", None).await {
            Ok(_) => ResourceState::Present,
            Err(err) if err.is_not_found() => ResourceState::Absent,
            Err(_) => ResourceState::Unknown,
        }
    }

    async fn ensure_exists(&self) -> Result<EnsureOutcome, ProvisionError> {
        let result = self.store.create_bucket(&self.spec.name, &self.region).await;
        normalize_create(&self.spec, result)
    }

    async fn ensure_absent(&self) -> Result<EnsureOutcome, TeardownError> {
        purge_prefix(self.store.as_ref(), &self.spec.name, "")
            .await
            .map_err(|err| TeardownError::new(self.spec.kind, &self.spec.name, err))?;
        let result = self.store.delete_bucket(&self.spec.name).await;
        normalize_delete(&self.spec, result)
    }
}

/// Handle for a catalog database.
pub struct DatabaseHandle {
    spec: ResourceSpec,
    catalog: Arc<dyn Catalog>,
}

impl DatabaseHandle {
    /// Creates a database handle.
    #[must_use]
    pub fn new(spec: ResourceSpec, catalog: Arc<dyn Catalog>) -> Self {
        Self { spec, catalog }
    }
}

#[async_trait]
impl ResourceHandle for DatabaseHandle {
    fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    async fn probe(&self) -> ResourceState {
        match self.catalog.list_tables(&self.spec.name).await {
            Ok(_) => ResourceState::Present,
            Err(err) if err.is_not_found() => ResourceState::Absent,
            Err(_) => ResourceState::Unknown,
        }
    }

    async fn ensure_exists(&self) -> Result<EnsureOutcome, ProvisionError> {
        let result = self.catalog.create_database(&self.spec.name).await;
        normalize_create(&self.spec, result)
    }

    async fn ensure_absent(&self) -> Result<EnsureOutcome, TeardownError> {
        // Tables first, then the database that contains them.
        let tables = match self.catalog.list_tables(&self.spec.name).await {
            Ok(tables) => tables,
            Err(err) if err.is_not_found() => {
                return Ok(EnsureOutcome::AlreadySatisfied);
            }
            Err(err) => return Err(TeardownError::new(self.spec.kind, &self.spec.name, err)),
        };
        for table in tables {
            match self.catalog.delete_table(&self.spec.name, &table).await {
                Ok(()) | Err(RemoteError::NotFound { .. }) => {}
                Err(err) => {
                    return Err(TeardownError::new(self.spec.kind, &self.spec.name, err));
                }
            }
        }
        let result = self.catalog.delete_database(&self.spec.name).await;
        normalize_delete(&self.spec, result)
    }
}

/// Handle for a table inside a catalog database.
pub struct TableHandle {
    spec: ResourceSpec,
    catalog: Arc<dyn Catalog>,
    database: String,
    location: String,
}

impl TableHandle {
    /// Creates a table handle pointing at a storage location.
    #[must_use]
    pub fn new(
        spec: ResourceSpec,
        catalog: Arc<dyn Catalog>,
        database: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            spec,
            catalog,
            database: database.into(),
            location: location.into(),
        }
    }
}

#[async_trait]
impl ResourceHandle for TableHandle {
    fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    async fn probe(&self) -> ResourceState {
        match self.catalog.list_tables(&self.database).await {
            Ok(tables) if tables.contains(&self.spec.name) => ResourceState::Present,
            Ok(_) | Err(RemoteError::NotFound { .. }) => ResourceState::Absent,
            Err(_) => ResourceState::Unknown,
        }
    }

    async fn ensure_exists(&self) -> Result<EnsureOutcome, ProvisionError> {
        let result = self
            .catalog
            .create_table(&self.database, &self.spec.name, &self.location)
            .await;
        normalize_create(&self.spec, result)
    }

    async fn ensure_absent(&self) -> Result<EnsureOutcome, TeardownError> {
        let result = self.catalog.delete_table(&self.database, &self.spec.name).await;
        normalize_delete(&self.spec, result)
    }
}

/// Handle for a query-execution workgroup.
///
/// Teardown sweeps the workgroup's query-results prefix in the bucket
/// before deleting the workgroup itself.
pub struct WorkgroupHandle {
    spec: ResourceSpec,
    workgroups: Arc<dyn Workgroups>,
    store: Arc<dyn ObjectStore>,
    bucket: String,
    results_prefix: String,
    output_location: String,
}

impl WorkgroupHandle {
    /// Creates a workgroup handle.
    #[must_use]
    pub fn new(
        spec: ResourceSpec,
        workgroups: Arc<dyn Workgroups>,
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        results_prefix: impl Into<String>,
        output_location: impl Into<String>,
    ) -> Self {
        Self {
            spec,
            workgroups,
            store,
            bucket: bucket.into(),
            results_prefix: results_prefix.into(),
            output_location: output_location.into(),
        }
    }
}

#[async_trait]
impl ResourceHandle for WorkgroupHandle {
    fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    async fn ensure_exists(&self) -> Result<EnsureOutcome, ProvisionError> {
        let result = self
            .workgroups
            .create_workgroup(&self.spec.name, &self.output_location)
            .await;
        normalize_create(&self.spec, result)
    }

    async fn ensure_absent(&self) -> Result<EnsureOutcome, TeardownError> {
        purge_prefix(self.store.as_ref(), &self.bucket, &self.results_prefix)
            .await
            .map_err(|err| TeardownError::new(self.spec.kind, &self.spec.name, err))?;
        let result = self.workgroups.delete_workgroup(&self.spec.name, true).await;
        normalize_delete(&self.spec, result)
    }
}

/// Handle for a compute cluster.
///
/// Creation is verified by a describe read-back; a cluster that is not
/// yet visible is reported as a transient provisioning failure so the
/// stage layer can retry it.
pub struct ClusterHandle {
    spec: ResourceSpec,
    api: Arc<dyn ClusterApi>,
    region: String,
}

impl ClusterHandle {
    /// Creates a cluster handle.
    #[must_use]
    pub fn new(spec: ResourceSpec, api: Arc<dyn ClusterApi>, region: impl Into<String>) -> Self {
        Self {
            spec,
            api,
            region: region.into(),
        }
    }
}

#[async_trait]
impl ResourceHandle for ClusterHandle {
    fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    async fn probe(&self) -> ResourceState {
        match self.api.describe_cluster(&self.spec.name, &self.region).await {
            Ok(true) => ResourceState::Present,
            Ok(false) => ResourceState::Absent,
            Err(_) => ResourceState::Unknown,
        }
    }

    async fn ensure_exists(&self) -> Result<EnsureOutcome, ProvisionError> {
        let result = self.api.create_cluster(&self.spec.name, &self.region).await;
        let outcome = normalize_create(&self.spec, result)?;

        let visible = self
            .api
            .describe_cluster(&self.spec.name, &self.region)
            .await
            .map_err(|err| ProvisionError::new(self.spec.kind, &self.spec.name, err))?;
        if !visible {
            return Err(ProvisionError::new(
                self.spec.kind,
                &self.spec.name,
                RemoteError::transient("cluster", "cluster not visible after create"),
            ));
        }
        Ok(outcome)
    }

    async fn ensure_absent(&self) -> Result<EnsureOutcome, TeardownError> {
        let result = self.api.delete_cluster(&self.spec.name, &self.region).await;
        normalize_delete(&self.spec, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{InMemoryCatalog, InMemoryClusters, InMemoryObjectStore};
    use crate::resources::ResourceKind;
    use pretty_assertions::assert_eq;

    fn bucket_handle(store: &Arc<InMemoryObjectStore>) -> BucketHandle {
        let spec = ResourceSpec::new(ResourceKind::StorageBucket, "lake-bucket");
        BucketHandle::new(spec, Arc::clone(store) as Arc<dyn ObjectStore>, "us-east-1")
    }

    #[tokio::test]
    async fn test_ensure_exists_is_idempotent() {
        let store = Arc::new(InMemoryObjectStore::new());
        let handle = bucket_handle(&store);

        assert_eq!(handle.ensure_exists().await.unwrap(), EnsureOutcome::Applied);
        assert_eq!(
            handle.ensure_exists().await.unwrap(),
            EnsureOutcome::AlreadySatisfied
        );
        assert!(store.has_bucket("lake-bucket"));
    }

    #[tokio::test]
    async fn test_ensure_absent_is_idempotent() {
        let store = Arc::new(InMemoryObjectStore::new());
        let handle = bucket_handle(&store);

        assert_eq!(
            handle.ensure_absent().await.unwrap(),
            EnsureOutcome::AlreadySatisfied
        );

        handle.ensure_exists().await.unwrap();
        assert_eq!(handle.ensure_absent().await.unwrap(), EnsureOutcome::Applied);
        assert_eq!(
            handle.ensure_absent().await.unwrap(),
            EnsureOutcome::AlreadySatisfied
        );
    }

    #[tokio::test]
    async fn test_bucket_teardown_purges_every_page() {
        let store = Arc::new(InMemoryObjectStore::new().with_page_size(2));
        let handle = bucket_handle(&store);
        handle.ensure_exists().await.unwrap();
        for i in 0..5 {
            store
                .put_object("lake-bucket", &format!("raw-data/{i}.jsonl"), vec![1])
                .await
                .unwrap();
        }

        assert_eq!(handle.ensure_absent().await.unwrap(), EnsureOutcome::Applied);
        assert!(!store.has_bucket("lake-bucket"));
    }

    #[tokio::test]
    async fn test_database_teardown_deletes_tables_first() {
        let catalog = Arc::new(InMemoryCatalog::new());
        catalog.create_database("lake").await.unwrap();
        catalog
            .create_table("lake", "stats", "s3://lake/raw-data/")
            .await
            .unwrap();

        let spec = ResourceSpec::new(ResourceKind::CatalogDatabase, "lake");
        let handle = DatabaseHandle::new(spec, Arc::clone(&catalog) as Arc<dyn Catalog>);

        assert_eq!(handle.ensure_absent().await.unwrap(), EnsureOutcome::Applied);
        assert!(!catalog.has_database("lake"));
    }

    #[tokio::test]
    async fn test_table_requires_database() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let spec = ResourceSpec::new(ResourceKind::CatalogTable, "stats").depends_on("lake");
        let handle = TableHandle::new(
            spec,
            Arc::clone(&catalog) as Arc<dyn Catalog>,
            "lake",
            "s3://lake/raw-data/",
        );

        let err = handle.ensure_exists().await.unwrap_err();
        assert!(err.source.is_not_found());
    }

    #[tokio::test]
    async fn test_cluster_create_verifies_by_describe() {
        let clusters = Arc::new(InMemoryClusters::new());
        clusters.delay_visibility(1);

        let spec = ResourceSpec::new(ResourceKind::ComputeCluster, "media");
        let handle = ClusterHandle::new(
            spec,
            Arc::clone(&clusters) as Arc<dyn ClusterApi>,
            "us-east-1",
        );

        // First attempt creates but fails the read-back.
        let err = handle.ensure_exists().await.unwrap_err();
        assert!(err.source.is_transient());

        // Second attempt finds the cluster visible.
        assert_eq!(
            handle.ensure_exists().await.unwrap(),
            EnsureOutcome::AlreadySatisfied
        );
        assert_eq!(handle.probe().await, ResourceState::Present);
    }
}
