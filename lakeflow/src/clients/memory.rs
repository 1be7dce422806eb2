//! In-memory client implementations.
//!
//! Faithful enough for lifecycle tests: create/delete signal
//! already-exists and not-found the way the real services do, listing
//! is paginated, and bucket deletion refuses while objects remain.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;

use super::{Catalog, ClusterApi, KeyPage, NotificationChannel, ObjectStore, Workgroups};
use crate::errors::RemoteError;

/// An in-memory [`ObjectStore`] with configurable page size.
#[derive(Debug)]
pub struct InMemoryObjectStore {
    buckets: Mutex<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
    page_size: usize,
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryObjectStore {
    /// Creates an empty store with a large default page size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(BTreeMap::new()),
            page_size: 1000,
        }
    }

    /// Sets the page size so tests can force multi-page listings.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Returns whether a bucket exists.
    #[must_use]
    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.buckets.lock().contains_key(bucket)
    }

    /// Returns the number of objects in a bucket, or zero if absent.
    #[must_use]
    pub fn object_count(&self, bucket: &str) -> usize {
        self.buckets
            .lock()
            .get(bucket)
            .map_or(0, BTreeMap::len)
    }

    /// Returns an object's body, if present.
    #[must_use]
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets
            .lock()
            .get(bucket)
            .and_then(|objects| objects.get(key).cloned())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn create_bucket(&self, bucket: &str, _region: &str) -> Result<(), RemoteError> {
        let mut buckets = self.buckets.lock();
        if buckets.contains_key(bucket) {
            return Err(RemoteError::already_exists(bucket));
        }
        buckets.insert(bucket.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), RemoteError> {
        let mut buckets = self.buckets.lock();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| RemoteError::not_found(bucket))?;
        objects.insert(key.to_string(), body);
        Ok(())
    }

    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        token: Option<&str>,
    ) -> Result<KeyPage, RemoteError> {
        let buckets = self.buckets.lock();
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| RemoteError::not_found(bucket))?;

        let keys: Vec<String> = objects
            .keys()
            .filter(|key| key.starts_with(prefix))
            .filter(|key| token.map_or(true, |after| key.as_str() > after))
            .take(self.page_size + 1)
            .cloned()
            .collect();

        let has_more = keys.len() > self.page_size;
        let mut page: Vec<String> = keys.into_iter().take(self.page_size).collect();
        let next_token = if has_more { page.last().cloned() } else { None };
        page.truncate(self.page_size);

        Ok(KeyPage {
            keys: page,
            next_token,
        })
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> Result<(), RemoteError> {
        let mut buckets = self.buckets.lock();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| RemoteError::not_found(bucket))?;
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), RemoteError> {
        let mut buckets = self.buckets.lock();
        match buckets.get(bucket) {
            None => Err(RemoteError::not_found(bucket)),
            Some(objects) if !objects.is_empty() => {
                Err(RemoteError::conflict(bucket, "bucket is not empty"))
            }
            Some(_) => {
                buckets.remove(bucket);
                Ok(())
            }
        }
    }
}

/// An in-memory [`Catalog`].
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    databases: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether a database exists.
    #[must_use]
    pub fn has_database(&self, name: &str) -> bool {
        self.databases.lock().contains_key(name)
    }

    /// Returns whether a table exists in a database.
    #[must_use]
    pub fn has_table(&self, database: &str, table: &str) -> bool {
        self.databases
            .lock()
            .get(database)
            .is_some_and(|tables| tables.contains_key(table))
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn create_database(&self, name: &str) -> Result<(), RemoteError> {
        let mut databases = self.databases.lock();
        if databases.contains_key(name) {
            return Err(RemoteError::already_exists(name));
        }
        databases.insert(name.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn create_table(
        &self,
        database: &str,
        table: &str,
        location: &str,
    ) -> Result<(), RemoteError> {
        let mut databases = self.databases.lock();
        let tables = databases
            .get_mut(database)
            .ok_or_else(|| RemoteError::not_found(database))?;
        if tables.contains_key(table) {
            return Err(RemoteError::already_exists(table));
        }
        tables.insert(table.to_string(), location.to_string());
        Ok(())
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<String>, RemoteError> {
        let databases = self.databases.lock();
        let tables = databases
            .get(database)
            .ok_or_else(|| RemoteError::not_found(database))?;
        Ok(tables.keys().cloned().collect())
    }

    async fn delete_table(&self, database: &str, table: &str) -> Result<(), RemoteError> {
        let mut databases = self.databases.lock();
        let tables = databases
            .get_mut(database)
            .ok_or_else(|| RemoteError::not_found(database))?;
        if tables.remove(table).is_none() {
            return Err(RemoteError::not_found(table));
        }
        Ok(())
    }

    async fn delete_database(&self, name: &str) -> Result<(), RemoteError> {
        let mut databases = self.databases.lock();
        if databases.remove(name).is_none() {
            return Err(RemoteError::not_found(name));
        }
        Ok(())
    }
}

/// An in-memory [`Workgroups`] service with optional failure injection.
#[derive(Debug, Default)]
pub struct InMemoryWorkgroups {
    workgroups: Mutex<BTreeMap<String, String>>,
    delete_error: Mutex<Option<RemoteError>>,
}

impl InMemoryWorkgroups {
    /// Creates an empty workgroup service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent delete fail with the given error.
    pub fn fail_deletes_with(&self, error: RemoteError) {
        *self.delete_error.lock() = Some(error);
    }

    /// Returns whether a workgroup exists.
    #[must_use]
    pub fn has_workgroup(&self, name: &str) -> bool {
        self.workgroups.lock().contains_key(name)
    }

    /// Returns a workgroup's output location, if present.
    #[must_use]
    pub fn output_location(&self, name: &str) -> Option<String> {
        self.workgroups.lock().get(name).cloned()
    }
}

#[async_trait]
impl Workgroups for InMemoryWorkgroups {
    async fn create_workgroup(
        &self,
        name: &str,
        output_location: &str,
    ) -> Result<(), RemoteError> {
        let mut workgroups = self.workgroups.lock();
        if workgroups.contains_key(name) {
            return Err(RemoteError::already_exists(name));
        }
        workgroups.insert(name.to_string(), output_location.to_string());
        Ok(())
    }

    async fn delete_workgroup(&self, name: &str, _recursive: bool) -> Result<(), RemoteError> {
        if let Some(error) = self.delete_error.lock().clone() {
            return Err(error);
        }
        let mut workgroups = self.workgroups.lock();
        if workgroups.remove(name).is_none() {
            return Err(RemoteError::not_found(name));
        }
        Ok(())
    }
}

/// An in-memory [`ClusterApi`] that can delay cluster visibility to
/// model eventual consistency after creation.
#[derive(Debug, Default)]
pub struct InMemoryClusters {
    clusters: Mutex<BTreeMap<String, String>>,
    invisible_describes: Mutex<usize>,
}

impl InMemoryClusters {
    /// Creates an empty cluster API.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` describe calls report the cluster as
    /// missing even when it exists.
    pub fn delay_visibility(&self, count: usize) {
        *self.invisible_describes.lock() = count;
    }

    /// Returns whether a cluster exists.
    #[must_use]
    pub fn has_cluster(&self, name: &str) -> bool {
        self.clusters.lock().contains_key(name)
    }
}

#[async_trait]
impl ClusterApi for InMemoryClusters {
    async fn create_cluster(&self, name: &str, region: &str) -> Result<(), RemoteError> {
        let mut clusters = self.clusters.lock();
        if clusters.contains_key(name) {
            return Err(RemoteError::already_exists(name));
        }
        clusters.insert(name.to_string(), region.to_string());
        Ok(())
    }

    async fn describe_cluster(&self, name: &str, _region: &str) -> Result<bool, RemoteError> {
        let mut pending = self.invisible_describes.lock();
        if *pending > 0 {
            *pending -= 1;
            return Ok(false);
        }
        Ok(self.clusters.lock().contains_key(name))
    }

    async fn delete_cluster(&self, name: &str, _region: &str) -> Result<(), RemoteError> {
        let mut clusters = self.clusters.lock();
        if clusters.remove(name).is_none() {
            return Err(RemoteError::not_found(name));
        }
        Ok(())
    }
}

/// A [`NotificationChannel`] that records published messages.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    published: Mutex<Vec<(String, String, String)>>,
    error: Mutex<Option<RemoteError>>,
}

impl RecordingChannel {
    /// Creates an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent publish fail with the given error.
    pub fn fail_with(&self, error: RemoteError) {
        *self.error.lock() = Some(error);
    }

    /// Returns the `(topic, subject, message)` tuples published so far.
    #[must_use]
    pub fn published(&self) -> Vec<(String, String, String)> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn publish(&self, topic: &str, subject: &str, message: &str) -> Result<(), RemoteError> {
        if let Some(error) = self.error.lock().clone() {
            return Err(error);
        }
        self.published.lock().push((
            topic.to_string(),
            subject.to_string(),
            message.to_string(),
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_bucket_signals_already_exists() {
        let store = InMemoryObjectStore::new();
        store.create_bucket("lake", "us-east-1").await.unwrap();
        let err = store.create_bucket("lake", "us-east-1").await.unwrap_err();
        assert!(err.is_already_exists());
    }

    #[tokio::test]
    async fn test_list_page_paginates() {
        let store = InMemoryObjectStore::new().with_page_size(2);
        store.create_bucket("lake", "us-east-1").await.unwrap();
        for i in 0..5 {
            store
                .put_object("lake", &format!("raw/{i}"), vec![])
                .await
                .unwrap();
        }

        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        let mut pages = 0;
        loop {
            let page = store
                .list_page("lake", "raw/", token.as_deref())
                .await
                .unwrap();
            keys.extend(page.keys);
            pages += 1;
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        assert_eq!(keys.len(), 5);
        assert_eq!(pages, 3);
    }

    #[tokio::test]
    async fn test_delete_bucket_refuses_while_nonempty() {
        let store = InMemoryObjectStore::new();
        store.create_bucket("lake", "us-east-1").await.unwrap();
        store.put_object("lake", "raw/x", vec![1]).await.unwrap();
        let err = store.delete_bucket("lake").await.unwrap_err();
        assert!(matches!(err, RemoteError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_catalog_table_lifecycle() {
        let catalog = InMemoryCatalog::new();
        catalog.create_database("lake").await.unwrap();
        catalog
            .create_table("lake", "stats", "s3://lake/raw/")
            .await
            .unwrap();
        assert_eq!(catalog.list_tables("lake").await.unwrap(), vec!["stats"]);

        catalog.delete_table("lake", "stats").await.unwrap();
        let err = catalog.delete_table("lake", "stats").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_cluster_delayed_visibility() {
        let clusters = InMemoryClusters::new();
        clusters.create_cluster("media", "us-east-1").await.unwrap();
        clusters.delay_visibility(1);

        assert!(!clusters.describe_cluster("media", "us-east-1").await.unwrap());
        assert!(clusters.describe_cluster("media", "us-east-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_recording_channel() {
        let channel = RecordingChannel::new();
        channel.publish("lake-events", "done", "ok").await.unwrap();
        assert_eq!(channel.published().len(), 1);

        channel.fail_with(RemoteError::transient("sns", "throttled"));
        assert!(channel.publish("lake-events", "done", "ok").await.is_err());
    }
}
