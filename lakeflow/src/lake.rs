//! Data lake assembly: the provisioning pipeline, ingestion, and the
//! teardown inventory over one shared set of resource specs.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::clients::{Catalog, ObjectStore, Workgroups};
use crate::config::LakeConfig;
use crate::errors::{OrderingError, StageError};
use crate::notify::Notifier;
use crate::pipeline::{
    Pipeline, PipelineAborted, PipelineRun, RetryPolicy, Stage, StageAdvance,
};
use crate::provider::DataProvider;
use crate::resources::{
    BucketHandle, DatabaseHandle, ResourceHandle, ResourceKind, ResourceSpec, TableHandle,
    WorkgroupHandle,
};
use crate::teardown::{Teardown, TeardownSummary};

/// A stage that ensures one remote resource exists.
pub struct EnsureStage {
    name: String,
    handle: Arc<dyn ResourceHandle>,
    policy: RetryPolicy,
    post_delay: Duration,
}

impl EnsureStage {
    /// Wraps a resource handle as a pipeline stage.
    #[must_use]
    pub fn new(handle: Arc<dyn ResourceHandle>, policy: RetryPolicy) -> Self {
        Self {
            name: format!("create-{}", handle.spec().name),
            handle,
            policy,
            post_delay: Duration::ZERO,
        }
    }

    /// Sets the stabilization wait after success.
    #[must_use]
    pub fn with_post_delay(mut self, delay: Duration) -> Self {
        self.post_delay = delay;
        self
    }
}

#[async_trait]
impl Stage for EnsureStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    fn post_delay(&self) -> Duration {
        self.post_delay
    }

    async fn run(&self) -> Result<StageAdvance, StageError> {
        self.handle.ensure_exists().await?;
        Ok(StageAdvance::Continue)
    }
}

/// The ingestion stage: fetch records, validate, upload as
/// line-delimited JSON under a time-keyed object name.
///
/// An empty batch short-circuits the rest of the pipeline: the
/// data-dependent stages (catalog table, workgroup) are skipped and
/// the run still completes. That is a boundary case, not a failure.
pub struct IngestStage {
    provider: Arc<dyn DataProvider>,
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: String,
    policy: RetryPolicy,
    ingested: AtomicUsize,
}

impl IngestStage {
    /// Creates the ingestion stage.
    #[must_use]
    pub fn new(
        provider: Arc<dyn DataProvider>,
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        prefix: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            provider,
            store,
            bucket: bucket.into(),
            prefix: prefix.into(),
            policy,
            ingested: AtomicUsize::new(0),
        }
    }

    /// Records uploaded by the most recent run.
    #[must_use]
    pub fn records_ingested(&self) -> usize {
        self.ingested.load(Ordering::SeqCst)
    }

    fn encode(records: &[Value]) -> Result<Vec<u8>, StageError> {
        let mut lines = Vec::with_capacity(records.len());
        for record in records {
            lines.push(serde_json::to_string(record).map_err(StageError::fatal)?);
        }
        Ok(lines.join("\n").into_bytes())
    }
}

#[async_trait]
impl Stage for IngestStage {
    fn name(&self) -> &str {
        "ingest-records"
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn run(&self) -> Result<StageAdvance, StageError> {
        let records = self.provider.fetch_records().await?;
        if records.is_empty() {
            tracing::info!("no records to ingest; skipping data-dependent stages");
            self.ingested.store(0, Ordering::SeqCst);
            return Ok(StageAdvance::SkipRemaining);
        }

        let body = Self::encode(&records)?;
        let key = format!("{}records_{}.jsonl", self.prefix, Utc::now().timestamp());
        self.store
            .put_object(&self.bucket, &key, body)
            .await
            .map_err(|err| {
                if err.is_transient() {
                    StageError::retryable(&err)
                } else {
                    StageError::fatal(&err)
                }
            })?;

        self.ingested.store(records.len(), Ordering::SeqCst);
        tracing::info!(bucket = %self.bucket, key, records = records.len(), "records uploaded");
        Ok(StageAdvance::Continue)
    }
}

/// Report from one provisioning run.
#[derive(Debug, Clone, Serialize)]
pub struct LakeReport {
    /// The underlying pipeline run.
    pub run: PipelineRun,
    /// How many records were ingested.
    pub records_ingested: usize,
    /// The bucket the lake lives in.
    pub bucket: String,
}

/// The data lake: one resource inventory shared by the provisioning
/// pipeline and the teardown sweep.
pub struct DataLake {
    config: LakeConfig,
    store: Arc<dyn ObjectStore>,
    catalog: Arc<dyn Catalog>,
    workgroups: Arc<dyn Workgroups>,
    provider: Arc<dyn DataProvider>,
    notifier: Option<Notifier>,
}

impl DataLake {
    /// Wires the lake against its remote collaborators.
    #[must_use]
    pub fn new(
        config: LakeConfig,
        store: Arc<dyn ObjectStore>,
        catalog: Arc<dyn Catalog>,
        workgroups: Arc<dyn Workgroups>,
        provider: Arc<dyn DataProvider>,
    ) -> Self {
        Self {
            config,
            store,
            catalog,
            workgroups,
            provider,
            notifier: None,
        }
    }

    /// Announces run outcomes through the given notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// The declarative resource inventory.
    ///
    /// Shared, read-only input to both provisioning and teardown; the
    /// dependency edges are what give teardown its reverse order.
    #[must_use]
    pub fn resource_specs(&self) -> Vec<ResourceSpec> {
        self.handles()
            .iter()
            .map(|handle| handle.spec().clone())
            .collect()
    }

    fn handles(&self) -> Vec<Arc<dyn ResourceHandle>> {
        let config = &self.config;
        vec![
            Arc::new(BucketHandle::new(
                ResourceSpec::new(ResourceKind::StorageBucket, &config.bucket),
                Arc::clone(&self.store),
                &config.region,
            )) as Arc<dyn ResourceHandle>,
            Arc::new(DatabaseHandle::new(
                ResourceSpec::new(ResourceKind::CatalogDatabase, &config.database),
                Arc::clone(&self.catalog),
            )),
            Arc::new(TableHandle::new(
                ResourceSpec::new(ResourceKind::CatalogTable, &config.table)
                    .depends_on(&config.database)
                    .depends_on(&config.bucket),
                Arc::clone(&self.catalog),
                &config.database,
                config.raw_data_location(),
            )),
            Arc::new(WorkgroupHandle::new(
                ResourceSpec::new(ResourceKind::QueryWorkgroup, &config.workgroup)
                    .depends_on(&config.bucket),
                Arc::clone(&self.workgroups),
                Arc::clone(&self.store),
                &config.bucket,
                &config.results_prefix,
                config.output_location(),
            )),
        ]
    }

    /// Provisions the lake and ingests the current batch of records.
    ///
    /// Stage order: bucket, database, ingest, table, workgroup. The
    /// bucket stage carries the stabilization wait so the freshly
    /// created bucket is queryable before anything writes to it.
    pub async fn provision(&self) -> Result<LakeReport, PipelineAborted> {
        let config = &self.config;
        let handles = self.handles();
        let ingest = Arc::new(IngestStage::new(
            Arc::clone(&self.provider),
            Arc::clone(&self.store),
            &config.bucket,
            &config.raw_prefix,
            config.retry,
        ));

        let mut pipeline = Pipeline::new("datalake-provision");
        for (index, handle) in handles.into_iter().enumerate() {
            let mut stage = EnsureStage::new(handle, config.retry);
            if index == 0 {
                stage = stage.with_post_delay(config.stabilization_wait);
            }
            pipeline = pipeline.with_stage(Arc::new(stage));
            if index == 1 {
                // Records must land before the table and workgroup
                // that expose them are configured.
                pipeline = pipeline.with_stage(Arc::clone(&ingest) as Arc<dyn Stage>);
            }
        }

        let result = pipeline.run().await;
        match result {
            Ok(run) => {
                let report = LakeReport {
                    records_ingested: ingest.records_ingested(),
                    bucket: config.bucket.clone(),
                    run,
                };
                self.announce(
                    "Data lake provisioning",
                    &format!(
                        "status: {}\nbucket: {}\nrecords ingested: {}",
                        report.run.status, report.bucket, report.records_ingested
                    ),
                )
                .await;
                Ok(report)
            }
            Err(aborted) => {
                self.announce(
                    "Data lake provisioning",
                    &format!("status: {}\nfailure: {}", aborted.run.status, aborted.failure),
                )
                .await;
                Err(aborted)
            }
        }
    }

    /// Tears the lake down, best-effort, most-dependent resources
    /// first.
    pub async fn teardown(&self) -> Result<TeardownSummary, OrderingError> {
        let teardown = Teardown::new(self.handles())?;
        let summary = teardown.run().await;
        self.announce(
            "Data lake teardown",
            &format!(
                "removed: {}\nalready absent: {}\nfailed: {}",
                summary.removed, summary.already_absent, summary.failed
            ),
        )
        .await;
        Ok(summary)
    }

    async fn announce(&self, subject: &str, message: &str) {
        if let Some(notifier) = &self.notifier {
            notifier.publish(subject, message).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{
        InMemoryCatalog, InMemoryObjectStore, InMemoryWorkgroups, NotificationChannel,
        RecordingChannel,
    };
    use crate::errors::DataError;
    use crate::pipeline::{RunStatus, StageOutcome};
    use crate::provider::FixedDataProvider;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Fixture {
        store: Arc<InMemoryObjectStore>,
        catalog: Arc<InMemoryCatalog>,
        workgroups: Arc<InMemoryWorkgroups>,
        channel: Arc<RecordingChannel>,
        lake: DataLake,
    }

    fn fixture(provider: FixedDataProvider) -> Fixture {
        let config = LakeConfig::new()
            .with_bucket("lake-bucket")
            .with_database("lake-db")
            .with_table("stats")
            .with_workgroup("analytics")
            .with_retry(RetryPolicy::new(1, Duration::ZERO))
            .with_stabilization_wait(Duration::ZERO);

        let store = Arc::new(InMemoryObjectStore::new());
        let catalog = Arc::new(InMemoryCatalog::new());
        let workgroups = Arc::new(InMemoryWorkgroups::new());
        let channel = Arc::new(RecordingChannel::new());

        let lake = DataLake::new(
            config,
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            Arc::clone(&catalog) as Arc<dyn Catalog>,
            Arc::clone(&workgroups) as Arc<dyn Workgroups>,
            Arc::new(provider) as Arc<dyn DataProvider>,
        )
        .with_notifier(Notifier::new(
            Arc::clone(&channel) as Arc<dyn NotificationChannel>,
            "lake-events",
        ));

        Fixture {
            store,
            catalog,
            workgroups,
            channel,
            lake,
        }
    }

    fn sample_records() -> Vec<Value> {
        vec![
            json!({"PlayerID": 1, "Points": 30}),
            json!({"PlayerID": 2, "Points": 12}),
        ]
    }

    #[tokio::test]
    async fn test_provision_creates_everything_and_ingests() {
        let fx = fixture(FixedDataProvider::new(sample_records()));
        let report = fx.lake.provision().await.unwrap();

        assert_eq!(report.run.status, RunStatus::Completed);
        assert_eq!(report.records_ingested, 2);
        assert!(fx.store.has_bucket("lake-bucket"));
        assert!(fx.catalog.has_database("lake-db"));
        assert!(fx.catalog.has_table("lake-db", "stats"));
        assert_eq!(
            fx.workgroups.output_location("analytics").as_deref(),
            Some("s3://lake-bucket/athena-query-results/")
        );

        // One line-delimited JSON object per record.
        assert_eq!(fx.store.object_count("lake-bucket"), 1);
        let page = fx
            .store
            .list_page("lake-bucket", "raw-data/", None)
            .await
            .unwrap();
        let body = fx.store.object("lake-bucket", &page.keys[0]).unwrap();
        let text = String::from_utf8(body).unwrap();
        assert_eq!(text.lines().count(), 2);

        // Completion was announced.
        assert_eq!(fx.channel.published().len(), 1);
    }

    #[tokio::test]
    async fn test_provision_is_idempotent() {
        let fx = fixture(FixedDataProvider::new(sample_records()));
        fx.lake.provision().await.unwrap();
        let report = fx.lake.provision().await.unwrap();

        assert_eq!(report.run.status, RunStatus::Completed);
        // Two ingest runs, one table, one workgroup.
        assert_eq!(fx.store.object_count("lake-bucket"), 2);
        assert!(fx.catalog.has_table("lake-db", "stats"));
    }

    #[tokio::test]
    async fn test_empty_batch_short_circuits_dependent_stages() {
        let fx = fixture(FixedDataProvider::new(Vec::new()));
        let report = fx.lake.provision().await.unwrap();

        assert_eq!(report.run.status, RunStatus::Completed);
        assert_eq!(report.records_ingested, 0);
        assert_eq!(
            report.run.outcome_of("create-stats"),
            Some(&StageOutcome::Skipped)
        );
        assert_eq!(
            report.run.outcome_of("create-analytics"),
            Some(&StageOutcome::Skipped)
        );
        assert!(!fx.catalog.has_table("lake-db", "stats"));
        assert!(!fx.workgroups.has_workgroup("analytics"));
        assert_eq!(fx.store.object_count("lake-bucket"), 0);
    }

    #[tokio::test]
    async fn test_invalid_payload_aborts_without_retry() {
        let fx = fixture(FixedDataProvider::failing(DataError::NotAList));
        let aborted = fx.lake.provision().await.unwrap_err();

        assert_eq!(aborted.failure.stage, "ingest-records");
        assert_eq!(aborted.failure.attempts, 1);
        assert_eq!(aborted.run.status, RunStatus::Aborted);
        assert!(!fx.catalog.has_table("lake-db", "stats"));
    }

    #[tokio::test]
    async fn test_teardown_after_provision_is_clean() {
        let fx = fixture(FixedDataProvider::new(sample_records()));
        fx.lake.provision().await.unwrap();

        let summary = fx.lake.teardown().await.unwrap();
        assert!(summary.is_clean());
        assert_eq!(summary.removed, 4);
        assert!(!fx.store.has_bucket("lake-bucket"));
        assert!(!fx.catalog.has_database("lake-db"));
        assert!(!fx.workgroups.has_workgroup("analytics"));
    }

    #[tokio::test]
    async fn test_teardown_on_empty_account_is_clean() {
        let fx = fixture(FixedDataProvider::new(Vec::new()));
        let summary = fx.lake.teardown().await.unwrap();
        assert!(summary.is_clean());
        assert_eq!(summary.already_absent, 4);
    }

    #[tokio::test]
    async fn test_teardown_sweeps_dependents_first() {
        let fx = fixture(FixedDataProvider::new(sample_records()));
        let teardown = Teardown::new(fx.lake.handles()).unwrap();
        let order = teardown.sweep_order();

        let pos = |name: &str| order.iter().position(|n| *n == name).unwrap();
        assert!(pos("stats") < pos("lake-db"));
        assert!(pos("stats") < pos("lake-bucket"));
        assert!(pos("analytics") < pos("lake-bucket"));
    }
}
