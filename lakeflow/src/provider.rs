//! The upstream data provider: structured records over HTTP.
//!
//! Record schemas are opaque to this crate; payloads pass through as
//! JSON values. Validation here is structural only: the payload must
//! be a list. An invalid payload is a [`DataError`], never retried,
//! because retrying will not fix a structurally bad response.

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::DataError;

/// Header the upstream API reads the subscription key from.
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Source of domain records for ingestion.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetches the current batch of records.
    ///
    /// An empty batch is a valid result; the ingestion stage treats it
    /// as "nothing to do" rather than a failure.
    async fn fetch_records(&self) -> Result<Vec<Value>, DataError>;
}

/// Fetches records from an HTTP endpoint returning a JSON list.
pub struct HttpDataProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpDataProvider {
    /// Creates a provider for the given endpoint.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
        }
    }

    /// Sets the subscription key sent with each request.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

#[async_trait]
impl DataProvider for HttpDataProvider {
    async fn fetch_records(&self) -> Result<Vec<Value>, DataError> {
        let mut request = self.client.get(&self.endpoint);
        if let Some(key) = &self.api_key {
            request = request.header(SUBSCRIPTION_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| DataError::Request(err.to_string()))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|err| DataError::Decode(err.to_string()))?;

        match payload {
            Value::Array(records) => {
                tracing::debug!(endpoint = %self.endpoint, records = records.len(), "fetched records");
                Ok(records)
            }
            _ => Err(DataError::NotAList),
        }
    }
}

/// A provider with a preset result, for tests and offline runs.
pub struct FixedDataProvider {
    result: Result<Vec<Value>, DataError>,
}

impl FixedDataProvider {
    /// Creates a provider that always yields the given records.
    #[must_use]
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            result: Ok(records),
        }
    }

    /// Creates a provider that always fails.
    #[must_use]
    pub fn failing(error: DataError) -> Self {
        Self { result: Err(error) }
    }
}

#[async_trait]
impl DataProvider for FixedDataProvider {
    async fn fetch_records(&self) -> Result<Vec<Value>, DataError> {
        self.result.clone()
    }
}
