//! Key-value store abstraction
//!
//! This module defines the trait that store adapters must implement to hold
//! refresh records, token budgets, schedule entries and export jobs. Records
//! are JSON documents; writers that share a record touch disjoint fields via
//! [`FieldUpdate`] instead of replacing the whole document.

use crate::adapters::database::update::FieldUpdate;
use crate::domain::ids::{ExecutionId, PlatformId, ReportId};
use crate::domain::{ReportFlowError, Result, StoreError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Record collections held in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    /// Per-tenant [`RefreshRecord`](crate::core::refresh::RefreshRecord)
    Refresh,
    /// Per-tenant [`RefreshTokenBudget`](crate::core::refresh::RefreshTokenBudget)
    TokenBudget,
    /// Per-report [`ScheduleEntry`](crate::core::schedule::ScheduleEntry)
    Schedule,
    /// Per-execution [`ExtractionJob`](crate::core::export::ExtractionJob)
    ExtractionJob,
}

impl Collection {
    /// Stable name used as table discriminator and in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Refresh => "refresh",
            Collection::TokenBudget => "token_budget",
            Collection::Schedule => "schedule",
            Collection::ExtractionJob => "extraction_job",
        }
    }

    /// Parses a collection name as produced by [`Collection::as_str`]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "refresh" => Some(Collection::Refresh),
            "token_budget" => Some(Collection::TokenBudget),
            "schedule" => Some(Collection::Schedule),
            "extraction_job" => Some(Collection::ExtractionJob),
            _ => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully-qualified key of one stored record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// Collection the record belongs to
    pub collection: Collection,
    /// Identifier within the collection
    pub id: String,
}

impl RecordKey {
    /// Creates a key from its parts
    pub fn new(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
        }
    }

    /// Key of a tenant's refresh record
    pub fn refresh(platform: &PlatformId) -> Self {
        Self::new(Collection::Refresh, platform.as_str())
    }

    /// Key of a tenant's refresh token budget
    pub fn token_budget(platform: &PlatformId) -> Self {
        Self::new(Collection::TokenBudget, platform.as_str())
    }

    /// Key of a report's schedule entry
    pub fn schedule(report_id: &ReportId) -> Self {
        Self::new(Collection::Schedule, report_id.as_str())
    }

    /// Key of one export execution, `{report_id}#{execution_id}`
    pub fn extraction_job(report_id: &ReportId, execution_id: &ExecutionId) -> Self {
        Self::new(
            Collection::ExtractionJob,
            format!("{}#{}", report_id.as_str(), execution_id.as_str()),
        )
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// Result of a conditional partial update
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// Conditions held and the update was written; carries the new document
    Applied(Value),
    /// At least one condition did not hold; nothing was written
    ConditionFailed,
    /// No record exists under the key
    NotFound,
}

impl UpdateOutcome {
    /// Whether the update was written
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied(_))
    }
}

/// Key-value store trait
///
/// This trait defines the interface that all store adapters must implement.
/// `update` must evaluate conditions and apply changes atomically with
/// respect to other writers of the same record (read-check-write at the
/// store layer).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Load a document
    ///
    /// # Returns
    ///
    /// Returns `Ok(Some(Value))` if found, `Ok(None)` if not found.
    async fn get(&self, key: &RecordKey) -> Result<Option<Value>>;

    /// Insert or replace a document
    async fn put(&self, key: &RecordKey, document: Value) -> Result<()>;

    /// Insert a document only if the key is unused
    ///
    /// # Returns
    ///
    /// Returns `Ok(true)` if the document was written, `Ok(false)` if a
    /// record already existed.
    async fn put_if_absent(&self, key: &RecordKey, document: Value) -> Result<bool>;

    /// Apply a partial, conditional update to an existing document
    async fn update(&self, key: &RecordKey, update: &FieldUpdate) -> Result<UpdateOutcome>;

    /// Load several documents; missing keys are omitted from the result
    async fn batch_get(&self, keys: &[RecordKey]) -> Result<Vec<(RecordKey, Value)>> {
        let mut found = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(document) = self.get(key).await? {
                found.push((key.clone(), document));
            }
        }
        Ok(found)
    }

    /// Insert or replace several documents
    async fn batch_put(&self, items: Vec<(RecordKey, Value)>) -> Result<()> {
        for (key, document) in items {
            self.put(&key, document).await?;
        }
        Ok(())
    }

    /// List every document of a collection, ordered by key
    async fn list(&self, collection: Collection) -> Result<Vec<(RecordKey, Value)>>;
}

/// Load and decode a typed document
///
/// # Errors
///
/// Returns an error if the read fails or the stored document does not match `T`.
pub async fn load_document<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &RecordKey,
) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(document) => decode_document(key, document).map(Some),
        None => Ok(None),
    }
}

/// Encode and store a typed document
pub async fn save_document<T: Serialize + Sync>(
    store: &dyn KeyValueStore,
    key: &RecordKey,
    document: &T,
) -> Result<()> {
    let value = serde_json::to_value(document)?;
    store.put(key, value).await
}

/// Decode a raw document read from the store
pub fn decode_document<T: DeserializeOwned>(key: &RecordKey, document: Value) -> Result<T> {
    serde_json::from_value(document).map_err(|e| {
        ReportFlowError::Store(StoreError::CorruptDocument {
            key: key.to_string(),
            message: e.to_string(),
        })
    })
}
