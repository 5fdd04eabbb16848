//! In-memory key-value store
//!
//! Suitable for tests, local runs and the CLI's `memory` backend. State is
//! lost when the process exits.

use super::traits::{Collection, KeyValueStore, RecordKey, UpdateOutcome};
use super::update::FieldUpdate;
use crate::domain::{Result, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Key-value store backed by a `BTreeMap`
///
/// Conditional updates hold the write lock across evaluation and write, so
/// they are atomic with respect to every other caller in the process.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<BTreeMap<RecordKey, Value>>,
}

fn poison_err<T>(_: PoisonError<T>) -> StoreError {
    StoreError::QueryFailed("store lock poisoned".to_string())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all collections
    pub fn len(&self) -> Result<usize> {
        Ok(self.records.read().map_err(poison_err)?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<Value>> {
        let records = self.records.read().map_err(poison_err)?;
        Ok(records.get(key).cloned())
    }

    async fn put(&self, key: &RecordKey, document: Value) -> Result<()> {
        let mut records = self.records.write().map_err(poison_err)?;
        records.insert(key.clone(), document);
        Ok(())
    }

    async fn put_if_absent(&self, key: &RecordKey, document: Value) -> Result<bool> {
        let mut records = self.records.write().map_err(poison_err)?;
        if records.contains_key(key) {
            return Ok(false);
        }
        records.insert(key.clone(), document);
        Ok(true)
    }

    async fn update(&self, key: &RecordKey, update: &FieldUpdate) -> Result<UpdateOutcome> {
        let mut records = self.records.write().map_err(poison_err)?;
        let Some(current) = records.get(key) else {
            return Ok(UpdateOutcome::NotFound);
        };

        let mut document = current.clone();
        if !update.apply(&mut document)? {
            return Ok(UpdateOutcome::ConditionFailed);
        }

        records.insert(key.clone(), document.clone());
        Ok(UpdateOutcome::Applied(document))
    }

    async fn batch_put(&self, items: Vec<(RecordKey, Value)>) -> Result<()> {
        let mut records = self.records.write().map_err(poison_err)?;
        records.extend(items);
        Ok(())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<(RecordKey, Value)>> {
        let records = self.records.read().map_err(poison_err)?;
        Ok(records
            .iter()
            .filter(|(key, _)| key.collection == collection)
            .map(|(key, doc)| (key.clone(), doc.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn key(id: &str) -> RecordKey {
        RecordKey::new(Collection::Refresh, id)
    }

    #[tokio::test]
    async fn test_put_if_absent_keeps_first_writer() {
        let store = InMemoryStore::new();
        assert!(store.put_if_absent(&key("acme"), json!({"v": 1})).await.unwrap());
        assert!(!store.put_if_absent(&key("acme"), json!({"v": 2})).await.unwrap());
        assert_eq!(store.get(&key("acme")).await.unwrap(), Some(json!({"v": 1})));
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = InMemoryStore::new();
        let outcome = store
            .update(&key("ghost"), &FieldUpdate::new().set("a", 1))
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_failed_apply_does_not_write() {
        let store = InMemoryStore::new();
        store.put(&key("acme"), json!({"count": "x"})).await.unwrap();

        let update = FieldUpdate::new().set("marker", true).increment("count", 1);
        assert!(store.update(&key("acme"), &update).await.is_err());
        assert_eq!(store.get(&key("acme")).await.unwrap(), Some(json!({"count": "x"})));
    }

    #[tokio::test]
    async fn test_concurrent_guarded_claims_have_one_winner() {
        let store = Arc::new(InMemoryStore::new());
        store.put(&key("job"), json!({"status": "queued"})).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let claim = FieldUpdate::new()
                    .when_equals("status", "queued")
                    .set("status", "running");
                store.update(&key("job"), &claim).await.unwrap().is_applied()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_list_filters_collection() {
        let store = InMemoryStore::new();
        store.put(&key("a"), json!({})).await.unwrap();
        store
            .put(&RecordKey::new(Collection::Schedule, "r1"), json!({}))
            .await
            .unwrap();

        let refresh = store.list(Collection::Refresh).await.unwrap();
        assert_eq!(refresh.len(), 1);
        assert_eq!(refresh[0].0, key("a"));
    }
}
