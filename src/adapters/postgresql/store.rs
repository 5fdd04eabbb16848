//! PostgreSQL key-value store
//!
//! All collections share the `reportflow_records` table. Conditional
//! updates lock the row, evaluate the [`FieldUpdate`] in process and write
//! the new document in the same transaction.

use crate::adapters::database::traits::{Collection, KeyValueStore, RecordKey, UpdateOutcome};
use crate::adapters::database::update::FieldUpdate;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::domain::{Result, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const SELECT_ONE: &str =
    "SELECT document FROM reportflow_records WHERE collection = $1 AND id = $2";
const SELECT_FOR_UPDATE: &str =
    "SELECT document FROM reportflow_records WHERE collection = $1 AND id = $2 FOR UPDATE";
const UPSERT: &str = "INSERT INTO reportflow_records (collection, id, document, updated_at) \
     VALUES ($1, $2, $3, now()) \
     ON CONFLICT (collection, id) DO UPDATE SET document = EXCLUDED.document, updated_at = now()";
const INSERT_IF_ABSENT: &str = "INSERT INTO reportflow_records (collection, id, document) \
     VALUES ($1, $2, $3) ON CONFLICT (collection, id) DO NOTHING";
const UPDATE_DOCUMENT: &str = "UPDATE reportflow_records SET document = $3, updated_at = now() \
     WHERE collection = $1 AND id = $2";
const LIST: &str =
    "SELECT id, document FROM reportflow_records WHERE collection = $1 ORDER BY id";

fn query_failed(context: &str) -> impl Fn(tokio_postgres::Error) -> StoreError + '_ {
    move |e| StoreError::QueryFailed(format!("{context}: {e}"))
}

/// [`KeyValueStore`] over PostgreSQL
pub struct PostgresStore {
    client: Arc<PostgreSQLClient>,
}

impl PostgresStore {
    pub fn new(client: PostgreSQLClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    pub fn client(&self) -> &Arc<PostgreSQLClient> {
        &self.client
    }
}

#[async_trait]
impl KeyValueStore for PostgresStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<Value>> {
        let conn = self.client.get_connection().await?;
        let row = conn
            .query_opt(SELECT_ONE, &[&key.collection.as_str(), &key.id])
            .await
            .map_err(query_failed("Failed to read record"))?;
        Ok(row.map(|r| r.get::<_, Value>(0)))
    }

    async fn put(&self, key: &RecordKey, document: Value) -> Result<()> {
        let conn = self.client.get_connection().await?;
        conn.execute(UPSERT, &[&key.collection.as_str(), &key.id, &document])
            .await
            .map_err(query_failed("Failed to write record"))?;
        Ok(())
    }

    async fn put_if_absent(&self, key: &RecordKey, document: Value) -> Result<bool> {
        let conn = self.client.get_connection().await?;
        let inserted = conn
            .execute(
                INSERT_IF_ABSENT,
                &[&key.collection.as_str(), &key.id, &document],
            )
            .await
            .map_err(query_failed("Failed to insert record"))?;
        Ok(inserted == 1)
    }

    async fn update(&self, key: &RecordKey, update: &FieldUpdate) -> Result<UpdateOutcome> {
        let mut conn = self.client.get_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(query_failed("Failed to open transaction"))?;

        let collection = key.collection.as_str();
        let Some(row) = tx
            .query_opt(SELECT_FOR_UPDATE, &[&collection, &key.id])
            .await
            .map_err(query_failed("Failed to lock record"))?
        else {
            return Ok(UpdateOutcome::NotFound);
        };

        let mut document: Value = row.get(0);
        if !update.apply(&mut document)? {
            return Ok(UpdateOutcome::ConditionFailed);
        }

        tx.execute(UPDATE_DOCUMENT, &[&collection, &key.id, &document])
            .await
            .map_err(query_failed("Failed to update record"))?;
        tx.commit()
            .await
            .map_err(query_failed("Failed to commit update"))?;

        Ok(UpdateOutcome::Applied(document))
    }

    async fn batch_put(&self, items: Vec<(RecordKey, Value)>) -> Result<()> {
        let mut conn = self.client.get_connection().await?;
        let tx = conn
            .transaction()
            .await
            .map_err(query_failed("Failed to open transaction"))?;

        for (key, document) in &items {
            tx.execute(UPSERT, &[&key.collection.as_str(), &key.id, document])
                .await
                .map_err(query_failed("Failed to write record"))?;
        }

        tx.commit()
            .await
            .map_err(query_failed("Failed to commit batch"))?;
        Ok(())
    }

    async fn list(&self, collection: Collection) -> Result<Vec<(RecordKey, Value)>> {
        let conn = self.client.get_connection().await?;
        let rows = conn
            .query(LIST, &[&collection.as_str()])
            .await
            .map_err(query_failed("Failed to list records"))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let id: String = row.get(0);
                (RecordKey::new(collection, id), row.get::<_, Value>(1))
            })
            .collect())
    }
}
