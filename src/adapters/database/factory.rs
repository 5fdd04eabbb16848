//! Store factory
//!
//! Creates the key-value store selected by `store_backend`.

use crate::adapters::database::memory::InMemoryStore;
use crate::adapters::database::traits::KeyValueStore;
use crate::adapters::postgresql::{PostgreSQLClient, PostgresStore};
use crate::config::schema::{ReportFlowConfig, StoreBackend};
use crate::domain::{ReportFlowError, Result};
use std::sync::Arc;

/// Create the key-value store based on the configuration
///
/// For PostgreSQL the connection is tested and the schema migration is
/// applied before the store is returned.
///
/// # Errors
///
/// Returns an error if the backend section is missing or the store cannot
/// be reached.
pub async fn create_store(config: &ReportFlowConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::info!("Creating in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreBackend::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                ReportFlowError::Configuration(
                    "postgresql configuration is required when store_backend = 'postgresql'"
                        .to_string(),
                )
            })?;

            tracing::info!("Creating PostgreSQL store");
            let client = PostgreSQLClient::new(pg_config.clone())?;
            client.test_connection().await?;
            client.ensure_schema().await?;

            Ok(Arc::new(PostgresStore::new(client)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend() {
        let store = create_store(&ReportFlowConfig::default()).await.unwrap();
        assert!(store
            .list(crate::adapters::database::Collection::Refresh)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_postgresql_requires_section() {
        let config = ReportFlowConfig {
            store_backend: StoreBackend::PostgreSQL,
            ..Default::default()
        };
        assert!(matches!(
            create_store(&config).await,
            Err(ReportFlowError::Configuration(_))
        ));
    }
}
