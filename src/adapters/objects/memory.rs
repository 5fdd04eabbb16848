//! Process-local object store
//!
//! Objects are kept as bytes. Spreadsheet conversion and compression keep
//! the source bytes and only record the target content type, which is
//! enough to exercise the export pipeline end to end.

use super::{
    csv_record, ArtifactInfo, ObjectStore, UrlSigner, CSV_CONTENT_TYPE, XLSX_CONTENT_TYPE,
    ZIP_CONTENT_TYPE,
};
use crate::adapters::query::TabularResult;
use crate::domain::{ReportFlowError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct StoredObject {
    content_type: String,
    bytes: Vec<u8>,
}

/// Object store backed by a map
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    signer: UrlSigner,
}

impl InMemoryObjectStore {
    pub fn new(signer: UrlSigner) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            signer,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, StoredObject>>> {
        self.objects
            .read()
            .map_err(|_| ReportFlowError::ObjectStore("object map lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, StoredObject>>> {
        self.objects
            .write()
            .map_err(|_| ReportFlowError::ObjectStore("object map lock poisoned".to_string()))
    }

    /// Stored keys in order
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.read()?.keys().cloned().collect())
    }

    /// Contents of an object as UTF-8 text
    pub fn text(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .read()?
            .get(key)
            .map(|o| String::from_utf8_lossy(&o.bytes).into_owned()))
    }

    /// Content type of an object
    pub fn content_type(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read()?.get(key).map(|o| o.content_type.clone()))
    }

    fn derive(&self, source: &str, target: &str, content_type: &str) -> Result<ArtifactInfo> {
        let mut objects = self.write()?;
        let bytes = objects
            .get(source)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| ReportFlowError::ObjectStore(format!("No object at '{source}'")))?;

        let info = ArtifactInfo {
            key: target.to_string(),
            content_type: content_type.to_string(),
            size_bytes: bytes.len() as u64,
        };
        objects.insert(
            target.to_string(),
            StoredObject {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(info)
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn write_artifact(&self, key: &str, result: TabularResult) -> Result<ArtifactInfo> {
        let mut body = csv_record(&result.columns);
        let mut rows = result.rows;
        while let Some(row) = rows.next().await {
            body.push_str(&csv_record(&row?));
        }

        let info = ArtifactInfo {
            key: key.to_string(),
            content_type: CSV_CONTENT_TYPE.to_string(),
            size_bytes: body.len() as u64,
        };
        self.write()?.insert(
            key.to_string(),
            StoredObject {
                content_type: CSV_CONTENT_TYPE.to_string(),
                bytes: body.into_bytes(),
            },
        );
        Ok(info)
    }

    async fn convert_to_spreadsheet(&self, source: &str, target: &str) -> Result<ArtifactInfo> {
        self.derive(source, target, XLSX_CONTENT_TYPE)
    }

    async fn compress(&self, source: &str, target: &str) -> Result<ArtifactInfo> {
        self.derive(source, target, ZIP_CONTENT_TYPE)
    }

    async fn presign_download(&self, key: &str, expires_at: DateTime<Utc>) -> Result<String> {
        if !self.read()?.contains_key(key) {
            return Err(ReportFlowError::ObjectStore(format!("No object at '{key}'")));
        }
        self.signer.sign(key, expires_at)
    }
}
