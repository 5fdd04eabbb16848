//! Artifact storage for finished exports
//!
//! The object store owns the artifact formats: it writes the raw CSV,
//! converts it to a spreadsheet, compresses it and issues time-bounded
//! download URLs.

pub mod memory;
pub mod signer;

use crate::adapters::query::TabularResult;
use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use memory::InMemoryObjectStore;
pub use signer::UrlSigner;

pub const CSV_CONTENT_TYPE: &str = "text/csv";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const ZIP_CONTENT_TYPE: &str = "application/zip";

/// A stored artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub key: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// Object store trait
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write a query result as CSV under `key`, replacing any existing object
    async fn write_artifact(&self, key: &str, result: TabularResult) -> Result<ArtifactInfo>;

    /// Convert the CSV at `source` into a spreadsheet stored at `target`
    async fn convert_to_spreadsheet(&self, source: &str, target: &str) -> Result<ArtifactInfo>;

    /// Compress the object at `source` into an archive stored at `target`
    async fn compress(&self, source: &str, target: &str) -> Result<ArtifactInfo>;

    /// Download URL for `key`, valid until `expires_at`
    async fn presign_download(&self, key: &str, expires_at: DateTime<Utc>) -> Result<String>;
}

/// Encodes one CSV record, quoting fields that need it
pub fn csv_record<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|f| {
            let f = f.as_ref();
            if f.contains([',', '"', '\n', '\r']) {
                format!("\"{}\"", f.replace('"', "\"\""))
            } else {
                f.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",");
    line.push_str("\r\n");
    line
}
