//! Domain identifier types with validation
//!
//! Newtype wrappers for the identifiers that key every persisted record:
//! tenants (platforms), report owners, reports and export executions.
//! Each type rejects blank input so that a malformed key never reaches the store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tenant identifier newtype wrapper
///
/// A platform is one customer installation of the host product and the unit
/// of isolation for refresh records, token budgets and export jobs.
///
/// # Examples
///
/// ```
/// use reportflow::domain::ids::PlatformId;
/// use std::str::FromStr;
///
/// let platform = PlatformId::from_str("acme-prod").unwrap();
/// assert_eq!(platform.as_str(), "acme-prod");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlatformId(String);

impl PlatformId {
    /// Creates a new PlatformId from a string
    ///
    /// # Arguments
    ///
    /// * `id` - The platform identifier string
    ///
    /// # Returns
    ///
    /// Returns `Ok(PlatformId)` if the ID is valid, `Err` otherwise
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Platform ID cannot be empty".to_string());
        }
        if id.contains('#') {
            return Err(format!("Platform ID cannot contain '#': {id}"));
        }
        Ok(Self(id))
    }

    /// Returns the platform ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PlatformId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for PlatformId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Report owner identifier
///
/// Owners are users of a platform; their timezone decides on which local
/// calendar day a scheduled report becomes due.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnerId(String);

impl OwnerId {
    /// Creates a new OwnerId, rejecting blank input
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Owner ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the owner ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OwnerId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Report identifier
///
/// Identifies a saved report definition. Export jobs are keyed by
/// `(ReportId, ExecutionId)`, so the report ID must not contain the `#`
/// separator used in job keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReportId(String);

impl ReportId {
    /// Creates a new ReportId
    ///
    /// # Errors
    ///
    /// Returns an error if the ID is blank or contains `#`
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Report ID cannot be empty".to_string());
        }
        if id.contains('#') {
            return Err(format!("Report ID cannot contain '#': {id}"));
        }
        Ok(Self(id))
    }

    /// Returns the report ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReportId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ReportId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Export execution identifier
///
/// Generated by the export job manager when a job is created. It is
/// deliberately independent of the query backend's own execution handle,
/// which only exists once the query has actually been submitted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExecutionId(String);

impl ExecutionId {
    /// Generates a fresh random execution ID
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wraps an existing execution ID
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Execution ID cannot be empty".to_string());
        }
        if id.contains('#') {
            return Err(format!("Execution ID cannot contain '#': {id}"));
        }
        Ok(Self(id))
    }

    /// Returns the execution ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExecutionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_id_valid() {
        let id = PlatformId::new("acme-prod").unwrap();
        assert_eq!(id.as_str(), "acme-prod");
        assert_eq!(id.to_string(), "acme-prod");
    }

    #[test]
    fn test_platform_id_rejects_blank_and_separator() {
        assert!(PlatformId::new("").is_err());
        assert!(PlatformId::new("   ").is_err());
        assert!(PlatformId::new("a#b").is_err());
    }

    #[test]
    fn test_owner_id_empty() {
        assert!(OwnerId::new("").is_err());
        assert!(OwnerId::from_str("user-1").is_ok());
    }

    #[test]
    fn test_report_id_rejects_separator() {
        assert!(ReportId::new("report#1").is_err());
        assert_eq!(ReportId::new("report-1").unwrap().as_str(), "report-1");
    }

    #[test]
    fn test_execution_id_generate_is_unique() {
        let a = ExecutionId::generate();
        let b = ExecutionId::generate();
        assert_ne!(a, b);
        assert!(uuid::Uuid::parse_str(a.as_str()).is_ok());
    }

    #[test]
    fn test_id_serialization_is_transparent_string() {
        let id = ReportId::new("r-42").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"r-42\"");
        let back: ReportId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
