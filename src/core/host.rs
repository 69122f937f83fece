//! Host model - a connected remote endpoint and its session-local state

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single result row: column name to string value
pub type Row = BTreeMap<String, String>;

/// An ordered set of result rows
pub type Rows = Vec<Row>;

/// Status string the backends use for queries that have not finished yet
pub const PENDING_STATUS: &str = "Pending";

/// Status string the backends use for queries that finished successfully
pub const COMPLETE_STATUS: &str = "Complete";

/// Lifecycle status of a scheduled query as reported by a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    /// Not yet terminal
    Pending,
    /// Terminal, results are final
    Complete,
    /// Terminal with any other backend status string
    Failed(String),
}

impl QueryStatus {
    /// Map a free-form backend status string. Only `"Pending"` is non-terminal.
    pub fn from_backend(status: &str) -> Self {
        match status {
            PENDING_STATUS => QueryStatus::Pending,
            COMPLETE_STATUS => QueryStatus::Complete,
            other => QueryStatus::Failed(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, QueryStatus::Pending)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, QueryStatus::Complete)
    }
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryStatus::Pending => f.write_str(PENDING_STATUS),
            QueryStatus::Complete => f.write_str(COMPLETE_STATUS),
            QueryStatus::Failed(raw) if raw.is_empty() => f.write_str("Failed"),
            QueryStatus::Failed(raw) => f.write_str(raw),
        }
    }
}

/// A query scheduled against a host. History entries are never rewritten;
/// the live status always comes from the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    /// Backend-assigned token used to fetch results
    pub name: String,
    pub sql: String,
    /// Status observed when the query was recorded
    pub status: QueryStatus,
    pub scheduled_at: DateTime<Utc>,
}

impl Query {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
            status: QueryStatus::Pending,
            scheduled_at: Utc::now(),
        }
    }
}

/// A remote queryable target and its navigation and query state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub uuid: String,
    pub display_name: String,
    pub platform: String,
    pub version: String,
    pub username: String,

    /// Absolute path, always ends in `/`
    pub current_directory: String,

    #[serde(default)]
    pub query_history: Vec<Query>,

    #[serde(default)]
    pub tables: BTreeSet<String>,
}

impl Host {
    /// Create a host rooted at `/` with empty history
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            display_name: String::new(),
            platform: String::new(),
            version: String::new(),
            username: String::new(),
            current_directory: "/".to_string(),
            query_history: Vec::new(),
            tables: BTreeSet::new(),
        }
    }

    /// Builder pattern: set display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Builder pattern: set platform
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    /// Builder pattern: set agent version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Builder pattern: set username
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Name shown in prompts; falls back to the uuid
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.uuid
        } else {
            &self.display_name
        }
    }

    /// Row view used by `.hosts` and `.discover`
    pub fn summary_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("UUID".to_string(), self.uuid.clone());
        row.insert("Name".to_string(), self.display_name.clone());
        row.insert("Platform".to_string(), self.platform.clone());
        row.insert("Version".to_string(), self.version.clone());
        row.insert("Username".to_string(), self.username.clone());
        row.insert(
            "Current Directory".to_string(),
            self.current_directory.clone(),
        );
        row
    }
}

/// Check the directory invariant: non-empty, absolute and `/`-terminated
pub fn is_valid_directory(path: &str) -> bool {
    path.starts_with('/') && path.ends_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(QueryStatus::from_backend("Pending"), QueryStatus::Pending);
        assert_eq!(QueryStatus::from_backend("Complete"), QueryStatus::Complete);
        assert_eq!(
            QueryStatus::from_backend("Failed"),
            QueryStatus::Failed("Failed".to_string())
        );
        assert!(!QueryStatus::Pending.is_terminal());
        assert!(QueryStatus::from_backend("whatever").is_terminal());
    }

    #[test]
    fn test_status_is_case_sensitive() {
        assert!(QueryStatus::from_backend("pending").is_terminal());
    }

    #[test]
    fn test_new_host_starts_at_root() {
        let host = Host::new("ABCD");
        assert_eq!(host.current_directory, "/");
        assert_eq!(host.label(), "ABCD");
        assert_eq!(host.with_display_name("box").label(), "box");
    }

    #[test]
    fn test_directory_invariant() {
        assert!(is_valid_directory("/"));
        assert!(is_valid_directory("/etc/"));
        assert!(!is_valid_directory(""));
        assert!(!is_valid_directory("/etc"));
        assert!(!is_valid_directory("etc/"));
    }
}
