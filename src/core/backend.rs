//! Backend trait - the capability set every fleet driver implements

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use super::{Host, Rows};

/// Errors reported by backend drivers
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("unknown host: {0}")]
    HostNotFound(String),

    #[error("unknown query name: {0}")]
    QueryNotFound(String),

    #[error("not supported by this backend: {0}")]
    Unsupported(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server returned {0}")]
    Http(u16),

    #[error("malformed response: {0}")]
    Parse(String),

    #[error("local process failed: {0}")]
    Process(String),

    #[error("unknown backend driver: {0}")]
    UnknownDriver(String),

    #[error("{0}")]
    Other(String),
}

/// Known backend drivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverId {
    Memory,
    Goserver,
    Osqueryi,
}

impl DriverId {
    pub fn all() -> &'static [DriverId] {
        &[DriverId::Memory, DriverId::Goserver, DriverId::Osqueryi]
    }

    /// Name used in config files and on the command line
    pub fn cli_name(&self) -> &'static str {
        match self {
            DriverId::Memory => "memory",
            DriverId::Goserver => "goserver",
            DriverId::Osqueryi => "osqueryi",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            DriverId::Memory => "In-memory demo fleet",
            DriverId::Goserver => "goquery test server",
            DriverId::Osqueryi => "Local osqueryi",
        }
    }

    pub fn from_cli_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "memory" | "demo" => Some(DriverId::Memory),
            "goserver" | "mock" => Some(DriverId::Goserver),
            "osqueryi" | "local" => Some(DriverId::Osqueryi),
            _ => None,
        }
    }
}

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

/// Capability set a fleet backend must provide. Drivers own their transport,
/// authentication, retries and call timeouts; the shell core never retries.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Which driver this is
    fn id(&self) -> DriverId;

    /// Verify a host exists and return its details
    async fn check_host(&self, uuid: &str) -> Result<Host, BackendError>;

    /// List every host the backend knows about
    async fn list_hosts(&self) -> Result<Vec<Host>, BackendError>;

    /// Schedule `sql` on the host and return the backend's query name
    async fn schedule_query(&self, uuid: &str, sql: &str) -> Result<String, BackendError>;

    /// Fetch rows and the raw status string for a scheduled query
    async fn fetch_results(&self, query_name: &str) -> Result<(Rows, String), BackendError>;
}
