//! goquery test server backend
//!
//! Talks to the reference fleet server (`goserver`) over HTTPS. SSO login
//! is not handled; the server must accept the session as-is.

mod api;

use std::time::Duration;

use async_trait::async_trait;

use crate::core::{BackendApi, BackendError, DriverId, Host, Rows};

pub use api::{GoserverApi, DEFAULT_BASE_URL};

/// Backend driver for the goquery test server
pub struct GoserverBackend {
    api: GoserverApi,
}

impl GoserverBackend {
    pub fn new(base_url: &str, timeout: Duration, insecure_tls: bool) -> Result<Self, BackendError> {
        if insecure_tls {
            tracing::warn!("TLS certificate verification is disabled for {}", base_url);
        }
        Ok(Self {
            api: GoserverApi::new(base_url, timeout, insecure_tls)?,
        })
    }
}

#[async_trait]
impl BackendApi for GoserverBackend {
    fn id(&self) -> DriverId {
        DriverId::Goserver
    }

    async fn check_host(&self, uuid: &str) -> Result<Host, BackendError> {
        self.api.check_host(uuid).await.inspect_err(|e| {
            tracing::warn!("goserver check_host failed: {}", e);
        })
    }

    async fn list_hosts(&self) -> Result<Vec<Host>, BackendError> {
        self.api.list_hosts().await
    }

    async fn schedule_query(&self, uuid: &str, sql: &str) -> Result<String, BackendError> {
        self.api.schedule_query(uuid, sql).await.inspect_err(|e| {
            tracing::warn!("goserver schedule_query failed: {}", e);
        })
    }

    async fn fetch_results(&self, query_name: &str) -> Result<(Rows, String), BackendError> {
        self.api.fetch_results(query_name).await
    }
}
