//! Local osqueryi backend
//!
//! Runs queries on this machine through the osqueryi shell. The only host
//! is `local`. Scheduling starts osqueryi on a background task and returns
//! at once. Fetches report `Pending` until the run ends. A finished entry is
//! dropped once a fetch has returned it.

mod runner;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::{
    BackendApi, BackendError, DriverId, Host, Rows, COMPLETE_STATUS, PENDING_STATUS,
};

pub use runner::OsqueryRunner;

/// The single host this driver knows
pub const LOCAL_HOST_UUID: &str = "local";

pub const DEFAULT_BINARY: &str = "osqueryi";

#[derive(Debug)]
enum RunState {
    Running,
    Finished(Result<Rows, String>),
}

type RunTable = Arc<Mutex<HashMap<String, RunState>>>;

/// Backend driver for a local osqueryi binary
pub struct OsqueryiBackend {
    runner: OsqueryRunner,
    runs: RunTable,
}

impl OsqueryiBackend {
    pub fn new(binary: &str, timeout: Duration) -> Result<Self, BackendError> {
        let runner = OsqueryRunner::locate(binary, timeout)?;
        tracing::debug!("using osqueryi at {}", runner.binary().display());
        Ok(Self {
            runner,
            runs: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn local_host() -> Host {
        let platform = std::env::consts::OS;
        let name = std::env::var("HOSTNAME")
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "osqueryi".to_string());
        Host::new(LOCAL_HOST_UUID)
            .with_display_name(name)
            .with_platform(platform)
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_username(std::env::var("USER").unwrap_or_default())
    }

    fn lock(runs: &RunTable) -> std::sync::MutexGuard<'_, HashMap<String, RunState>> {
        runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_local(uuid: &str) -> Result<(), BackendError> {
        if uuid == LOCAL_HOST_UUID {
            Ok(())
        } else {
            Err(BackendError::HostNotFound(format!(
                "{} (only \"{}\" is supported)",
                uuid, LOCAL_HOST_UUID
            )))
        }
    }
}

#[async_trait]
impl BackendApi for OsqueryiBackend {
    fn id(&self) -> DriverId {
        DriverId::Osqueryi
    }

    async fn check_host(&self, uuid: &str) -> Result<Host, BackendError> {
        Self::ensure_local(uuid)?;
        Ok(Self::local_host())
    }

    async fn list_hosts(&self) -> Result<Vec<Host>, BackendError> {
        Ok(vec![Self::local_host()])
    }

    async fn schedule_query(&self, uuid: &str, sql: &str) -> Result<String, BackendError> {
        Self::ensure_local(uuid)?;

        let name = Uuid::new_v4().to_string();
        Self::lock(&self.runs).insert(name.clone(), RunState::Running);

        let runner = self.runner.clone();
        let runs = self.runs.clone();
        let sql = sql.to_string();
        let task_name = name.clone();
        tokio::spawn(async move {
            let outcome = runner.run_async(&sql).await;
            match &outcome {
                Ok(rows) => tracing::debug!(
                    query_name = %task_name,
                    rows = rows.len(),
                    "osqueryi query finished"
                ),
                Err(e) => tracing::debug!(query_name = %task_name, "osqueryi query failed: {}", e),
            }
            let state = RunState::Finished(outcome.map_err(|e| e.to_string()));
            Self::lock(&runs).insert(task_name, state);
        });

        Ok(name)
    }

    async fn fetch_results(&self, query_name: &str) -> Result<(Rows, String), BackendError> {
        let mut runs = Self::lock(&self.runs);
        match runs.get(query_name) {
            None => return Err(BackendError::QueryNotFound(query_name.to_string())),
            Some(RunState::Running) => return Ok((Rows::new(), PENDING_STATUS.to_string())),
            Some(RunState::Finished(_)) => {}
        }

        match runs.remove(query_name) {
            Some(RunState::Finished(Ok(rows))) => Ok((rows, COMPLETE_STATUS.to_string())),
            Some(RunState::Finished(Err(message))) => {
                Ok((Rows::new(), format!("Failed: {}", message)))
            }
            _ => Err(BackendError::QueryNotFound(query_name.to_string())),
        }
    }
}
