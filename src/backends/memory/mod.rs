//! In-memory backend
//!
//! Serves a fixed fleet from process memory. Responses are canned per SQL
//! substring and can stay `Pending` for a configurable number of polls,
//! which makes this driver the fixture for lifecycle and router tests.
//! `MemoryBackend::demo()` adds a small virtual filesystem so `cd`, `ls`
//! and `.tables` work without a fleet server.

mod fixture;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::core::{
    BackendApi, BackendError, DriverId, Host, Rows, COMPLETE_STATUS, PENDING_STATUS,
};

pub use fixture::DemoFilesystem;

/// What a scheduled query resolves to
#[derive(Debug, Clone)]
pub struct CannedResponse {
    rows: Rows,
    status: String,
    pending_polls: usize,
    partial_rows: Rows,
    fetch_error: Option<String>,
}

impl CannedResponse {
    /// Resolves `Complete` with `rows`
    pub fn complete(rows: Rows) -> Self {
        Self::with_status(rows, COMPLETE_STATUS)
    }

    /// Resolves with an arbitrary terminal status string
    pub fn with_status(rows: Rows, status: impl Into<String>) -> Self {
        Self {
            rows,
            status: status.into(),
            pending_polls: 0,
            partial_rows: Rows::new(),
            fetch_error: None,
        }
    }

    /// Every fetch fails with a transport-style error
    pub fn failing(message: impl Into<String>) -> Self {
        let mut response = Self::complete(Rows::new());
        response.fetch_error = Some(message.into());
        response
    }

    /// Builder pattern: report `Pending` this many times before resolving
    pub fn with_pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Builder pattern: rows returned alongside `Pending`
    pub fn with_partial_rows(mut self, rows: Rows) -> Self {
        self.partial_rows = rows;
        self
    }
}

#[derive(Debug)]
struct ScheduledQuery {
    response: CannedResponse,
    polls_remaining: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    hosts: Vec<Host>,
    responses: Vec<(String, CannedResponse)>,
    filesystem: Option<DemoFilesystem>,
    scheduled: HashMap<String, ScheduledQuery>,
    sql_log: Vec<String>,
    next_query: usize,
}

/// Backend that answers from process memory
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    schedule_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MemoryBackend {
    /// Empty fleet with no canned responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Demo fleet: two hosts, a virtual filesystem and a few table fixtures
    pub fn demo() -> Self {
        let backend = Self::new()
            .with_host(
                Host::new("ABCD-1234")
                    .with_display_name("build-01")
                    .with_platform("ubuntu")
                    .with_version("5.12.1")
                    .with_username("root"),
            )
            .with_host(
                Host::new("EFGH-5678")
                    .with_display_name("laptop-42")
                    .with_platform("darwin")
                    .with_version("5.11.0")
                    .with_username("operator"),
            )
            .with_filesystem(DemoFilesystem::sample());

        fixture::sample_tables()
            .into_iter()
            .fold(backend, |backend, (pattern, response)| {
                backend.with_response(pattern, response)
            })
    }

    /// Builder pattern: add a host to the fleet
    pub fn with_host(self, host: Host) -> Self {
        self.state().hosts.push(host);
        self
    }

    /// Builder pattern: answer queries containing `pattern` with `response`.
    /// Patterns are checked in insertion order.
    pub fn with_response(self, pattern: impl Into<String>, response: CannedResponse) -> Self {
        self.state().responses.push((pattern.into(), response));
        self
    }

    /// Builder pattern: answer `file` and registry queries from `filesystem`
    pub fn with_filesystem(self, filesystem: DemoFilesystem) -> Self {
        self.state().filesystem = Some(filesystem);
        self
    }

    pub fn schedule_calls(&self) -> usize {
        self.schedule_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// SQL of every query scheduled so far, in scheduling order
    pub fn scheduled_sql(&self) -> Vec<String> {
        self.state().sql_log.clone()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl MemoryState {
    fn resolve(&self, sql: &str) -> CannedResponse {
        if let Some((_, response)) = self
            .responses
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
        {
            return response.clone();
        }

        if let Some(rows) = self.filesystem.as_ref().and_then(|fs| fs.answer(sql)) {
            return CannedResponse::complete(rows);
        }

        CannedResponse::complete(Rows::new())
    }
}

#[async_trait]
impl BackendApi for MemoryBackend {
    fn id(&self) -> DriverId {
        DriverId::Memory
    }

    async fn check_host(&self, uuid: &str) -> Result<Host, BackendError> {
        tracing::debug!(uuid, "memory: check host");
        self.state()
            .hosts
            .iter()
            .find(|host| host.uuid == uuid)
            .cloned()
            .ok_or_else(|| BackendError::HostNotFound(uuid.to_string()))
    }

    async fn list_hosts(&self) -> Result<Vec<Host>, BackendError> {
        Ok(self.state().hosts.clone())
    }

    async fn schedule_query(&self, uuid: &str, sql: &str) -> Result<String, BackendError> {
        self.schedule_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();

        if !state.hosts.iter().any(|host| host.uuid == uuid) {
            return Err(BackendError::HostNotFound(uuid.to_string()));
        }

        state.next_query += 1;
        let name = format!("mem-{}", state.next_query);
        let response = state.resolve(sql);
        state.sql_log.push(sql.to_string());
        tracing::debug!(uuid, query_name = %name, sql, "memory: query scheduled");

        state.scheduled.insert(
            name.clone(),
            ScheduledQuery {
                polls_remaining: response.pending_polls,
                response,
            },
        );
        Ok(name)
    }

    async fn fetch_results(&self, query_name: &str) -> Result<(Rows, String), BackendError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();

        let query = state
            .scheduled
            .get_mut(query_name)
            .ok_or_else(|| BackendError::QueryNotFound(query_name.to_string()))?;

        if let Some(message) = &query.response.fetch_error {
            return Err(BackendError::Other(message.clone()));
        }

        if query.polls_remaining > 0 {
            query.polls_remaining -= 1;
            return Ok((query.response.partial_rows.clone(), PENDING_STATUS.to_string()));
        }

        Ok((query.response.rows.clone(), query.response.status.clone()))
    }
}
