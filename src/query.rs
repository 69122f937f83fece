//! Query lifecycle - schedule, poll until terminal, resolve
//!
//! The controller owns no state beyond its poll interval. Every scheduled
//! query is recorded in the target host's history through the registry;
//! the live status always comes from the backend.

use std::time::Duration;

use thiserror::Error;

use crate::core::{BackendApi, BackendError, CancelToken, Query, QueryStatus, Rows};
use crate::session::HostRegistry;

/// Interval between result polls when nothing else is configured
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Errors surfaced by the query lifecycle
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The wait was interrupted; rows fetched so far are kept
    #[error("waiting cancelled for query {query_name}")]
    Cancelled { query_name: String, partial: Rows },
}

/// Outcome of a query that reached a terminal status
#[derive(Debug, Clone)]
pub struct QueryResults {
    pub query_name: String,
    pub rows: Rows,
    pub status: QueryStatus,
}

/// Drives the schedule -> poll -> resolve state machine against any backend
#[derive(Debug, Clone)]
pub struct QueryController {
    poll_interval: Duration,
}

impl QueryController {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Schedule without waiting and record the query in the host history
    pub async fn schedule(
        &self,
        api: &dyn BackendApi,
        registry: &mut HostRegistry,
        uuid: &str,
        sql: &str,
    ) -> Result<String, QueryError> {
        let query_name = api.schedule_query(uuid, sql).await?;
        tracing::debug!(uuid, query_name = %query_name, "query scheduled");
        registry.append_query_to_history(uuid, Query::new(query_name.clone(), sql));
        Ok(query_name)
    }

    /// Schedule and block until the backend reports a terminal status.
    ///
    /// Any status other than `"Pending"` ends the wait. Transport errors are
    /// terminal and never retried here. Cancellation is sampled after each
    /// sleep, never while a backend call is in flight.
    pub async fn schedule_and_wait(
        &self,
        api: &dyn BackendApi,
        registry: &mut HostRegistry,
        uuid: &str,
        sql: &str,
        cancel: &CancelToken,
    ) -> Result<QueryResults, QueryError> {
        let query_name = self.schedule(api, registry, uuid, sql).await?;
        self.wait(api, query_name, cancel).await
    }

    /// Poll an already scheduled query until it leaves `Pending`
    pub async fn wait(
        &self,
        api: &dyn BackendApi,
        query_name: String,
        cancel: &CancelToken,
    ) -> Result<QueryResults, QueryError> {
        let mut polls = 0usize;
        loop {
            let (rows, raw_status) = api.fetch_results(&query_name).await?;
            polls += 1;

            let status = QueryStatus::from_backend(&raw_status);
            if status.is_terminal() {
                tracing::debug!(query_name = %query_name, polls, status = %status, "query resolved");
                return Ok(QueryResults {
                    query_name,
                    rows,
                    status,
                });
            }

            tracing::debug!(query_name = %query_name, polls, "query still pending");
            tokio::time::sleep(self.poll_interval).await;

            if cancel.is_cancelled() {
                tracing::debug!(query_name = %query_name, partial = rows.len(), "wait cancelled");
                return Err(QueryError::Cancelled {
                    query_name,
                    partial: rows,
                });
            }
        }
    }

    /// Single non-blocking check used by `.resume`
    pub async fn fetch_once(
        &self,
        api: &dyn BackendApi,
        query_name: &str,
    ) -> Result<(Rows, QueryStatus), QueryError> {
        let (rows, raw_status) = api.fetch_results(query_name).await?;
        Ok((rows, QueryStatus::from_backend(&raw_status)))
    }
}

impl Default for QueryController {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{CannedResponse, MemoryBackend};
    use crate::core::{Host, Row};

    fn etc_row() -> Row {
        let mut row = Row::new();
        row.insert("path".to_string(), "/etc".to_string());
        row
    }

    fn setup(response: CannedResponse) -> (MemoryBackend, HostRegistry) {
        let backend = MemoryBackend::new()
            .with_host(Host::new("ABCD"))
            .with_response("from file", response);
        let mut registry = HostRegistry::new();
        registry.register(Host::new("ABCD"));
        (backend, registry)
    }

    fn fast() -> QueryController {
        QueryController::new(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_waits_through_pending() {
        let (backend, mut registry) =
            setup(CannedResponse::complete(vec![etc_row()]).with_pending_polls(1));

        let results = fast()
            .schedule_and_wait(
                &backend,
                &mut registry,
                "ABCD",
                "select * from file where directory = '/'",
                &CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(results.status, QueryStatus::Complete);
        assert_eq!(results.rows, vec![etc_row()]);
        assert_eq!(backend.fetch_calls(), 2);

        let host = registry.current_host().unwrap();
        assert_eq!(host.query_history.len(), 1);
        assert_eq!(host.query_history[0].name, results.query_name);
    }

    #[tokio::test]
    async fn test_any_non_pending_status_is_terminal() {
        let (backend, mut registry) =
            setup(CannedResponse::with_status(Vec::new(), "Failed").with_pending_polls(2));

        let results = fast()
            .schedule_and_wait(&backend, &mut registry, "ABCD", "select * from file", &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(results.status, QueryStatus::Failed("Failed".to_string()));
        assert!(results.rows.is_empty());
        assert_eq!(backend.fetch_calls(), 3);
    }

    #[tokio::test]
    async fn test_cancel_keeps_partial_rows() {
        let (backend, mut registry) = setup(
            CannedResponse::complete(Vec::new())
                .with_partial_rows(vec![etc_row()])
                .with_pending_polls(usize::MAX),
        );
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = fast()
            .schedule_and_wait(&backend, &mut registry, "ABCD", "select * from file", &cancel)
            .await
            .unwrap_err();

        match err {
            QueryError::Cancelled { partial, .. } => assert_eq!(partial, vec![etc_row()]),
            other => panic!("expected cancellation, got {other:?}"),
        }
        assert_eq!(backend.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_transport_error_is_terminal() {
        let (backend, mut registry) = setup(CannedResponse::failing("connection reset"));

        let err = fast()
            .schedule_and_wait(&backend, &mut registry, "ABCD", "select * from file", &CancelToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, QueryError::Backend(BackendError::Other(_))));
        assert_eq!(backend.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn test_schedule_error_records_nothing() {
        let backend = MemoryBackend::new();
        let mut registry = HostRegistry::new();
        registry.register(Host::new("ABCD"));

        let err = fast()
            .schedule(&backend, &mut registry, "ABCD", "select 1")
            .await
            .unwrap_err();

        assert!(matches!(err, QueryError::Backend(BackendError::HostNotFound(_))));
        assert!(registry.current_host().unwrap().query_history.is_empty());
    }

    #[test]
    fn test_fetch_once_reports_pending() {
        let (backend, mut registry) =
            setup(CannedResponse::complete(vec![etc_row()]).with_pending_polls(1));
        let controller = fast();

        tokio_test::block_on(async {
            let name = controller
                .schedule(&backend, &mut registry, "ABCD", "select * from file")
                .await
                .unwrap();

            let (rows, status) = controller.fetch_once(&backend, &name).await.unwrap();
            assert_eq!(status, QueryStatus::Pending);
            assert!(rows.is_empty());

            let (rows, status) = controller.fetch_once(&backend, &name).await.unwrap();
            assert_eq!(status, QueryStatus::Complete);
            assert_eq!(rows.len(), 1);
        });
    }
}
