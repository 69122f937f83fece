//! Shell session state
//!
//! A `Session` owns everything a command may touch: the backend handle,
//! the host registry, the alias table, the settings, the output sink and
//! the history side channel. Commands receive it explicitly.

mod registry;

use std::io::{self, Write};
use std::sync::Arc;

use crate::aliases::AliasTable;
use crate::core::{BackendApi, CancelToken, QueryStatus, Rows};
use crate::history::{CommandHistory, MemoryHistory};
use crate::printer::{self, PrintMode};
use crate::query::{QueryController, QueryError, QueryResults};
use crate::settings::Settings;

pub use registry::{HostRegistry, SessionError};

/// State threaded through every command
pub struct Session {
    backend: Arc<dyn BackendApi>,
    registry: HostRegistry,
    aliases: AliasTable,
    rejected_aliases: Vec<String>,
    settings: Settings,
    controller: QueryController,
    cancel: CancelToken,
    history: Box<dyn CommandHistory>,
    out: Box<dyn Write + Send>,
    exit_requested: bool,
}

impl Session {
    /// New session writing to stdout with in-memory history. Invalid
    /// configured aliases are dropped with a warning and kept in
    /// `rejected_aliases`.
    pub fn new(backend: Arc<dyn BackendApi>, settings: Settings) -> Self {
        let (aliases, rejected_aliases) = settings.alias_table();
        let controller = QueryController::new(settings.poll_interval());

        Self {
            backend,
            registry: HostRegistry::new(),
            aliases,
            rejected_aliases,
            settings,
            controller,
            cancel: CancelToken::new(),
            history: Box::new(MemoryHistory::new()),
            out: Box::new(io::stdout()),
            exit_requested: false,
        }
    }

    /// Builder pattern: set output sink
    pub fn with_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self
    }

    /// Builder pattern: set history store
    pub fn with_history(mut self, history: Box<dyn CommandHistory>) -> Self {
        self.history = history;
        self
    }

    /// Builder pattern: set alias table
    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn backend(&self) -> &dyn BackendApi {
        self.backend.as_ref()
    }

    pub fn registry(&self) -> &HostRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut HostRegistry {
        &mut self.registry
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn aliases_mut(&mut self) -> &mut AliasTable {
        &mut self.aliases
    }

    /// Reasons configured aliases were dropped at startup
    pub fn rejected_aliases(&self) -> &[String] {
        &self.rejected_aliases
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn print_mode(&self) -> PrintMode {
        self.settings.print_mode
    }

    pub fn set_print_mode(&mut self, mode: PrintMode) {
        self.settings.print_mode = mode;
    }

    /// Shared handle; signal listeners trip it from outside the session
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    pub fn history(&self) -> &dyn CommandHistory {
        self.history.as_ref()
    }

    /// Append a line to the history side channel. Failures are logged only.
    pub fn record_history(&mut self, line: &str) {
        if let Err(e) = self.history.append(line) {
            tracing::warn!("failed to write history: {}", e);
        }
    }

    /// Output sink for command text
    pub fn out(&mut self) -> &mut dyn Write {
        self.out.as_mut()
    }

    /// Print rows in the active mode
    pub fn print_rows(&mut self, rows: &Rows) -> io::Result<()> {
        let mode = self.settings.print_mode;
        printer::print_rows(self.out.as_mut(), rows, mode)
    }

    /// Schedule on `uuid` and wait for a terminal status
    pub async fn run_query(&mut self, uuid: &str, sql: &str) -> Result<QueryResults, QueryError> {
        self.controller
            .schedule_and_wait(
                self.backend.as_ref(),
                &mut self.registry,
                uuid,
                sql,
                &self.cancel,
            )
            .await
    }

    /// Schedule on `uuid` without waiting
    pub async fn schedule_query(&mut self, uuid: &str, sql: &str) -> Result<String, QueryError> {
        self.controller
            .schedule(self.backend.as_ref(), &mut self.registry, uuid, sql)
            .await
    }

    /// Single status check for a scheduled query
    pub async fn fetch_once(
        &mut self,
        query_name: &str,
    ) -> Result<(Rows, QueryStatus), QueryError> {
        self.controller
            .fetch_once(self.backend.as_ref(), query_name)
            .await
    }

    /// `osqsh | <host>:<dir>> ` when a host is current, else `osqsh> `
    pub fn prompt(&self) -> String {
        match self.registry.current_host() {
            Ok(host) => format!("osqsh | {}:{}> ", host.label(), host.current_directory),
            Err(_) => "osqsh> ".to_string(),
        }
    }
}

/// Cloneable in-memory output sink for capturing command output
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    inner: Arc<std::sync::Mutex<Vec<u8>>>,
}

#[cfg(test)]
impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far
    pub fn contents(&self) -> String {
        let bytes = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

#[cfg(test)]
impl Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MemoryBackend;
    use crate::core::Host;

    fn session() -> (Session, OutputBuffer) {
        let buffer = OutputBuffer::new();
        let backend = MemoryBackend::new().with_host(Host::new("ABCD").with_display_name("box"));
        let session = Session::new(Arc::new(backend), Settings::default())
            .with_output(Box::new(buffer.clone()));
        (session, buffer)
    }

    #[test]
    fn test_prompt_follows_current_host() {
        let (mut session, _) = session();
        assert_eq!(session.prompt(), "osqsh> ");

        session
            .registry_mut()
            .register(Host::new("ABCD").with_display_name("box"));
        session.registry_mut().set_current_directory("/etc/").unwrap();
        assert_eq!(session.prompt(), "osqsh | box:/etc/> ");
    }

    #[test]
    fn test_default_aliases_loaded() {
        let (session, _) = session();
        assert!(session.aliases().resolve(".all").is_some());
    }

    #[test]
    fn test_rejected_aliases_kept() {
        let mut settings = Settings::default();
        settings
            .aliases
            .insert("bad name".to_string(), crate::aliases::Alias::new("bad name", ".hosts"));
        let session = Session::new(Arc::new(MemoryBackend::new()), settings);

        assert_eq!(session.aliases().len(), 1);
        assert_eq!(session.rejected_aliases().len(), 1);
        assert!(session.rejected_aliases()[0].contains("bad name"));
    }

    #[test]
    fn test_print_rows_uses_mode() {
        let (mut session, buffer) = session();
        session.set_print_mode(PrintMode::Csv);

        let mut row = crate::core::Row::new();
        row.insert("path".to_string(), "/etc".to_string());
        session.print_rows(&vec![row]).unwrap();

        assert_eq!(buffer.contents(), "path\n/etc\n");
    }

    fn assert_send<T: Send>(_: T) {}

    #[test]
    fn test_backend_futures_are_send() {
        let (mut session, _) = session();
        assert_send(session.fetch_once("mem-1"));
        assert_send(session.schedule_query("ABCD", "select 1"));
        assert_send(session.run_query("ABCD", "select 1"));
    }

    #[tokio::test]
    async fn test_fetch_once_reports_pending_then_complete() {
        let backend = MemoryBackend::new().with_host(Host::new("ABCD")).with_response(
            "users",
            crate::backends::memory::CannedResponse::complete(Vec::new()).with_pending_polls(1),
        );
        let mut session = Session::new(Arc::new(backend), Settings::default())
            .with_output(Box::new(OutputBuffer::new()));
        session.registry_mut().register(Host::new("ABCD"));

        let name = session.schedule_query("ABCD", "select * from users").await.unwrap();
        assert_eq!(session.fetch_once(&name).await.unwrap().1, QueryStatus::Pending);
        assert_eq!(session.fetch_once(&name).await.unwrap().1, QueryStatus::Complete);
    }

    #[tokio::test]
    async fn test_run_query_records_history() {
        let (mut session, _) = session();
        session.registry_mut().register(Host::new("ABCD"));

        let results = session.run_query("ABCD", "select 1").await.unwrap();
        assert!(results.status.is_complete());
        assert_eq!(
            session.registry().current_host().unwrap().query_history[0].sql,
            "select 1"
        );
    }
}
