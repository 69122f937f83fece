//! Host registry - the connected hosts and the "current host" cursor

use std::collections::BTreeSet;

use thiserror::Error;

use crate::core::{is_valid_directory, Host, Query};

/// Errors from host session bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no active host connection with uuid '{0}'")]
    NoActiveConnection(String),

    #[error("no active host connections")]
    NoConnections,

    #[error("no host is currently selected")]
    NoCursorSet,

    #[error("index {index} out of range, currently connected to {connected} host(s)")]
    IndexOutOfRange { index: usize, connected: usize },

    #[error("invalid directory '{0}', must be absolute and end in '/'")]
    InvalidDirectory(String),
}

/// Connected hosts in connection order plus an optional cursor
#[derive(Debug, Default)]
pub struct HostRegistry {
    hosts: Vec<Host>,
    cursor: Option<usize>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host and make it current. Registering a uuid that is already
    /// connected only moves the cursor and keeps the existing state.
    /// Returns `true` when a new entry was created.
    pub fn register(&mut self, host: Host) -> bool {
        if let Some(index) = self.position(&host.uuid) {
            tracing::debug!(uuid = %host.uuid, index, "host already connected, selecting it");
            self.cursor = Some(index);
            return false;
        }

        tracing::debug!(uuid = %host.uuid, "registering host");
        self.hosts.push(host);
        self.cursor = Some(self.hosts.len() - 1);
        true
    }

    /// Remove a host; an empty uuid means the current host.
    ///
    /// The cursor is cleared after any disconnect, even when other hosts
    /// remain connected. Callers must reselect with `set_current_host`.
    pub fn disconnect(&mut self, uuid: &str) -> Result<Host, SessionError> {
        let index = if uuid.is_empty() {
            self.cursor
        } else {
            self.position(uuid)
        };

        let index = index.ok_or_else(|| SessionError::NoActiveConnection(uuid.to_string()))?;
        let removed = self.hosts.remove(index);
        self.cursor = None;

        tracing::debug!(uuid = %removed.uuid, remaining = self.hosts.len(), "host disconnected");
        Ok(removed)
    }

    pub fn current_host(&self) -> Result<&Host, SessionError> {
        let index = self.current_index()?;
        Ok(&self.hosts[index])
    }

    /// Move the cursor and return the selected host's uuid
    pub fn set_current_host(&mut self, index: usize) -> Result<String, SessionError> {
        let host = self.hosts.get(index).ok_or(SessionError::IndexOutOfRange {
            index,
            connected: self.hosts.len(),
        })?;
        let uuid = host.uuid.clone();
        self.cursor = Some(index);
        Ok(uuid)
    }

    /// Overwrite the current host's working directory
    pub fn set_current_directory(&mut self, path: &str) -> Result<(), SessionError> {
        if !is_valid_directory(path) {
            return Err(SessionError::InvalidDirectory(path.to_string()));
        }
        let index = self.current_index()?;
        self.hosts[index].current_directory = path.to_string();
        Ok(())
    }

    /// Replace the discovered table list of a connected host.
    ///
    /// # Panics
    /// If `uuid` is not connected; callers must hold a live connection.
    pub fn set_host_tables(&mut self, uuid: &str, tables: BTreeSet<String>) {
        let host = self.host_mut_or_panic(uuid, "set_host_tables");
        host.tables = tables;
    }

    /// Record a scheduled query in a connected host's history.
    ///
    /// # Panics
    /// If `uuid` is not connected; callers must hold a live connection.
    pub fn append_query_to_history(&mut self, uuid: &str, query: Query) {
        let host = self.host_mut_or_panic(uuid, "append_query_to_history");
        host.query_history.push(query);
    }

    /// Read-only view of every connected host, in connection order
    pub fn list_connected(&self) -> &[Host] {
        &self.hosts
    }

    pub fn current_index_opt(&self) -> Option<usize> {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    fn current_index(&self) -> Result<usize, SessionError> {
        if self.hosts.is_empty() {
            return Err(SessionError::NoConnections);
        }
        self.cursor.ok_or(SessionError::NoCursorSet)
    }

    fn position(&self, uuid: &str) -> Option<usize> {
        self.hosts.iter().position(|host| host.uuid == uuid)
    }

    fn host_mut_or_panic(&mut self, uuid: &str, operation: &str) -> &mut Host {
        match self.hosts.iter_mut().find(|host| host.uuid == uuid) {
            Some(host) => host,
            None => panic!("{operation} called for host '{uuid}' which is not connected"),
        }
    }
}
