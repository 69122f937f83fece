//! Command history side channel
//!
//! The router appends each top-level line once. The line editor is seeded
//! from `recent` at startup.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not determine home directory for the history file")]
    NoHomeDir,
}

/// Append-only store of entered command lines
pub trait CommandHistory: Send {
    fn append(&mut self, line: &str) -> Result<(), HistoryError>;

    /// Up to `limit` most recent entries, oldest first
    fn recent(&self, limit: usize) -> Result<Vec<String>, HistoryError>;
}

/// Newline delimited history file, created on first use
#[derive(Debug, Clone)]
pub struct FileHistory {
    path: PathBuf,
}

impl FileHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.osqsh/history`
    pub fn default_path() -> Result<PathBuf, HistoryError> {
        dirs::home_dir()
            .map(|home| home.join(".osqsh").join("history"))
            .ok_or(HistoryError::NoHomeDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl CommandHistory for FileHistory {
    fn append(&mut self, line: &str) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;

        // one entry per line
        let entry = line.replace(['\r', '\n'], " ");
        writeln!(file, "{}", entry).map_err(|e| self.io_error(e))
    }

    fn recent(&self, limit: usize) -> Result<Vec<String>, HistoryError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let lines: Vec<String> = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect();
        let skip = lines.len().saturating_sub(limit);
        Ok(lines.into_iter().skip(skip).collect())
    }
}

/// History kept in process memory
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    entries: Vec<String>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

impl CommandHistory for MemoryHistory {
    fn append(&mut self, line: &str) -> Result<(), HistoryError> {
        self.entries.push(line.to_string());
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<String>, HistoryError> {
        let skip = self.entries.len().saturating_sub(limit);
        Ok(self.entries[skip..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_history_created_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = FileHistory::new(dir.path().join("nested").join("history"));

        assert!(history.recent(10).unwrap().is_empty());

        history.append(".connect ABCD").unwrap();
        history.append(".query select 1").unwrap();
        history.append(".hosts").unwrap();

        assert_eq!(
            history.recent(2).unwrap(),
            vec![".query select 1".to_string(), ".hosts".to_string()]
        );
        assert_eq!(history.recent(10).unwrap().len(), 3);
    }

    #[test]
    fn test_file_history_flattens_newlines() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = FileHistory::new(dir.path().join("history"));
        history.append(".query select\n1").unwrap();
        assert_eq!(history.recent(5).unwrap(), vec![".query select 1".to_string()]);
    }

    #[test]
    fn test_memory_history() {
        let mut history = MemoryHistory::new();
        history.append("a").unwrap();
        history.append("b").unwrap();
        assert_eq!(history.recent(1).unwrap(), vec!["b".to_string()]);
        assert_eq!(history.entries().len(), 2);
    }
}
