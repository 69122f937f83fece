//! Built-in shell commands
//!
//! Every verb implements `Command` and is registered once in
//! `CommandTable::builtin`. Commands receive the raw input line and the
//! session; they never print their own errors, the router does.

mod connection;
mod navigation;
mod query;
mod shell;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::aliases::AliasError;
use crate::core::{BackendError, Rows};
use crate::query::QueryError;
use crate::session::{Session, SessionError};

/// Errors reported at the command boundary as `"<verb>: <message>"`
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Argument(String),

    #[error(transparent)]
    Alias(#[from] AliasError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("waiting cancelled for query {query_name}")]
    Cancelled { query_name: String, partial: Rows },

    #[error("unknown command")]
    UnknownCommand(String),

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<QueryError> for CommandError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Backend(e) => CommandError::Backend(e),
            QueryError::Cancelled {
                query_name,
                partial,
            } => CommandError::Cancelled {
                query_name,
                partial,
            },
        }
    }
}

/// A completion candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub text: String,
    pub description: String,
}

impl Suggestion {
    pub fn new(text: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            description: description.into(),
        }
    }
}

/// A built-in verb
#[async_trait]
pub trait Command: Send + Sync {
    /// Verb typed at the prompt
    fn name(&self) -> &'static str;

    /// One-line description for `.help`
    fn help(&self) -> &'static str;

    async fn execute(&self, session: &mut Session, line: &str) -> Result<(), CommandError>;

    /// Completion candidates for the argument being typed
    fn suggest(&self, _session: &Session, _line: &str) -> Vec<Suggestion> {
        Vec::new()
    }
}

/// Static verb -> command lookup
pub struct CommandTable {
    commands: BTreeMap<&'static str, Box<dyn Command>>,
}

impl CommandTable {
    /// Table with every built-in verb
    pub fn builtin() -> Self {
        let mut table = Self {
            commands: BTreeMap::new(),
        };

        table.register(Box::new(connection::Connect));
        table.register(Box::new(connection::Disconnect));
        table.register(Box::new(connection::Hosts));
        table.register(Box::new(connection::Discover));
        table.register(Box::new(connection::Switch));
        table.register(Box::new(query::RunQuery));
        table.register(Box::new(query::Schedule));
        table.register(Box::new(query::Resume));
        table.register(Box::new(query::History));
        table.register(Box::new(query::Tables));
        table.register(Box::new(navigation::ChangeDirectory));
        table.register(Box::new(navigation::ListDirectory));
        table.register(Box::new(shell::AliasCommand));
        table.register(Box::new(shell::Mode));
        table.register(Box::new(shell::Clear));
        table.register(Box::new(shell::Exit));

        let mut topics: Vec<(&'static str, &'static str)> = table
            .commands
            .values()
            .map(|command| (command.name(), command.help()))
            .collect();
        topics.push((shell::HELP_NAME, shell::HELP_TEXT));
        topics.sort();
        table.register(Box::new(shell::Help::new(topics)));

        table
    }

    fn register(&mut self, command: Box<dyn Command>) {
        self.commands.insert(command.name(), command);
    }

    pub fn get(&self, verb: &str) -> Option<&dyn Command> {
        self.commands.get(verb).map(|command| command.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Command> {
        self.commands.values().map(|command| command.as_ref())
    }
}

/// Everything after the verb, trimmed
pub(crate) fn arguments(line: &str) -> &str {
    let line = line.trim();
    match line.find(char::is_whitespace) {
        Some(index) => line[index..].trim(),
        None => "",
    }
}

/// UUID of the current host
pub(crate) fn current_uuid(session: &Session) -> Result<String, CommandError> {
    Ok(session.registry().current_host()?.uuid.clone())
}

/// Candidates from `options` that start with the partial argument
pub(crate) fn complete_from<I>(line: &str, options: I) -> Vec<Suggestion>
where
    I: IntoIterator<Item = Suggestion>,
{
    let partial = arguments(line);
    options
        .into_iter()
        .filter(|s| s.text.starts_with(partial))
        .collect()
}
