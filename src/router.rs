//! Input line router
//!
//! Resolves the first token of a line to a built-in command or an alias.
//! Aliases are interpolated and re-dispatched. Errors are printed once as
//! `"<verb>: <message>"` by the level that produced them.

use std::io::Write;

use futures::future::BoxFuture;

use crate::aliases::{interpolate, AliasError};
use crate::commands::{CommandError, CommandTable};
use crate::session::Session;

/// Alias expansions allowed below one top-level line
pub const MAX_ALIAS_DEPTH: usize = 32;

pub struct Router {
    commands: CommandTable,
}

impl Router {
    pub fn new() -> Self {
        Self {
            commands: CommandTable::builtin(),
        }
    }

    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    /// Run one input line. The raw line is written to history once, and
    /// only when the command succeeded.
    pub async fn dispatch(&self, session: &mut Session, line: &str) -> Result<(), CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        session.cancel_token().reset();
        let result = self.run(session, line, 0).await;

        if result.is_ok() {
            session.record_history(line);
        }
        result
    }

    fn run<'a>(
        &'a self,
        session: &'a mut Session,
        line: &'a str,
        depth: usize,
    ) -> BoxFuture<'a, Result<(), CommandError>> {
        Box::pin(async move {
            let verb = line.split_whitespace().next().unwrap_or("");

            if let Some(command) = self.commands.get(verb) {
                tracing::debug!(verb, depth, "running command");
                let result = command.execute(session, line).await;
                if let Err(e) = &result {
                    report(session, verb, e);
                }
                return result;
            }

            if let Some(alias) = session.aliases().resolve(verb).cloned() {
                if depth >= MAX_ALIAS_DEPTH {
                    let e = CommandError::from(AliasError::TooDeep(MAX_ALIAS_DEPTH));
                    report(session, "alias", &e);
                    return Err(e);
                }

                let expanded = match interpolate(line, &alias.command) {
                    Ok(expanded) => expanded,
                    Err(e) => {
                        let e = CommandError::from(e);
                        report(session, "alias", &e);
                        return Err(e);
                    }
                };

                tracing::debug!(alias = %alias.name, expanded = %expanded, "expanded alias");
                return self.run(session, &expanded, depth + 1).await;
            }

            let e = CommandError::UnknownCommand(verb.to_string());
            report(session, verb, &e);
            Err(e)
        })
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

fn report(session: &mut Session, verb: &str, e: &CommandError) {
    if let Err(write_err) = writeln!(session.out(), "{}: {}", verb, e) {
        tracing::warn!("failed to print error: {}", write_err);
    }
}
