//! Shell state commands: .alias, .mode, .help, .clear, .exit

use std::io::Write;

use async_trait::async_trait;

use super::{arguments, complete_from, Command, CommandError, Suggestion};
use crate::core::{Row, Rows};
use crate::printer::PrintMode;
use crate::session::Session;

pub const HELP_NAME: &str = ".help";
pub const HELP_TEXT: &str = "Show every command and alias";

pub struct AliasCommand;

impl AliasCommand {
    fn print_table(session: &mut Session) -> Result<(), CommandError> {
        let rows: Rows = session
            .aliases()
            .iter()
            .map(|alias| {
                let mut row = Row::new();
                row.insert("alias".to_string(), alias.name.clone());
                row.insert("command".to_string(), alias.command.clone());
                row.insert("description".to_string(), alias.description.clone());
                row
            })
            .collect();
        session.print_rows(&rows)?;
        Ok(())
    }
}

#[async_trait]
impl Command for AliasCommand {
    fn name(&self) -> &'static str {
        ".alias"
    }

    fn help(&self) -> &'static str {
        "List aliases, or manage them with --add NAME COMMAND / --remove NAME"
    }

    async fn execute(&self, session: &mut Session, line: &str) -> Result<(), CommandError> {
        let args = arguments(line);
        let mut tokens = args.split_whitespace();

        match tokens.next() {
            None => Self::print_table(session),
            Some("--add") => {
                // the command keeps its inner spacing verbatim
                let rest = args["--add".len()..].trim_start();
                let (name, command) = rest
                    .split_once(char::is_whitespace)
                    .map(|(name, command)| (name, command.trim_start()))
                    .unwrap_or((rest, ""));
                if name.is_empty() || command.is_empty() {
                    return Err(CommandError::Argument(
                        "--add requires arguments: ALIAS_NAME ALIAS_COMMAND".to_string(),
                    ));
                }

                session.aliases_mut().add(name, command)?;
                writeln!(
                    session.out(),
                    "Created new alias '{}' with command: {}",
                    name,
                    command
                )?;
                Ok(())
            }
            Some("--remove") => {
                let Some(name) = tokens.next() else {
                    return Err(CommandError::Argument(
                        "--remove requires an alias name argument".to_string(),
                    ));
                };

                session.aliases_mut().remove(name)?;
                writeln!(session.out(), "Removed alias '{}'", name)?;
                Ok(())
            }
            Some(other) => Err(CommandError::Argument(format!(
                "unknown flag '{}', use --add or --remove",
                other
            ))),
        }
    }

    fn suggest(&self, session: &Session, line: &str) -> Vec<Suggestion> {
        let args = arguments(line);
        if let Some(partial) = args.strip_prefix("--remove ") {
            return session
                .aliases()
                .iter()
                .filter(|alias| alias.name.starts_with(partial.trim()))
                .map(|alias| Suggestion::new(alias.name.clone(), alias.command.clone()))
                .collect();
        }
        if args.contains(char::is_whitespace) {
            return Vec::new();
        }
        complete_from(
            line,
            [
                Suggestion::new("--add", "Create a new alias"),
                Suggestion::new("--remove", "Remove an alias by name"),
            ],
        )
    }
}

pub struct Mode;

#[async_trait]
impl Command for Mode {
    fn name(&self) -> &'static str {
        ".mode"
    }

    fn help(&self) -> &'static str {
        "Change print mode (json, line, pretty, csv)"
    }

    async fn execute(&self, session: &mut Session, line: &str) -> Result<(), CommandError> {
        let requested = arguments(line);
        if requested.is_empty() {
            let mode = session.print_mode();
            writeln!(session.out(), "Current print mode: {}", mode)?;
            return Ok(());
        }

        let mode: PrintMode = requested.parse().map_err(CommandError::Argument)?;
        session.set_print_mode(mode);
        writeln!(session.out(), "Print mode set to '{}'.", mode)?;
        Ok(())
    }

    fn suggest(&self, _session: &Session, line: &str) -> Vec<Suggestion> {
        complete_from(
            line,
            PrintMode::all()
                .iter()
                .map(|mode| Suggestion::new(mode.name(), "")),
        )
    }
}

pub struct Clear;

#[async_trait]
impl Command for Clear {
    fn name(&self) -> &'static str {
        ".clear"
    }

    fn help(&self) -> &'static str {
        "Clear the screen"
    }

    async fn execute(&self, session: &mut Session, _line: &str) -> Result<(), CommandError> {
        let out = session.out();
        write!(out, "\x1b[2J\x1b[H")?;
        out.flush()?;
        Ok(())
    }
}

pub struct Exit;

#[async_trait]
impl Command for Exit {
    fn name(&self) -> &'static str {
        ".exit"
    }

    fn help(&self) -> &'static str {
        "Exit the shell"
    }

    async fn execute(&self, session: &mut Session, _line: &str) -> Result<(), CommandError> {
        session.request_exit();
        Ok(())
    }
}

/// Prints a snapshot of the command table taken when the table was built
pub struct Help {
    topics: Vec<(&'static str, &'static str)>,
}

impl Help {
    pub fn new(topics: Vec<(&'static str, &'static str)>) -> Self {
        Self { topics }
    }
}

#[async_trait]
impl Command for Help {
    fn name(&self) -> &'static str {
        HELP_NAME
    }

    fn help(&self) -> &'static str {
        HELP_TEXT
    }

    async fn execute(&self, session: &mut Session, _line: &str) -> Result<(), CommandError> {
        let aliases: Vec<(String, String)> = session
            .aliases()
            .iter()
            .map(|alias| {
                let text = if alias.description.is_empty() {
                    alias.command.clone()
                } else {
                    alias.description.clone()
                };
                (alias.name.clone(), text)
            })
            .collect();

        let width = self
            .topics
            .iter()
            .map(|(name, _)| name.len())
            .chain(aliases.iter().map(|(name, _)| name.len()))
            .max()
            .unwrap_or(0);

        let out = session.out();
        writeln!(out, "Commands:")?;
        for (name, help) in &self.topics {
            writeln!(out, "  {:<width$}  {}", name, help, width = width)?;
        }
        if !aliases.is_empty() {
            writeln!(out, "\nAliases:")?;
            for (name, text) in &aliases {
                writeln!(out, "  {:<width$}  {}", name, text, width = width)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::aliases::AliasError;
    use crate::backends::MemoryBackend;
    use crate::commands::CommandTable;
    use crate::session::OutputBuffer;
    use crate::settings::Settings;

    fn session() -> (Session, OutputBuffer) {
        let buffer = OutputBuffer::new();
        let session = Session::new(Arc::new(MemoryBackend::new()), Settings::default())
            .with_output(Box::new(buffer.clone()));
        (session, buffer)
    }

    #[tokio::test]
    async fn test_alias_add_list_remove() {
        let (mut session, buffer) = session();
        session.set_print_mode(PrintMode::Csv);

        AliasCommand
            .execute(&mut session, ".alias --add .procs .query select * from processes")
            .await
            .unwrap();
        assert_eq!(
            session.aliases().resolve(".procs").unwrap().command,
            ".query select * from processes"
        );
        buffer.clear();

        AliasCommand.execute(&mut session, ".alias").await.unwrap();
        assert_eq!(
            buffer.contents(),
            "alias,command,description\n\
             .all,.query select * from $#,Select everything from a table\n\
             .procs,.query select * from processes,\n"
        );

        AliasCommand
            .execute(&mut session, ".alias --remove .procs")
            .await
            .unwrap();
        assert!(session.aliases().resolve(".procs").is_none());
    }

    #[tokio::test]
    async fn test_alias_add_keeps_command_spacing() {
        let (mut session, buffer) = session();

        AliasCommand
            .execute(
                &mut session,
                ".alias --add  .q   .query select * from file where path = 'a  b'",
            )
            .await
            .unwrap();
        assert_eq!(
            session.aliases().resolve(".q").unwrap().command,
            ".query select * from file where path = 'a  b'"
        );
        assert_eq!(
            buffer.contents(),
            "Created new alias '.q' with command: .query select * from file where path = 'a  b'\n"
        );
    }

    #[tokio::test]
    async fn test_alias_errors() {
        let (mut session, _) = session();
        assert!(matches!(
            AliasCommand.execute(&mut session, ".alias --add .x").await,
            Err(CommandError::Argument(_))
        ));
        assert!(matches!(
            AliasCommand.execute(&mut session, ".alias --remove .nope").await,
            Err(CommandError::Alias(AliasError::NotFound(_)))
        ));
        assert!(matches!(
            AliasCommand.execute(&mut session, ".alias --add .all .hosts").await,
            Err(CommandError::Alias(AliasError::DuplicateName(_)))
        ));
        assert!(matches!(
            AliasCommand.execute(&mut session, ".alias --add .loop .loop").await,
            Err(CommandError::Alias(AliasError::CyclicAlias(_)))
        ));
        assert!(matches!(
            AliasCommand.execute(&mut session, ".alias --rename x").await,
            Err(CommandError::Argument(_))
        ));
    }

    #[test]
    fn test_alias_suggestions() {
        let (session, _) = session();
        let flags = AliasCommand.suggest(&session, ".alias --r");
        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].text, "--remove");

        let names = AliasCommand.suggest(&session, ".alias --remove .a");
        assert_eq!(names[0].text, ".all");
    }

    #[tokio::test]
    async fn test_mode() {
        let (mut session, buffer) = session();
        Mode.execute(&mut session, ".mode").await.unwrap();
        assert_eq!(buffer.contents(), "Current print mode: pretty\n");

        Mode.execute(&mut session, ".mode json").await.unwrap();
        assert_eq!(session.print_mode(), PrintMode::Json);

        let err = Mode.execute(&mut session, ".mode xml").await.unwrap_err();
        assert!(err.to_string().contains("unknown print mode 'xml'"));
        assert_eq!(session.print_mode(), PrintMode::Json);

        assert_eq!(Mode.suggest(&session, ".mode p")[0].text, "pretty");
    }

    #[tokio::test]
    async fn test_exit_sets_flag() {
        let (mut session, _) = session();
        Exit.execute(&mut session, ".exit").await.unwrap();
        assert!(session.exit_requested());
    }

    #[tokio::test]
    async fn test_help_lists_commands_and_aliases() {
        let (mut session, buffer) = session();
        let table = CommandTable::builtin();
        table
            .get(".help")
            .unwrap()
            .execute(&mut session, ".help")
            .await
            .unwrap();

        let out = buffer.contents();
        assert!(out.contains(".connect"));
        assert!(out.contains(".help"));
        assert!(out.contains("cd"));
        assert!(out.contains("Aliases:"));
        assert!(out.contains("Select everything from a table"));
    }
}
