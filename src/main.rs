//! osqsh - interactive shell for distributed osquery queries
//!
//! This binary provides:
//! - An interactive prompt with aliases, tab completion and several connected hosts
//! - `osqsh exec` for running shell lines from scripts
//! - Pluggable backend drivers (in-memory demo fleet, goquery test server, local osqueryi)

mod aliases;
mod backends;
mod cli;
mod commands;
mod core;
mod history;
mod logging;
mod printer;
mod query;
mod repl;
mod router;
mod session;
mod settings;

use clap::Parser;
use cli::exec::{ExecArgs, ScriptFailed};
use cli::{exit_codes, Cli, Commands};
use history::FileHistory;
use router::Router;
use session::Session;
use settings::{Settings, SettingsError};

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = Cli::parse();

    let settings = cli.settings();
    let debug = settings.as_ref().is_ok_and(|s| s.debug_enabled);

    // Initialize logging
    if let Err(e) = logging::init(cli.verbose || debug, cli.json_output) {
        eprintln!("Failed to initialize logging: {}", e);
        return exit_codes::UNEXPECTED_FAILURE;
    }

    let command = match cli.command {
        Some(Commands::Config(args)) => {
            // works even when the current file does not parse
            return match cli::config::run(args, cli.config.as_deref(), &mut std::io::stdout()) {
                Ok(()) => exit_codes::SUCCESS,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    categorize_error(&e)
                }
            };
        }
        Some(Commands::Exec(args)) => Some(args),
        None => None,
    };

    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return match e {
                SettingsError::Parse { .. } => exit_codes::PARSE_ERROR,
                _ => exit_codes::UNEXPECTED_FAILURE,
            };
        }
    };

    // Create tokio runtime for the shell
    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            return exit_codes::UNEXPECTED_FAILURE;
        }
    };

    rt.block_on(start(command, settings))
}

async fn start(exec: Option<ExecArgs>, settings: Settings) -> i32 {
    let backend = match backends::create_backend(&settings) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!(
                "Error: failed to initialize '{}' backend: {}",
                settings.api_driver, e
            );
            return exit_codes::BACKEND_INIT;
        }
    };

    let history_path = settings.history_path();
    let mut session = Session::new(backend, settings);
    if session.settings().debug_enabled {
        eprint!("{}", startup_summary(&session));
    }
    let router = Router::new();

    let result = match exec {
        Some(args) => cli::exec::run(args, &router, &mut session).await,
        None => {
            match history_path {
                Some(path) => session = session.with_history(Box::new(FileHistory::new(path))),
                None => tracing::warn!("no history file location, history is not saved"),
            }
            repl::run(&router, &mut session).await
        }
    };

    match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            // scripted failures were already printed by the router
            if e.downcast_ref::<ScriptFailed>().is_none() {
                eprintln!("Error: {}", e);
            }
            categorize_error(&e)
        }
    }
}

fn startup_summary(session: &Session) -> String {
    format!(
        "Print mode: {}\nAliases: {} ({} rejected)\nBackend driver: {}\n",
        session.print_mode(),
        session.aliases().len(),
        session.rejected_aliases().len(),
        session.settings().api_driver
    )
}

/// Categorize an error into the appropriate exit code
fn categorize_error(e: &anyhow::Error) -> i32 {
    if e.downcast_ref::<ScriptFailed>().is_some() {
        return exit_codes::COMMAND_FAILED;
    }
    if let Some(SettingsError::Parse { .. }) = e.downcast_ref::<SettingsError>() {
        return exit_codes::PARSE_ERROR;
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("parse") || msg.contains("invalid") {
        exit_codes::PARSE_ERROR
    } else {
        exit_codes::UNEXPECTED_FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_categorize_error() {
        let failed = anyhow::Error::from(ScriptFailed { failed: 2 });
        assert_eq!(categorize_error(&failed), exit_codes::COMMAND_FAILED);

        let parse = anyhow::Error::from(SettingsError::Parse {
            path: PathBuf::from("config.json"),
            message: "expected value".to_string(),
        });
        assert_eq!(categorize_error(&parse), exit_codes::PARSE_ERROR);

        let other = anyhow::anyhow!("disk full");
        assert_eq!(categorize_error(&other), exit_codes::UNEXPECTED_FAILURE);
    }

    #[test]
    fn test_startup_summary_counts_rejected_aliases() {
        let mut settings = Settings {
            debug_enabled: true,
            ..Settings::default()
        };
        settings.aliases.insert(
            "bad name".to_string(),
            aliases::Alias::new("bad name", ".hosts"),
        );
        let session = Session::new(std::sync::Arc::new(backends::MemoryBackend::new()), settings);

        assert_eq!(
            startup_summary(&session),
            "Print mode: pretty\nAliases: 1 (1 rejected)\nBackend driver: memory\n"
        );
    }

    #[test]
    fn test_unknown_driver_fails_backend_init() {
        let settings = Settings {
            api_driver: "uptycs".to_string(),
            ..Settings::default()
        };
        let code = tokio_test::block_on(start(None, settings));
        assert_eq!(code, exit_codes::BACKEND_INIT);
    }
}
