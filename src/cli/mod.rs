//! Command-line interface

pub mod config;
pub mod exec;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::printer::PrintMode;
use crate::settings::{Settings, SettingsError};

/// Process exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const UNEXPECTED_FAILURE: i32 = 1;
    pub const BACKEND_INIT: i32 = 2;
    pub const PARSE_ERROR: i32 = 3;
    pub const COMMAND_FAILED: i32 = 4;
}

/// osqsh - interactive shell for distributed osquery queries
#[derive(Parser, Debug)]
#[command(name = "osqsh", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Settings file (JSON, or TOML when the name ends in .toml)
    #[arg(long, global = true, env = "OSQSH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backend driver: memory, goserver or osqueryi
    #[arg(long, global = true)]
    pub driver: Option<String>,

    /// Print mode for query results
    #[arg(long, global = true, value_enum)]
    pub mode: Option<PrintMode>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_output: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run shell lines without an interactive prompt
    Exec(exec::ExecArgs),

    /// Inspect or create the settings file
    Config(config::ConfigArgs),
}

impl Cli {
    /// Load settings and apply command-line overrides
    pub fn settings(&self) -> Result<Settings, SettingsError> {
        let mut settings = Settings::load(self.config.as_deref())?;
        if let Some(driver) = &self.driver {
            settings.api_driver = driver.clone();
        }
        if let Some(mode) = self.mode {
            settings.print_mode = mode;
        }
        Ok(settings)
    }
}
