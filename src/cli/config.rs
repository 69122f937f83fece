//! `osqsh config` - settings file helpers

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Args, Subcommand};

use crate::settings::Settings;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the settings file location
    Path,

    /// Print the effective settings
    Show,

    /// Write a settings file with the defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn settings_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(Settings::default_path()?),
    }
}

pub fn run(args: ConfigArgs, explicit: Option<&Path>, out: &mut dyn Write) -> Result<()> {
    match args.action {
        ConfigAction::Path => {
            writeln!(out, "{}", settings_path(explicit)?.display())?;
        }
        ConfigAction::Show => {
            let settings = Settings::load(explicit)?;
            writeln!(out, "{}", serde_json::to_string_pretty(&settings)?)?;
        }
        ConfigAction::Init { force } => {
            let path = settings_path(explicit)?;
            if path.exists() && !force {
                bail!(
                    "{} already exists, pass --force to overwrite it",
                    path.display()
                );
            }
            Settings::default().save(&path)?;
            tracing::info!("wrote default settings to {}", path.display());
            writeln!(out, "Wrote {}", path.display())?;
        }
    }
    Ok(())
}
