//! `osqsh exec` - run shell lines without a prompt

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use thiserror::Error;

use crate::router::Router;
use crate::session::Session;

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Shell lines to run in order, e.g. ".connect ABCD-1234"
    #[arg(conflicts_with = "script")]
    pub lines: Vec<String>,

    /// Read lines from a file, one command per line
    #[arg(short = 'f', long)]
    pub script: Option<PathBuf>,

    /// Keep going after a command fails
    #[arg(long)]
    pub continue_on_error: bool,
}

/// At least one scripted line failed
#[derive(Debug, Error)]
#[error("{failed} command(s) failed")]
pub struct ScriptFailed {
    pub failed: usize,
}

/// Non-blank lines that are not `#` comments
pub fn script_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub async fn run(args: ExecArgs, router: &Router, session: &mut Session) -> Result<()> {
    let lines = match &args.script {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read script {}", path.display()))?;
            script_lines(&text)
        }
        None => args.lines.iter().flat_map(|line| script_lines(line)).collect(),
    };

    let mut failed = 0;
    for line in &lines {
        if session.exit_requested() {
            break;
        }
        if router.dispatch(session, line).await.is_err() {
            failed += 1;
            if !args.continue_on_error {
                break;
            }
        }
    }
    session.out().flush()?;

    if failed > 0 {
        return Err(ScriptFailed { failed }.into());
    }
    Ok(())
}
