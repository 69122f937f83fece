//! Diagnostics for the shell
//!
//! Diagnostics go to stderr so result tables on stdout stay clean. The
//! filter is built from directives: `--verbose` turns on debug output for
//! osqsh, otherwise `RUST_LOG` is honoured when set. The line editor and
//! HTTP stack stay at `warn` unless a directive names them.

use std::io::IsTerminal;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_LEVEL: &str = "warn";

/// Dependencies that are chatty at debug level
const QUIET_DEPENDENCIES: &[&str] = &["rustyline", "hyper", "hyper_util", "reqwest", "rustls"];

/// Filter directives for a run. `env` is the raw `RUST_LOG` value.
fn filter_directives(verbose: bool, env: Option<&str>) -> String {
    let base = match env.map(str::trim).filter(|v| !v.is_empty()) {
        Some(custom) if !verbose => custom.to_string(),
        _ if verbose => format!("{},osqsh=debug", DEFAULT_LEVEL),
        _ => DEFAULT_LEVEL.to_string(),
    };

    let mut directives = vec![base.clone()];
    for dependency in QUIET_DEPENDENCIES {
        if !base.contains(dependency) {
            directives.push(format!("{}={}", dependency, DEFAULT_LEVEL));
        }
    }
    directives.join(",")
}

/// Install the global subscriber. Text output uses colour only on a terminal.
pub fn init(verbose: bool, json: bool) -> anyhow::Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directives = filter_directives(verbose, env.as_deref());
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("Ignoring invalid log filter '{}': {}", directives, e);
        EnvFilter::new(DEFAULT_LEVEL)
    });

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(std::io::stderr().is_terminal())
                    .with_target(verbose),
            )
            .try_init()?;
    }

    tracing::debug!(%directives, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(
            filter_directives(false, None),
            "warn,rustyline=warn,hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn"
        );
        assert_eq!(filter_directives(false, Some("  ")), filter_directives(false, None));
    }

    #[test]
    fn test_verbose_overrides_env() {
        let directives = filter_directives(true, Some("trace"));
        assert!(directives.starts_with("warn,osqsh=debug,"));
        assert!(directives.contains("reqwest=warn"));
    }

    #[test]
    fn test_env_directive_kept_and_named_crates_left_alone() {
        let directives = filter_directives(false, Some("osqsh=trace,reqwest=debug"));
        assert!(directives.starts_with("osqsh=trace,reqwest=debug,"));
        assert!(!directives.contains("reqwest=warn"));
        assert!(directives.contains("rustyline=warn"));
    }

    #[test]
    fn test_directives_parse() {
        for (verbose, env) in [(false, None), (true, None), (false, Some("debug"))] {
            assert!(EnvFilter::try_new(filter_directives(verbose, env)).is_ok());
        }
    }
}
