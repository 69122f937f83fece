//! osqueryi runner
//!
//! Executes one SQL statement through the `osqueryi --json` shell with
//! output capture and a hard timeout. The child runs on a blocking task;
//! stdout and stderr are drained on helper threads so a chatty child
//! cannot fill its pipes and stall.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::core::{BackendError, Row, Rows};

const POLL_STEP: Duration = Duration::from_millis(20);

/// Locates and runs the osqueryi binary
#[derive(Debug, Clone)]
pub struct OsqueryRunner {
    binary: PathBuf,
    timeout: Duration,
}

impl OsqueryRunner {
    /// Resolve `binary` as a path or through `PATH`
    pub fn locate(binary: &str, timeout: Duration) -> Result<Self, BackendError> {
        let binary = if Path::new(binary).exists() {
            PathBuf::from(binary)
        } else {
            which::which(binary).map_err(|_| {
                BackendError::Process(format!(
                    "binary '{}' not found. Install osquery or set backend.osqueryiPath",
                    binary
                ))
            })?
        };
        Ok(Self { binary, timeout })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run a statement and parse the JSON rows
    pub fn run(&self, sql: &str) -> Result<Rows, BackendError> {
        let mut child = Command::new(&self.binary)
            .arg("--json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BackendError::Process(format!("failed to launch osqueryi: {}", e)))?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        if let Some(mut stdin) = child.stdin.take() {
            let statement = terminate_statement(sql);
            stdin
                .write_all(statement.as_bytes())
                .map_err(|e| BackendError::Process(format!("failed to send query: {}", e)))?;
        }

        let deadline = Instant::now() + self.timeout;
        let status: ExitStatus = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(BackendError::Process(format!(
                        "osqueryi timed out after {}s",
                        self.timeout.as_secs()
                    )));
                }
                Ok(None) => std::thread::sleep(POLL_STEP),
                Err(e) => return Err(BackendError::Process(e.to_string())),
            }
        };

        let stdout = join(stdout);
        let stderr = join(stderr);
        if !stderr.trim().is_empty() {
            tracing::debug!("osqueryi stderr: {}", stderr.trim());
        }

        if !status.success() {
            let detail = if stderr.trim().is_empty() {
                status.to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(BackendError::Process(format!("osqueryi error: {}", detail)));
        }

        parse_rows(&stdout).map_err(|e| {
            if stderr.trim().is_empty() {
                e
            } else {
                BackendError::Process(format!("osqueryi error: {}", stderr.trim()))
            }
        })
    }

    /// Run on the blocking pool
    pub async fn run_async(&self, sql: &str) -> Result<Rows, BackendError> {
        let runner = self.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || runner.run(&sql))
            .await
            .map_err(|e| BackendError::Process(e.to_string()))?
    }
}

fn terminate_statement(sql: &str) -> String {
    let trimmed = sql.trim();
    if trimmed.ends_with(';') {
        format!("{}\n", trimmed)
    } else {
        format!("{};\n", trimmed)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = pipe.read_to_string(&mut buf);
            buf
        })
    })
}

fn join(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Parse `osqueryi --json` output. Newer builds emit typed numbers; every
/// value is flattened back to its string form.
pub fn parse_rows(stdout: &str) -> Result<Rows, BackendError> {
    if stdout.trim().is_empty() {
        return Ok(Rows::new());
    }

    let raw: Vec<serde_json::Map<String, Value>> = serde_json::from_str(stdout)
        .map_err(|e| BackendError::Parse(format!("osqueryi json: {}", e)))?;

    Ok(raw
        .into_iter()
        .map(|object| {
            object
                .into_iter()
                .map(|(key, value)| {
                    let value = match value {
                        Value::String(s) => s,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    (key, value)
                })
                .collect::<Row>()
        })
        .collect())
}
