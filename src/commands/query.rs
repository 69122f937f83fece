//! Query commands: .query, .schedule, .resume, .history, .tables

use std::collections::BTreeSet;
use std::io::Write;

use async_trait::async_trait;

use super::{arguments, complete_from, current_uuid, Command, CommandError, Suggestion};
use crate::core::QueryStatus;
use crate::session::Session;

/// Lists every table the osquery instance exposes
pub const TABLES_QUERY: &str = "select name from osquery_registry where registry = 'table'";

fn required_sql(line: &str) -> Result<&str, CommandError> {
    let sql = arguments(line);
    if sql.is_empty() {
        return Err(CommandError::Argument(
            "a query to run must be provided".to_string(),
        ));
    }
    Ok(sql)
}

fn history_suggestions(session: &Session, line: &str) -> Vec<Suggestion> {
    let Ok(host) = session.registry().current_host() else {
        return Vec::new();
    };
    complete_from(
        line,
        host.query_history
            .iter()
            .map(|query| Suggestion::new(query.name.clone(), query.sql.clone())),
    )
}

fn table_suggestions(session: &Session, line: &str) -> Vec<Suggestion> {
    let Ok(host) = session.registry().current_host() else {
        return Vec::new();
    };
    // only complete the word after the last `from`
    let args = arguments(line);
    let Some(index) = args.rfind("from ") else {
        return Vec::new();
    };
    let partial = args[index + 5..].trim_start();
    if partial.contains(char::is_whitespace) {
        return Vec::new();
    }
    host.tables
        .iter()
        .filter(|table| table.starts_with(partial))
        .map(|table| Suggestion::new(table.clone(), "table"))
        .collect()
}

pub struct RunQuery;

#[async_trait]
impl Command for RunQuery {
    fn name(&self) -> &'static str {
        ".query"
    }

    fn help(&self) -> &'static str {
        "Run a query on the current host and wait for the results"
    }

    async fn execute(&self, session: &mut Session, line: &str) -> Result<(), CommandError> {
        let uuid = current_uuid(session)?;
        let sql = required_sql(line)?;

        match session.run_query(&uuid, sql).await {
            Ok(results) => {
                session.print_rows(&results.rows)?;
                if !results.status.is_complete() {
                    writeln!(
                        session.out(),
                        "Query {} finished with status '{}'",
                        results.query_name,
                        results.status
                    )?;
                }
                Ok(())
            }
            Err(e) => {
                let e = CommandError::from(e);
                if let CommandError::Cancelled { partial, .. } = &e {
                    session.print_rows(partial)?;
                }
                Err(e)
            }
        }
    }

    fn suggest(&self, session: &Session, line: &str) -> Vec<Suggestion> {
        table_suggestions(session, line)
    }
}

pub struct Schedule;

#[async_trait]
impl Command for Schedule {
    fn name(&self) -> &'static str {
        ".schedule"
    }

    fn help(&self) -> &'static str {
        "Schedule a query on the current host but don't wait for results"
    }

    async fn execute(&self, session: &mut Session, line: &str) -> Result<(), CommandError> {
        let uuid = current_uuid(session)?;
        let sql = required_sql(line)?;

        let query_name = session.schedule_query(&uuid, sql).await?;
        writeln!(
            session.out(),
            "Scheduled query for host. Resume with name: {}",
            query_name
        )?;
        Ok(())
    }

    fn suggest(&self, session: &Session, line: &str) -> Vec<Suggestion> {
        table_suggestions(session, line)
    }
}

pub struct Resume;

#[async_trait]
impl Command for Resume {
    fn name(&self) -> &'static str {
        ".resume"
    }

    fn help(&self) -> &'static str {
        "Fetch results for a scheduled query without blocking"
    }

    async fn execute(&self, session: &mut Session, line: &str) -> Result<(), CommandError> {
        let query_name = arguments(line);
        if query_name.is_empty() {
            return Err(CommandError::Argument(
                "a query name to resume must be provided".to_string(),
            ));
        }

        let (rows, status) = session.fetch_once(query_name).await?;
        match status {
            QueryStatus::Pending => Err(CommandError::Argument(
                "query does not have results available yet".to_string(),
            )),
            QueryStatus::Complete => {
                session.print_rows(&rows)?;
                Ok(())
            }
            QueryStatus::Failed(_) => {
                session.print_rows(&rows)?;
                writeln!(
                    session.out(),
                    "Query {} finished with status '{}'",
                    query_name,
                    status
                )?;
                Ok(())
            }
        }
    }

    fn suggest(&self, session: &Session, line: &str) -> Vec<Suggestion> {
        history_suggestions(session, line)
    }
}

pub struct History;

#[async_trait]
impl Command for History {
    fn name(&self) -> &'static str {
        ".history"
    }

    fn help(&self) -> &'static str {
        "Print the current host's query history from this session"
    }

    async fn execute(&self, session: &mut Session, line: &str) -> Result<(), CommandError> {
        if !arguments(line).is_empty() {
            return Err(CommandError::Argument(
                "this command takes no parameters".to_string(),
            ));
        }

        let entries: Vec<String> = session
            .registry()
            .current_host()?
            .query_history
            .iter()
            .map(|query| format!("{}: {}", query.name, query.sql))
            .collect();

        let out = session.out();
        writeln!(out, "Query Name : Query")?;
        for entry in entries {
            writeln!(out, "{}", entry)?;
        }
        Ok(())
    }
}

pub struct Tables;

#[async_trait]
impl Command for Tables {
    fn name(&self) -> &'static str {
        ".tables"
    }

    fn help(&self) -> &'static str {
        "Discover and list the tables available on the current host"
    }

    async fn execute(&self, session: &mut Session, line: &str) -> Result<(), CommandError> {
        if !arguments(line).is_empty() {
            return Err(CommandError::Argument(
                "this command takes no parameters".to_string(),
            ));
        }

        let uuid = current_uuid(session)?;
        let results = session.run_query(&uuid, TABLES_QUERY).await?;
        let tables: BTreeSet<String> = results
            .rows
            .iter()
            .filter_map(|row| row.get("name").cloned())
            .collect();

        tracing::debug!(uuid = %uuid, count = tables.len(), "discovered tables");
        session.registry_mut().set_host_tables(&uuid, tables.clone());

        let out = session.out();
        for table in &tables {
            writeln!(out, "{}", table)?;
        }
        Ok(())
    }
}
