//! Remote filesystem navigation: cd, ls
//!
//! Paths are resolved against the current host's directory and normalized
//! to an absolute, `/`-terminated form before any query is issued.

use async_trait::async_trait;

use super::{arguments, current_uuid, Command, CommandError};
use crate::session::Session;

/// Resolve `requested` against `current` and normalize `.`, `..` and
/// repeated separators. The result always starts and ends with `/`.
pub fn resolve_directory(current: &str, requested: &str) -> String {
    let joined = if requested.starts_with('/') {
        requested.to_string()
    } else {
        format!("{}/{}", current, requested)
    };

    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", parts.join("/"))
    }
}

/// Single-quoted SQL string literal
fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn verification_query(directory: &str) -> String {
    format!(
        "select * from file where path = {} and type = 'directory'",
        quote_literal(directory)
    )
}

fn listing_query(directory: &str) -> String {
    format!("select * from file where directory = {}", quote_literal(directory))
}

pub struct ChangeDirectory;

#[async_trait]
impl Command for ChangeDirectory {
    fn name(&self) -> &'static str {
        "cd"
    }

    fn help(&self) -> &'static str {
        "Change directories on the current host"
    }

    async fn execute(&self, session: &mut Session, line: &str) -> Result<(), CommandError> {
        let uuid = current_uuid(session)?;
        let requested = arguments(line);
        if requested.is_empty() {
            return Err(CommandError::Argument(
                "directory must be provided".to_string(),
            ));
        }

        let current = session.registry().current_host()?.current_directory.clone();
        let directory = resolve_directory(&current, requested);

        let results = session.run_query(&uuid, &verification_query(&directory)).await?;
        if results.rows.len() != 1 {
            return Err(CommandError::Argument(format!(
                "no such directory: {}",
                directory
            )));
        }

        session.registry_mut().set_current_directory(&directory)?;
        Ok(())
    }
}

pub struct ListDirectory;

#[async_trait]
impl Command for ListDirectory {
    fn name(&self) -> &'static str {
        "ls"
    }

    fn help(&self) -> &'static str {
        "List the files in a directory on the current host"
    }

    async fn execute(&self, session: &mut Session, line: &str) -> Result<(), CommandError> {
        let uuid = current_uuid(session)?;
        let requested = match arguments(line) {
            "" => ".",
            path => path,
        };

        let current = session.registry().current_host()?.current_directory.clone();
        let directory = resolve_directory(&current, requested);

        let results = session.run_query(&uuid, &listing_query(&directory)).await?;
        session.print_rows(&results.rows)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::backends::memory::{DemoFilesystem, MemoryBackend};
    use crate::core::Host;
    use crate::printer::PrintMode;
    use crate::session::OutputBuffer;
    use crate::settings::Settings;

    fn session() -> (Session, OutputBuffer, Arc<MemoryBackend>) {
        let buffer = OutputBuffer::new();
        let backend = Arc::new(
            MemoryBackend::new()
                .with_host(Host::new("ABCD"))
                .with_filesystem(DemoFilesystem::sample()),
        );
        let settings = Settings {
            print_mode: PrintMode::Csv,
            ..Settings::default()
        };
        let mut session =
            Session::new(backend.clone(), settings).with_output(Box::new(buffer.clone()));
        session.registry_mut().register(Host::new("ABCD"));
        (session, buffer, backend)
    }

    fn current_dir(session: &Session) -> String {
        session
            .registry()
            .current_host()
            .unwrap()
            .current_directory
            .clone()
    }

    #[test]
    fn test_resolve_directory() {
        assert_eq!(resolve_directory("/", "etc"), "/etc/");
        assert_eq!(resolve_directory("/etc/", "ssh"), "/etc/ssh/");
        assert_eq!(resolve_directory("/etc/ssh/", ".."), "/etc/");
        assert_eq!(resolve_directory("/etc/", "/var//log/"), "/var/log/");
        assert_eq!(resolve_directory("/etc/", "./../../.."), "/");
        assert_eq!(resolve_directory("/home/", "."), "/home/");
    }

    #[tokio::test]
    async fn test_cd_verifies_directory() {
        let (mut session, _, backend) = session();

        ChangeDirectory.execute(&mut session, "cd etc").await.unwrap();
        assert_eq!(current_dir(&session), "/etc/");
        assert_eq!(
            backend.scheduled_sql()[0],
            "select * from file where path = '/etc/' and type = 'directory'"
        );

        ChangeDirectory.execute(&mut session, "cd ssh").await.unwrap();
        ChangeDirectory.execute(&mut session, "cd ../..").await.unwrap();
        assert_eq!(current_dir(&session), "/");
    }

    #[tokio::test]
    async fn test_cd_rejects_missing_directory() {
        let (mut session, _, _) = session();
        let err = ChangeDirectory
            .execute(&mut session, "cd /nope")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no such directory: /nope/");
        assert_eq!(current_dir(&session), "/");

        assert!(matches!(
            ChangeDirectory.execute(&mut session, "cd").await,
            Err(CommandError::Argument(_))
        ));
    }

    #[tokio::test]
    async fn test_quotes_in_paths_are_escaped() {
        let buffer = OutputBuffer::new();
        let mut fs = DemoFilesystem::sample();
        fs.add_directory("/home/operator/it's here");
        fs.add_file("/home/operator/it's here/notes.txt", 12);
        let backend = Arc::new(
            MemoryBackend::new()
                .with_host(Host::new("ABCD"))
                .with_filesystem(fs),
        );
        let settings = Settings {
            print_mode: PrintMode::Csv,
            ..Settings::default()
        };
        let mut session =
            Session::new(backend.clone(), settings).with_output(Box::new(buffer.clone()));
        session.registry_mut().register(Host::new("ABCD"));

        ChangeDirectory
            .execute(&mut session, "cd /home/operator/it's here")
            .await
            .unwrap();
        assert_eq!(current_dir(&session), "/home/operator/it's here/");
        assert_eq!(
            backend.scheduled_sql()[0],
            "select * from file where path = '/home/operator/it''s here/' and type = 'directory'"
        );

        ListDirectory.execute(&mut session, "ls").await.unwrap();
        assert_eq!(
            backend.scheduled_sql().last().unwrap(),
            "select * from file where directory = '/home/operator/it''s here/'"
        );
        assert!(buffer.contents().contains("notes.txt"));

        let err = ChangeDirectory
            .execute(&mut session, "cd /x' or '1'='1")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "no such directory: /x' or '1'='1/");
    }

    #[tokio::test]
    async fn test_ls_lists_current_directory() {
        let (mut session, buffer, backend) = session();
        ChangeDirectory.execute(&mut session, "cd /etc").await.unwrap();

        ListDirectory.execute(&mut session, "ls").await.unwrap();
        assert_eq!(
            backend.scheduled_sql().last().unwrap(),
            "select * from file where directory = '/etc/'"
        );
        let out = buffer.contents();
        assert!(out.starts_with("directory,filename,mode,path,size,type\n"));
        assert!(out.contains("/etc,hosts,0644,/etc/hosts,220,regular"));

        buffer.clear();
        ListDirectory.execute(&mut session, "ls ssh").await.unwrap();
        assert!(buffer.contents().contains("sshd_config"));
    }
}
