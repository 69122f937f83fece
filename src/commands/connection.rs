//! Host connection commands: .connect, .disconnect, .hosts, .discover, .switch

use std::io::Write;

use async_trait::async_trait;

use super::{arguments, complete_from, Command, CommandError, Suggestion};
use crate::core::Rows;
use crate::session::Session;

pub struct Connect;

#[async_trait]
impl Command for Connect {
    fn name(&self) -> &'static str {
        ".connect"
    }

    fn help(&self) -> &'static str {
        "Connect to a host with UUID"
    }

    async fn execute(&self, session: &mut Session, line: &str) -> Result<(), CommandError> {
        let uuid = arguments(line);
        if uuid.is_empty() {
            return Err(CommandError::Argument("host UUID required".to_string()));
        }

        let host = session.backend().check_host(uuid).await?;
        let label = format!("{} ({})", host.label(), host.uuid);
        let added = session.registry_mut().register(host);

        if added {
            writeln!(session.out(), "Connected to {}", label)?;
        } else {
            writeln!(session.out(), "Switched to {}", label)?;
        }
        Ok(())
    }
}

pub struct Disconnect;

#[async_trait]
impl Command for Disconnect {
    fn name(&self) -> &'static str {
        ".disconnect"
    }

    fn help(&self) -> &'static str {
        "Disconnect from a host with UUID, or the current host"
    }

    async fn execute(&self, session: &mut Session, line: &str) -> Result<(), CommandError> {
        let host = session.registry_mut().disconnect(arguments(line))?;
        writeln!(session.out(), "Disconnected from '{}'", host.uuid)?;
        Ok(())
    }

    fn suggest(&self, session: &Session, line: &str) -> Vec<Suggestion> {
        complete_from(
            line,
            session
                .registry()
                .list_connected()
                .iter()
                .map(|host| Suggestion::new(host.uuid.clone(), host.display_name.clone())),
        )
    }
}

pub struct Hosts;

#[async_trait]
impl Command for Hosts {
    fn name(&self) -> &'static str {
        ".hosts"
    }

    fn help(&self) -> &'static str {
        "Print all connected hosts"
    }

    async fn execute(&self, session: &mut Session, line: &str) -> Result<(), CommandError> {
        if !arguments(line).is_empty() {
            return Err(CommandError::Argument(
                "this command takes no parameters".to_string(),
            ));
        }

        let current = session.registry().current_index_opt();
        let rows: Rows = session
            .registry()
            .list_connected()
            .iter()
            .enumerate()
            .map(|(index, host)| {
                let mut row = host.summary_row();
                let marker = if current == Some(index) { "*" } else { "" };
                row.insert("Index".to_string(), format!("{}{}", index, marker));
                row
            })
            .collect();

        session.print_rows(&rows)?;
        Ok(())
    }
}

pub struct Discover;

#[async_trait]
impl Command for Discover {
    fn name(&self) -> &'static str {
        ".discover"
    }

    fn help(&self) -> &'static str {
        "Print all hosts registered with the backend"
    }

    async fn execute(&self, session: &mut Session, line: &str) -> Result<(), CommandError> {
        if !arguments(line).is_empty() {
            return Err(CommandError::Argument(
                "this command takes no parameters".to_string(),
            ));
        }

        let hosts = session.backend().list_hosts().await?;
        let rows: Rows = hosts
            .iter()
            .map(|host| {
                let mut row = host.summary_row();
                row.remove("Current Directory");
                row
            })
            .collect();

        session.print_rows(&rows)?;
        Ok(())
    }
}

pub struct Switch;

#[async_trait]
impl Command for Switch {
    fn name(&self) -> &'static str {
        ".switch"
    }

    fn help(&self) -> &'static str {
        "Make the connected host at INDEX current (see .hosts)"
    }

    async fn execute(&self, session: &mut Session, line: &str) -> Result<(), CommandError> {
        let raw = arguments(line);
        let index: usize = raw.parse().map_err(|_| {
            CommandError::Argument(format!("'{}' is not a valid host index", raw))
        })?;

        let uuid = session.registry_mut().set_current_host(index)?;
        writeln!(session.out(), "Switched to '{}'", uuid)?;
        Ok(())
    }

    fn suggest(&self, session: &Session, line: &str) -> Vec<Suggestion> {
        complete_from(
            line,
            session
                .registry()
                .list_connected()
                .iter()
                .enumerate()
                .map(|(index, host)| Suggestion::new(index.to_string(), host.uuid.clone())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::backends::MemoryBackend;
    use crate::core::Host;
    use crate::printer::PrintMode;
    use crate::session::{OutputBuffer, SessionError};
    use crate::settings::Settings;

    fn session() -> (Session, OutputBuffer) {
        let buffer = OutputBuffer::new();
        let backend = MemoryBackend::new()
            .with_host(Host::new("A").with_display_name("alpha"))
            .with_host(Host::new("B").with_display_name("beta"));
        let mut session = Session::new(Arc::new(backend), Settings::default())
            .with_output(Box::new(buffer.clone()));
        session.set_print_mode(PrintMode::Csv);
        (session, buffer)
    }

    #[tokio::test]
    async fn test_connect_registers_and_selects() {
        let (mut session, buffer) = session();
        Connect.execute(&mut session, ".connect A").await.unwrap();
        Connect.execute(&mut session, ".connect B").await.unwrap();
        Connect.execute(&mut session, ".connect A").await.unwrap();

        assert_eq!(session.registry().len(), 2);
        assert_eq!(session.registry().current_host().unwrap().uuid, "A");
        assert!(buffer.contents().contains("Switched to alpha (A)"));
    }

    #[tokio::test]
    async fn test_connect_errors() {
        let (mut session, _) = session();
        assert!(matches!(
            Connect.execute(&mut session, ".connect").await,
            Err(CommandError::Argument(_))
        ));
        assert!(matches!(
            Connect.execute(&mut session, ".connect Z").await,
            Err(CommandError::Backend(_))
        ));
        assert!(session.registry().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_current_then_switch() {
        let (mut session, _) = session();
        Connect.execute(&mut session, ".connect A").await.unwrap();
        Connect.execute(&mut session, ".connect B").await.unwrap();

        Disconnect.execute(&mut session, ".disconnect").await.unwrap();
        assert!(matches!(
            session.registry().current_host(),
            Err(SessionError::NoCursorSet)
        ));

        Switch.execute(&mut session, ".switch 0").await.unwrap();
        assert_eq!(session.registry().current_host().unwrap().uuid, "A");

        assert!(matches!(
            Switch.execute(&mut session, ".switch 5").await,
            Err(CommandError::Session(SessionError::IndexOutOfRange { .. }))
        ));
        assert!(matches!(
            Switch.execute(&mut session, ".switch x").await,
            Err(CommandError::Argument(_))
        ));
    }

    #[tokio::test]
    async fn test_hosts_marks_current() {
        let (mut session, buffer) = session();
        Connect.execute(&mut session, ".connect A").await.unwrap();
        Connect.execute(&mut session, ".connect B").await.unwrap();
        buffer.clear();

        Hosts.execute(&mut session, ".hosts").await.unwrap();
        let out = buffer.contents();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines[0],
            "Current Directory,Index,Name,Platform,UUID,Username,Version"
        );
        assert_eq!(lines[1], "/,0,alpha,,A,,");
        assert_eq!(lines[2], "/,1*,beta,,B,,");
    }

    #[tokio::test]
    async fn test_discover_lists_backend_hosts() {
        let (mut session, buffer) = session();
        Discover.execute(&mut session, ".discover").await.unwrap();
        let out = buffer.contents();
        assert!(out.starts_with("Name,Platform,UUID,Username,Version\n"));
        assert_eq!(out.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_disconnect_suggests_connected_hosts() {
        let (mut session, _) = session();
        Connect.execute(&mut session, ".connect A").await.unwrap();
        Connect.execute(&mut session, ".connect B").await.unwrap();

        let all = Disconnect.suggest(&session, ".disconnect ");
        assert_eq!(all.len(), 2);
        let filtered = Disconnect.suggest(&session, ".disconnect B");
        assert_eq!(filtered, vec![Suggestion::new("B", "beta")]);
    }
}
