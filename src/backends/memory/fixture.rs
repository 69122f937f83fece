//! Demo fixture data for the in-memory backend

use std::collections::BTreeMap;

use regex_lite::Regex;

use super::CannedResponse;
use crate::core::{Row, Rows};

/// Tables reported by the demo `osquery_registry`
const DEMO_TABLES: &[&str] = &[
    "file",
    "groups",
    "listening_ports",
    "os_version",
    "processes",
    "system_info",
    "users",
];

#[derive(Debug, Clone)]
struct Entry {
    kind: &'static str,
    size: u64,
    mode: &'static str,
}

/// Tiny virtual filesystem answering the `file` table queries
#[derive(Debug, Clone, Default)]
pub struct DemoFilesystem {
    /// Absolute paths without trailing slash, except the root itself
    entries: BTreeMap<String, Entry>,
}

impl DemoFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handful of well-known unix paths
    pub fn sample() -> Self {
        let mut fs = Self::new();
        for dir in ["/etc", "/etc/ssh", "/home", "/home/operator", "/tmp", "/var", "/var/log"] {
            fs.add_directory(dir);
        }
        fs.add_file("/etc/hosts", 220);
        fs.add_file("/etc/passwd", 1843);
        fs.add_file("/etc/ssh/sshd_config", 3289);
        fs.add_file("/home/operator/.bashrc", 3771);
        fs.add_file("/var/log/syslog", 52_114);
        fs
    }

    pub fn add_directory(&mut self, path: &str) {
        self.entries.insert(
            trim_path(path),
            Entry {
                kind: "directory",
                size: 4096,
                mode: "0755",
            },
        );
    }

    pub fn add_file(&mut self, path: &str, size: u64) {
        self.entries.insert(
            trim_path(path),
            Entry {
                kind: "regular",
                size,
                mode: "0644",
            },
        );
    }

    /// Answer `sql` if it is one of the shapes the shell issues
    pub fn answer(&self, sql: &str) -> Option<Rows> {
        let path_query =
            Regex::new(r"from file where path = '((?:[^']|'')*)' and type = 'directory'").ok()?;
        let listing_query = Regex::new(r"from file where directory = '((?:[^']|'')*)'").ok()?;

        if let Some(caps) = path_query.captures(sql) {
            let path = trim_path(&caps[1].replace("''", "'"));
            let is_dir = path == "/" || self.entries.get(&path).is_some_and(|e| e.kind == "directory");
            return Some(if is_dir {
                vec![self.row(&path, "directory", 4096, "0755")]
            } else {
                Rows::new()
            });
        }

        if let Some(caps) = listing_query.captures(sql) {
            let directory = trim_path(&caps[1].replace("''", "'"));
            let rows = self
                .entries
                .iter()
                .filter(|(path, _)| parent_of(path) == directory)
                .map(|(path, entry)| self.row(path, entry.kind, entry.size, entry.mode))
                .collect();
            return Some(rows);
        }

        if sql.contains("from osquery_registry") {
            let rows = DEMO_TABLES
                .iter()
                .map(|name| {
                    let mut row = Row::new();
                    row.insert("name".to_string(), name.to_string());
                    row
                })
                .collect();
            return Some(rows);
        }

        None
    }

    fn row(&self, path: &str, kind: &str, size: u64, mode: &str) -> Row {
        let mut row = Row::new();
        row.insert("path".to_string(), path.to_string());
        row.insert("directory".to_string(), parent_of(path));
        row.insert(
            "filename".to_string(),
            path.rsplit('/').next().unwrap_or_default().to_string(),
        );
        row.insert("type".to_string(), kind.to_string());
        row.insert("size".to_string(), size.to_string());
        row.insert("mode".to_string(), mode.to_string());
        row
    }
}

/// Canned rows for the tables a demo session usually pokes at first
pub(super) fn sample_tables() -> Vec<(&'static str, CannedResponse)> {
    let processes = [("1", "systemd", "root"), ("812", "sshd", "root"), ("2231", "bash", "operator")]
        .iter()
        .map(|(pid, name, user)| {
            let mut row = Row::new();
            row.insert("pid".to_string(), pid.to_string());
            row.insert("name".to_string(), name.to_string());
            row.insert("user".to_string(), user.to_string());
            row
        })
        .collect();

    let users = [("0", "root", "/root"), ("1000", "operator", "/home/operator")]
        .iter()
        .map(|(uid, username, directory)| {
            let mut row = Row::new();
            row.insert("uid".to_string(), uid.to_string());
            row.insert("username".to_string(), username.to_string());
            row.insert("directory".to_string(), directory.to_string());
            row
        })
        .collect();

    let mut os_version = Row::new();
    os_version.insert("name".to_string(), "Ubuntu".to_string());
    os_version.insert("version".to_string(), "22.04.4 LTS (Jammy Jellyfish)".to_string());
    os_version.insert("platform".to_string(), "ubuntu".to_string());

    vec![
        (
            "from processes",
            CannedResponse::complete(processes).with_pending_polls(1),
        ),
        ("from users", CannedResponse::complete(users)),
        ("from os_version", CannedResponse::complete(vec![os_version])),
    ]
}

fn trim_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn parent_of(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(index) => path[..index].to_string(),
    }
}
