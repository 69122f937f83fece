//! Shell settings
//!
//! Loaded from `~/.osqsh/config.json` unless a path is given. Files with a
//! `.toml` extension are read as TOML, anything else as JSON. Every key is
//! optional.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aliases::{Alias, AliasTable};
use crate::backends::{goserver, osqueryi};
use crate::core::{BackendError, DriverId};
use crate::printer::PrintMode;
use crate::query::DEFAULT_POLL_INTERVAL;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to serialize settings: {0}")]
    Serialize(String),

    #[error("could not determine home directory")]
    NoHomeDir,
}

/// Connection options shared by the backend drivers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendSettings {
    /// goserver base URL
    pub base_url: String,

    /// Per-request timeout for remote calls and local osqueryi runs
    pub timeout_secs: u64,

    /// Accept invalid TLS certificates
    pub insecure_tls: bool,

    /// osqueryi binary name or path
    pub osqueryi_path: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: goserver::DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
            insecure_tls: false,
            osqueryi_path: osqueryi::DEFAULT_BINARY.to_string(),
        }
    }
}

/// Shell settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub debug_enabled: bool,

    /// Backend driver name, see `DriverId::from_cli_name`
    pub api_driver: String,

    pub print_mode: PrintMode,

    pub experimental: bool,

    pub aliases: BTreeMap<String, Alias>,

    /// Delay between result polls while waiting on a query
    pub poll_interval_ms: u64,

    /// Override for `~/.osqsh/history`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_file: Option<PathBuf>,

    pub backend: BackendSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let mut aliases = BTreeMap::new();
        aliases.insert(
            ".all".to_string(),
            Alias::new(".all", ".query select * from $#")
                .with_description("Select everything from a table"),
        );

        Self {
            debug_enabled: false,
            api_driver: DriverId::Memory.cli_name().to_string(),
            print_mode: PrintMode::default(),
            experimental: false,
            aliases,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            history_file: None,
            backend: BackendSettings::default(),
        }
    }
}

impl Settings {
    /// `~/.osqsh/config.json`
    pub fn default_path() -> Result<PathBuf, SettingsError> {
        dirs::home_dir()
            .map(|home| home.join(".osqsh").join("config.json"))
            .ok_or(SettingsError::NoHomeDir)
    }

    /// Load from `explicit`, or the default path if it exists, or defaults.
    /// An explicit path must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, SettingsError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        match Self::default_path() {
            Ok(path) if path.exists() => Self::load_from(&path),
            Ok(path) => {
                tracing::debug!("no settings at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let settings = if is_toml(path) {
            toml::from_str(&content).map_err(|e| SettingsError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        } else {
            serde_json::from_str(&content).map_err(|e| SettingsError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
        };

        tracing::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Write to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let content = if is_toml(path) {
            toml::to_string_pretty(self).map_err(|e| SettingsError::Serialize(e.to_string()))?
        } else {
            serde_json::to_string_pretty(self)
                .map_err(|e| SettingsError::Serialize(e.to_string()))?
        };

        let write_err = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, content).map_err(write_err)
    }

    /// Validated alias table plus one message per dropped alias
    pub fn alias_table(&self) -> (AliasTable, Vec<String>) {
        AliasTable::from_definitions(&self.aliases)
    }

    pub fn driver(&self) -> Result<DriverId, BackendError> {
        DriverId::from_cli_name(&self.api_driver)
            .ok_or_else(|| BackendError::UnknownDriver(self.api_driver.clone()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs.max(1))
    }

    /// Resolved history file location
    pub fn history_path(&self) -> Option<PathBuf> {
        self.history_file
            .clone()
            .or_else(|| crate::history::FileHistory::default_path().ok())
    }
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.print_mode, PrintMode::Pretty);
        assert_eq!(settings.driver().unwrap(), DriverId::Memory);
        assert_eq!(settings.poll_interval(), Duration::from_secs(1));
        assert_eq!(settings.aliases[".all"].command, ".query select * from $#");
    }

    #[test]
    fn test_json_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "debugEnabled": true,
                "apiDriver": "mock",
                "printMode": "line",
                "aliases": {
                    ".procs": {"command": ".query select * from processes", "description": "all processes"}
                },
                "pollIntervalMs": 250,
                "backend": {"baseUrl": "https://fleet:8001", "insecureTls": true}
            }"#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert!(settings.debug_enabled);
        assert_eq!(settings.driver().unwrap(), DriverId::Goserver);
        assert_eq!(settings.print_mode, PrintMode::Line);
        assert_eq!(settings.poll_interval(), Duration::from_millis(250));
        assert_eq!(settings.backend.base_url, "https://fleet:8001");
        assert!(settings.backend.insecure_tls);
        assert_eq!(settings.backend.timeout_secs, 10);

        let (table, rejected) = settings.alias_table();
        assert!(rejected.is_empty());
        assert_eq!(table.resolve(".procs").unwrap().description, "all processes");
    }

    #[test]
    fn test_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "apiDriver = \"osqueryi\"\nprintMode = \"csv\"\n\n[aliases.\".p\"]\ncommand = \".query select 1\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.driver().unwrap(), DriverId::Osqueryi);
        assert_eq!(settings.print_mode, PrintMode::Csv);
        assert!(settings.aliases.contains_key(".p"));
    }

    #[test]
    fn test_invalid_aliases_dropped() {
        let mut settings = Settings::default();
        settings.aliases.insert(
            "bad name".to_string(),
            Alias::new("bad name", ".hosts"),
        );
        settings.aliases.insert(".a".to_string(), Alias::new(".a", ".b"));
        settings.aliases.insert(".b".to_string(), Alias::new(".b", ".a"));

        let (table, rejected) = settings.alias_table();
        assert_eq!(rejected.len(), 3);
        assert_eq!(table.len(), 1);
        assert!(table.resolve(".all").is_some());
    }

    #[test]
    fn test_unknown_driver() {
        let settings = Settings {
            api_driver: "uptycs".to_string(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.driver(),
            Err(BackendError::UnknownDriver(name)) if name == "uptycs"
        ));
    }

    #[test]
    fn test_parse_error_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Settings::load(Some(&path)),
            Err(SettingsError::Parse { .. })
        ));
        assert!(matches!(
            Settings::load(Some(&dir.path().join("missing.json"))),
            Err(SettingsError::Read { .. })
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.json");
        let settings = Settings {
            print_mode: PrintMode::Json,
            ..Settings::default()
        };
        settings.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"printMode\": \"json\""));
        assert!(!content.contains("historyFile"));
        let reloaded = Settings::load_from(&path).unwrap();
        assert_eq!(reloaded.print_mode, PrintMode::Json);
        assert_eq!(reloaded.backend, settings.backend);
        assert_eq!(reloaded.aliases[".all"].command, settings.aliases[".all"].command);
    }
}
