// Configuration: YAML file, store location, backend selection

use crate::backend::{Backend, MemoryBackend};
use crate::file::FileBackend;
use crate::sqlite::SqliteBackend;
use crate::store::DEFAULT_SLOT;
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, debug};

const APP_DIR: &str = "taskboard";
const CONFIG_FILE_NAME: &str = "config.yaml";
const DATABASE_FILE_NAME: &str = "taskboard.db";

/// Overrides the configured store path
pub const STORE_PATH_ENV: &str = "TASKBOARD_STORE_PATH";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// One JSON file per slot under the store path
    #[default]
    File,
    /// `taskboard.db` under the store path
    Sqlite,
    /// Nothing survives the process
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub backend: BackendKind,
    pub store_path: Option<PathBuf>,
    pub slot: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            store_path: None,
            slot: DEFAULT_SLOT.to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// `<config dir>/taskboard/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
    }

    /// Load from an explicit path, or from the default location if present
    ///
    /// An explicit path must exist; a missing default file means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => {
                    debug!("No config file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let content = fs::read_to_string(&path).with_context(|| format!("Failed to read config {}", path.display()))?;
        let config = Self::from_yaml(&content).with_context(|| format!("Invalid config {}", path.display()))?;
        debug!(path = ?path, ?config, "Loaded config");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).context("Failed to parse YAML")
    }

    /// Store directory: flag, then environment, then config, then the data dir
    pub fn resolve_store_path(&self, flag: Option<&Path>, env: Option<&str>) -> Result<PathBuf> {
        if let Some(path) = flag {
            return Ok(path.to_path_buf());
        }
        if let Some(path) = env.map(str::trim).filter(|p| !p.is_empty()) {
            return Ok(expand_home(Path::new(path)));
        }
        if let Some(path) = &self.store_path {
            return Ok(expand_home(path));
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR))
            .ok_or_else(|| eyre!("Cannot determine a data directory; pass --store-path"))
    }

    /// Store directory as seen from the current process environment
    pub fn store_path(&self, flag: Option<&Path>) -> Result<PathBuf> {
        let env = std::env::var(STORE_PATH_ENV).ok();
        self.resolve_store_path(flag, env.as_deref())
    }

    pub fn open_backend(&self, store_path: &Path) -> Result<Box<dyn Backend>> {
        let backend: Box<dyn Backend> = match self.backend {
            BackendKind::File => Box::new(FileBackend::open(store_path)?),
            BackendKind::Sqlite => Box::new(SqliteBackend::open(store_path.join(DATABASE_FILE_NAME))?),
            BackendKind::Memory => Box::new(MemoryBackend::new()),
        };
        Ok(backend)
    }

    pub fn log_level(&self) -> Result<Level> {
        self.log_level
            .parse()
            .map_err(|_| eyre!("Invalid log level: {} (expected error, warn, info, debug or trace)", self.log_level))
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.backend, BackendKind::File);
        assert_eq!(config.slot, "tasks");
        assert_eq!(config.log_level().unwrap(), Level::WARN);
        assert!(config.store_path.is_none());
    }

    #[test]
    fn test_from_yaml() {
        let config = Config::from_yaml("backend: sqlite\nstore_path: /tmp/tb\nslot: work\nlog_level: debug\n").unwrap();
        assert_eq!(config.backend, BackendKind::Sqlite);
        assert_eq!(config.store_path, Some(PathBuf::from("/tmp/tb")));
        assert_eq!(config.slot, "work");
        assert_eq!(config.log_level().unwrap(), Level::DEBUG);
    }

    #[test]
    fn test_from_yaml_partial_and_empty() {
        let config = Config::from_yaml("slot: home\n").unwrap();
        assert_eq!(config.backend, BackendKind::File);
        assert_eq!(config.slot, "home");

        assert_eq!(Config::from_yaml("").unwrap(), Config::default());
    }

    #[test]
    fn test_from_yaml_rejects_unknown() {
        assert!(Config::from_yaml("backend: postgres\n").is_err());
        assert!(Config::from_yaml("colour: red\n").is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let config = Config {
            log_level: "loud".to_string(),
            ..Config::default()
        };
        assert!(config.log_level().is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "backend: memory\n").unwrap();

        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.backend, BackendKind::Memory);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let temp = TempDir::new().unwrap();
        assert!(Config::load(Some(temp.path().join("absent.yaml").as_path())).is_err());
    }

    #[test]
    fn test_store_path_precedence() {
        let config = Config {
            store_path: Some(PathBuf::from("/from/config")),
            ..Config::default()
        };

        let flag = Path::new("/from/flag");
        assert_eq!(config.resolve_store_path(Some(flag), Some("/from/env")).unwrap(), flag);
        assert_eq!(
            config.resolve_store_path(None, Some("/from/env")).unwrap(),
            PathBuf::from("/from/env")
        );
        assert_eq!(
            config.resolve_store_path(None, Some("  ")).unwrap(),
            PathBuf::from("/from/config")
        );
        assert_eq!(
            config.resolve_store_path(None, None).unwrap(),
            PathBuf::from("/from/config")
        );
    }

    #[test]
    fn test_open_backends() {
        let temp = TempDir::new().unwrap();

        for backend in [BackendKind::File, BackendKind::Sqlite, BackendKind::Memory] {
            let config = Config {
                backend,
                ..Config::default()
            };
            let mut opened = config.open_backend(temp.path()).unwrap();
            opened.replace("tasks", "[]").unwrap();
            assert_eq!(opened.read("tasks").unwrap().as_deref(), Some("[]"));
        }

        assert!(temp.path().join("tasks.json").exists());
        assert!(temp.path().join("taskboard.db").exists());
    }
}
