//! Configuration loading and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "household-tasks.yaml";

/// Server configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub tasks: TasksConfig,
}

/// Server-specific configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Address the HTTP server binds to.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Port the HTTP server listens on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind: default_bind(),
            port: default_port(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".household-tasks/tasks.db")
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    31995
}

/// Response cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Seconds a cached response stays fresh.
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_seconds: default_cache_ttl(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    60
}

/// Task listing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Page size when the request does not give one.
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,

    /// Largest page size a request may ask for.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_page_size() -> i64 {
    20
}

fn default_max_page_size() -> i64 {
    100
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Config file in the user's config directory, if one can be determined.
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("household-tasks").join("config.yaml"))
    }

    /// Resolve configuration: explicit path, then local file, then user
    /// config dir, then defaults. Environment variables override the result.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => Self::load_or_default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Load configuration from default locations or return defaults.
    pub fn load_or_default() -> Self {
        if let Ok(config) = Self::load(LOCAL_CONFIG_FILE) {
            return config;
        }

        if let Some(path) = Self::user_config_path() {
            if path.exists() {
                match Self::load(&path) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config"),
                }
            }
        }

        Self::default()
    }

    /// Apply `HOUSEHOLD_TASKS_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(db_path) = std::env::var("HOUSEHOLD_TASKS_DB_PATH") {
            self.server.db_path = PathBuf::from(db_path);
        }

        if let Ok(port) = std::env::var("HOUSEHOLD_TASKS_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid HOUSEHOLD_TASKS_PORT"),
            }
        }
    }

    /// Page size limits clamped to what the store accepts.
    pub fn page_limits(&self) -> (i64, i64) {
        let max = self
            .tasks
            .max_page_size
            .clamp(1, crate::db::tasks::MAX_PAGE_SIZE);
        let default = self.tasks.default_page_size.clamp(1, max);
        (default, max)
    }

    /// Ensure the database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.server.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: Config = serde_yaml::from_str("server:\n  port: 8080\n").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "127.0.0.1");
        assert!(config.cache.enabled);
        assert_eq!(config.tasks.default_page_size, 20);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cache:\n  enabled: false\n  ttl_seconds: 5").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl(), Duration::from_secs(5));
    }

    #[test]
    fn load_missing_file_fails() {
        assert!(Config::load("/definitely/not/here.yaml").is_err());
    }

    #[test]
    fn page_limits_are_clamped() {
        let mut config = Config::default();
        config.tasks.max_page_size = 10_000;
        config.tasks.default_page_size = 0;
        assert_eq!(config.page_limits(), (1, 100));
    }

    #[test]
    fn ensure_db_dir_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.server.db_path = dir.path().join("nested").join("tasks.db");
        config.ensure_db_dir().unwrap();
        assert!(dir.path().join("nested").is_dir());
    }
}
