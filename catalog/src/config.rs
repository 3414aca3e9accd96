//! Catalog configuration.
//!
//! Configuration is read from TOML. The file is looked up in this order:
//!
//! 1. The path given explicitly (`quarryd --config`)
//! 2. The TOML text in the `QUARRY_CATALOG_CONFIG` environment variable
//! 3. `$XDG_CONFIG_HOME/quarry/catalog.toml`
//!
//! If none exist, a SQLite catalog with local object storage under
//! `$XDG_DATA_HOME/quarry` is used.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use xdg::BaseDirectories;

use crate::database::RetryPolicy;
use crate::storage::LocalStorageConfig;
use quarry::hash::DEFAULT_ALGORITHM;

/// Application prefix in XDG base directories.
///
/// This will be concatenated into `$XDG_CONFIG_HOME/quarry`.
const XDG_PREFIX: &str = "quarry";

/// Environment variable holding the TOML configuration itself.
pub const ENV_CONFIG: &str = "QUARRY_CATALOG_CONFIG";

/// Configuration for the Quarry catalog.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Database connection.
    pub database: DatabaseConfig,

    /// Content storage.
    pub storage: StorageConfig,

    /// Values applied to new records when the caller leaves them out.
    #[serde(default = "Default::default")]
    pub defaults: DefaultsConfig,

    /// Batch integrity checks.
    #[serde(default = "Default::default")]
    pub integrity: IntegrityConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Connection URL.
    ///
    /// Both `sqlite://` and `postgres://` URLs are supported.
    pub url: String,

    /// Maximum number of pooled connections.
    #[serde(rename = "max-connections")]
    pub max_connections: Option<u32>,

    /// How many times a transaction is retried after hitting a lock.
    #[serde(rename = "busy-retries")]
    #[serde(default = "default_busy_retries")]
    pub busy_retries: u32,

    /// Base delay between retries. The n-th retry waits n times this long.
    #[serde(rename = "busy-backoff")]
    #[serde(with = "humantime_serde", default = "default_busy_backoff")]
    pub busy_backoff: Duration,

    /// Whether to bring the schema up to date on connect.
    #[serde(rename = "auto-migrate")]
    #[serde(default = "default_auto_migrate")]
    pub auto_migrate: bool,
}

/// Content storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum StorageConfig {
    /// Local file storage.
    #[serde(rename = "local")]
    Local(LocalStorageConfig),
}

/// Record defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Owner of new data sets.
    #[serde(default)]
    pub owner: String,

    /// Algorithm label of content hashes on new draft versions.
    #[serde(rename = "hash-algorithm")]
    #[serde(default = "default_hash_algorithm")]
    pub hash_algorithm: String,
}

/// Integrity checking configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntegrityConfig {
    /// Maximum number of versions verified at the same time.
    #[serde(default = "default_integrity_concurrency")]
    pub concurrency: usize,
}

impl Config {
    /// Returns a configuration for a SQLite catalog and a local object directory.
    pub fn for_paths(database: &Path, objects: &Path) -> Self {
        Self {
            database: DatabaseConfig::new(format!("sqlite://{}?mode=rwc", database.display())),
            storage: StorageConfig::Local(LocalStorageConfig {
                path: objects.to_owned(),
            }),
            defaults: DefaultsConfig::default(),
            integrity: IntegrityConfig::default(),
        }
    }
}

impl DatabaseConfig {
    /// Returns a configuration for the given URL with every other option at its default.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: None,
            busy_retries: default_busy_retries(),
            busy_backoff: default_busy_backoff(),
            auto_migrate: default_auto_migrate(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.busy_retries,
            backoff: self.busy_backoff,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            hash_algorithm: default_hash_algorithm(),
        }
    }
}

impl Default for IntegrityConfig {
    fn default() -> Self {
        Self {
            concurrency: default_integrity_concurrency(),
        }
    }
}

fn default_busy_retries() -> u32 {
    5
}

fn default_busy_backoff() -> Duration {
    Duration::from_millis(50)
}

fn default_auto_migrate() -> bool {
    true
}

fn default_hash_algorithm() -> String {
    DEFAULT_ALGORITHM.to_owned()
}

fn default_integrity_concurrency() -> usize {
    8
}

/// Loads the configuration, falling back to XDG defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return load_config_from_path(path);
    }

    if let Ok(s) = env::var(ENV_CONFIG) {
        return load_config_from_str(&s);
    }

    if let Some(path) = find_xdg_config_path()? {
        return load_config_from_path(&path);
    }

    let data_path = get_xdg_data_path()?;
    tracing::info!("No configuration found, using catalog under {:?}", data_path);

    Ok(Config::for_paths(
        &data_path.join("catalog.db"),
        &data_path.join("objects"),
    ))
}

pub fn load_config_from_path(path: &Path) -> Result<Config> {
    tracing::info!("Using configurations: {:?}", path);

    let config = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {:?}", path))?;
    toml::from_str(&config).context("Invalid configuration file")
}

pub fn load_config_from_str(s: &str) -> Result<Config> {
    tracing::info!("Using configurations from environment variable");
    toml::from_str(s).context("Invalid configuration")
}

pub fn find_xdg_config_path() -> Result<Option<PathBuf>> {
    let xdg_dirs = BaseDirectories::with_prefix(XDG_PREFIX)?;
    Ok(xdg_dirs.find_config_file("catalog.toml"))
}

pub fn get_xdg_data_path() -> Result<PathBuf> {
    let xdg_dirs = BaseDirectories::with_prefix(XDG_PREFIX)?;
    let data_path = xdg_dirs.create_data_directory("")?;

    Ok(data_path)
}
