//! Configuration for tunevfs.
//!
//! Loaded from `$XDG_CONFIG_HOME/tunevfs/config.toml`. Every field has a
//! default, so a missing file or a partial one is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogTtls;
use crate::paths;
use crate::vfs::DEFAULT_CACHE_CAPACITY;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VfsConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Resolved objects kept in the LRU cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How long a poll waits for a new operation before registering it.
    #[serde(default = "default_one_second")]
    pub sync_wait_ms: u64,

    /// Period of "new data may be available" notifications.
    #[serde(default = "default_one_second")]
    pub notify_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_one_second")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Catalog cache database. Defaults to `$XDG_CACHE_HOME/tunevfs/catalogs.db`.
    #[serde(default)]
    pub database: Option<PathBuf>,

    #[serde(default = "default_week_hours")]
    pub scopes_ttl_hours: i64,

    #[serde(default = "default_day_hours")]
    pub albums_ttl_hours: i64,

    #[serde(default = "default_week_hours")]
    pub details_ttl_hours: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// JSON manifest served as the `archive:` catalog.
    #[serde(default)]
    pub manifest: Option<PathBuf>,
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_one_second() -> u64 {
    1_000
}

fn default_week_hours() -> i64 {
    7 * 24
}

fn default_day_hours() -> i64 {
    24
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sync_wait_ms: default_one_second(),
            notify_interval_ms: default_one_second(),
        }
    }
}

impl SchedulerConfig {
    pub fn sync_wait(&self) -> Duration {
        Duration::from_millis(self.sync_wait_ms)
    }

    pub fn notify_interval(&self) -> Duration {
        Duration::from_millis(self.notify_interval_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_one_second(),
        }
    }
}

impl ClientConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database: None,
            scopes_ttl_hours: default_week_hours(),
            albums_ttl_hours: default_day_hours(),
            details_ttl_hours: default_week_hours(),
        }
    }
}

impl CacheConfig {
    pub fn database_path(&self) -> PathBuf {
        self.database.clone().unwrap_or_else(paths::catalog_db)
    }

    pub fn ttls(&self) -> CatalogTtls {
        CatalogTtls {
            scopes: TimeDelta::hours(self.scopes_ttl_hours),
            albums: TimeDelta::hours(self.albums_ttl_hours),
            details: TimeDelta::hours(self.details_ttl_hours),
        }
    }
}

impl VfsConfig {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if !path.exists() {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn config_path() -> PathBuf {
        paths::config_file()
    }
}
