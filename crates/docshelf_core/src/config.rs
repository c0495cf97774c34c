//! Engine configuration.

use crate::error::{CoreError, CoreResult};
use std::path::PathBuf;

/// Environment variable naming the database.
pub const ENV_DB_NAME: &str = "DOCSHELF_DB_NAME";
/// Environment variable holding the schema version.
pub const ENV_DB_VERSION: &str = "DOCSHELF_DB_VERSION";
/// Environment variable holding the data directory.
pub const ENV_DATA_DIR: &str = "DOCSHELF_DATA_DIR";

/// Default for [`Config::auto_compact_bytes`].
pub const DEFAULT_AUTO_COMPACT_BYTES: u64 = 1 << 20;

/// Configuration for opening an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Database name. Also the directory name under `data_dir`.
    pub name: String,

    /// Schema version requested by the caller. Must be at least 1.
    pub version: u32,

    /// Parent directory of the database. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,

    /// Whether to fsync the commit log after every batch.
    pub sync_on_commit: bool,

    /// Page size used by `search` when the caller passes none.
    pub default_rows: u32,

    /// Dead commit-log bytes that trigger a compaction, checked on open and
    /// after every write. The log must also hold more dead bytes than live
    /// ones. `None` compacts only on request.
    pub auto_compact_bytes: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "docshelf".to_string(),
            version: 1,
            data_dir: None,
            sync_on_commit: true,
            default_rows: 30,
            auto_compact_bytes: Some(DEFAULT_AUTO_COMPACT_BYTES),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the database name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the schema version.
    #[must_use]
    pub const fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Sets the data directory.
    #[must_use]
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Keeps the database in memory.
    #[must_use]
    pub fn in_memory(mut self) -> Self {
        self.data_dir = None;
        self
    }

    /// Sets whether to sync the log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the default page size for search.
    #[must_use]
    pub const fn default_rows(mut self, rows: u32) -> Self {
        self.default_rows = rows;
        self
    }

    /// Sets the dead-byte threshold for automatic compaction.
    #[must_use]
    pub const fn auto_compact(mut self, dead_bytes: Option<u64>) -> Self {
        self.auto_compact_bytes = dead_bytes;
        self
    }

    /// Builds a configuration from the process environment.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(name) = lookup(ENV_DB_NAME) {
            config.name = name;
        }
        if let Some(raw) = lookup(ENV_DB_VERSION) {
            config.version = raw.trim().parse().map_err(|_| {
                CoreError::invalid_config(format!("{ENV_DB_VERSION} is not a version: {raw:?}"))
            })?;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            if !dir.is_empty() {
                config.data_dir = Some(PathBuf::from(dir));
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the engine cannot use.
    pub fn validate(&self) -> CoreResult<()> {
        if self.name.is_empty() {
            return Err(CoreError::invalid_config("database name is empty"));
        }
        if self
            .name
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '\0') || c.is_control())
            || self.name == "."
            || self.name == ".."
        {
            return Err(CoreError::invalid_config(format!(
                "database name {:?} is not a valid directory name",
                self.name
            )));
        }
        if self.version == 0 {
            return Err(CoreError::invalid_config("version must be at least 1"));
        }
        if self.default_rows == 0 {
            return Err(CoreError::invalid_config("default_rows must be at least 1"));
        }
        Ok(())
    }
}
