//! Catalog configuration.
//!
//! Supports loading from environment variables with the `CATALOG_` prefix.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::telemetry::{LogConfig, LogFormat, LogLevel};

/// Settings for one catalog process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// This process's machine id, distinct per cooperating process.
    #[serde(default)]
    pub machine_id: u32,
    /// Number of cooperating processes.
    #[serde(default = "default_num_machines")]
    pub num_machines: u32,
    /// Draw item, version and successor ids from a single counter.
    #[serde(default)]
    pub shared_counter: bool,
    /// Snapshot file for the file-backed store.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
    /// zstd level for snapshots; `None` writes uncompressed snapshots.
    #[serde(default)]
    pub compression_level: Option<i32>,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_num_machines() -> u32 {
    1
}

/// Reads `key`; an unset variable is `None`, a set but unparsable one is an
/// error.
fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, CatalogError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CatalogError::Config(format!("{} has unparsable value {:?}", key, raw))),
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            machine_id: 0,
            num_machines: default_num_machines(),
            shared_counter: false,
            snapshot_path: None,
            compression_level: None,
            log: LogConfig::default(),
        }
    }
}

impl CatalogConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - CATALOG_MACHINE_ID: machine id of this process
    /// - CATALOG_NUM_MACHINES: number of cooperating processes
    /// - CATALOG_SHARED_COUNTER: "true" to share one id counter
    /// - CATALOG_SNAPSHOT_PATH: snapshot file path (optional)
    /// - CATALOG_COMPRESSION_LEVEL: zstd level (optional)
    /// - CATALOG_LOG_LEVEL: trace/debug/info/warn/error
    /// - CATALOG_LOG_FORMAT: pretty/json/compact
    ///
    /// Unset variables fall back to defaults. A variable that is set but
    /// cannot be parsed is a [`CatalogError::Config`].
    pub fn from_env() -> Result<Self, CatalogError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CatalogError> {
        let defaults = Self::default();

        let mut log = defaults.log.clone();
        if let Some(raw) = lookup("CATALOG_LOG_LEVEL") {
            log.level = LogLevel::parse(&raw)
                .ok_or_else(|| CatalogError::Config(format!("CATALOG_LOG_LEVEL has unparsable value {:?}", raw)))?;
        }
        if let Some(raw) = lookup("CATALOG_LOG_FORMAT") {
            log.format = LogFormat::parse(&raw)
                .ok_or_else(|| CatalogError::Config(format!("CATALOG_LOG_FORMAT has unparsable value {:?}", raw)))?;
        }

        Ok(Self {
            machine_id: parse_var(&lookup, "CATALOG_MACHINE_ID")?.unwrap_or(defaults.machine_id),
            num_machines: parse_var(&lookup, "CATALOG_NUM_MACHINES")?.unwrap_or(defaults.num_machines),
            shared_counter: parse_var(&lookup, "CATALOG_SHARED_COUNTER")?.unwrap_or(defaults.shared_counter),
            snapshot_path: lookup("CATALOG_SNAPSHOT_PATH")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            compression_level: parse_var(&lookup, "CATALOG_COMPRESSION_LEVEL")?,
            log,
        })
    }

    /// Set the machine id and machine count
    pub fn with_machine(mut self, machine_id: u32, num_machines: u32) -> Self {
        self.machine_id = machine_id;
        self.num_machines = num_machines;
        self
    }

    /// Set the snapshot file path
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Set the snapshot compression level
    pub fn with_compression(mut self, level: i32) -> Self {
        self.compression_level = Some(level);
        self
    }

    /// Checks the settings for consistency.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.num_machines == 0 {
            return Err(CatalogError::Config("num_machines must be at least 1".into()));
        }
        if self.machine_id >= self.num_machines {
            return Err(CatalogError::Config(format!(
                "machine_id {} is out of range for {} machines",
                self.machine_id, self.num_machines
            )));
        }
        if let Some(level) = self.compression_level {
            let range = zstd::compression_level_range();
            if !range.contains(&level) {
                return Err(CatalogError::Config(format!(
                    "compression level {} is outside {}..={}",
                    level,
                    range.start(),
                    range.end()
                )));
            }
        }
        Ok(())
    }
}
