//! Service configuration and logging setup.

use std::fs;
use std::path::{Path, PathBuf};

use raidforge_raid::RaidConfig;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::RaidforgeError;

/// Everything a Raidforge deployment reads from its config file.
///
/// Every field is optional in the file:
///
/// ```json
/// {
///   "store_path": "/var/lib/raidforge/raids.json",
///   "log_filter": "raidforge=debug,info",
///   "raid": { "enrollment_window": 300, "round_interval": 1.5 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Where the JSON store lives. `None` keeps everything in memory.
    pub store_path: Option<PathBuf>,

    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,

    pub raid: RaidConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            log_filter: "info".to_string(),
            raid: RaidConfig::default(),
        }
    }
}

/// Loads a [`ServiceConfig`] from a JSON file. Missing fields take their
/// defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<ServiceConfig, RaidforgeError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| RaidforgeError::ConfigIo {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ServiceConfig =
        serde_json::from_slice(&bytes).map_err(|source| RaidforgeError::ConfigFormat {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Installs a `fmt` subscriber filtered by `RUST_LOG`, or by `fallback`
/// when it is unset. Does nothing if a subscriber is already installed.
pub fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
