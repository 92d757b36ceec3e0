//! Runtime configuration.
//!
//! Both structs deserialize with every field optional; missing fields take
//! their defaults.

use crate::backing::AUTO_ID_PREFIX;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Behavior switches of one extension tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Load an unloaded owning add-in before resolving it.
    pub load_addins_on_demand: bool,
    /// Prefix of generated ids; nodes carrying it report `has_id == false`.
    pub auto_id_prefix: String,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            load_addins_on_demand: true,
            auto_id_prefix: AUTO_ID_PREFIX.to_string(),
        }
    }
}

/// Logging bootstrap settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// One of `trace|debug|info|warn|error`.
    pub level: String,
    /// Absolute directory for rotated log files.
    pub log_dir: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            log_dir: std::env::temp_dir().join("addintree-logs"),
        }
    }
}

impl LogSettings {
    pub fn new(level: impl Into<String>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            level: level.into(),
            log_dir: log_dir.into(),
        }
    }
}
