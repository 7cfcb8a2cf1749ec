//! Retention configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the temporary-file sweeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Directories swept. Only regular files directly inside are considered.
    #[serde(default = "default_directories")]
    pub directories: Vec<PathBuf>,

    /// Files older than this (seconds since last modification) are deleted.
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,

    /// Seconds between sweeps when running periodically.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
}

fn default_directories() -> Vec<PathBuf> {
    let root = std::env::temp_dir().join("mediaconv");
    vec![root.join("uploads"), root.join("converted")]
}

fn default_max_age() -> u64 {
    7200 // 2 hours
}

fn default_interval() -> u64 {
    900 // 15 minutes
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            directories: default_directories(),
            max_age_secs: default_max_age(),
            interval_secs: default_interval(),
        }
    }
}

impl RetentionConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
