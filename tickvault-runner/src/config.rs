//! Pipeline configuration, loaded from TOML.
//!
//! Every tunable has a default matching the documented constants, so an
//! empty file (or no file) yields a working pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tickvault_core::quality::QualityConfig;
use tickvault_core::source::RetryPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DlqConfig {
    pub dir: PathBuf,
    pub max_segment_bytes: u64,
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("warehouse/dlq"),
            max_segment_bytes: 16 << 20,
        }
    }
}

/// Per-tier retention windows for `cleanup`, in days.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub update_days: u32,
    pub realtime_days: u32,
    /// Quality trend history retention.
    pub quality_history_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            update_days: 30,
            realtime_days: 7,
            quality_history_days: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub breaker_cooldown_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            breaker_cooldown_secs: 60,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.base_delay_ms))
    }

    pub fn breaker_cooldown(&self) -> Duration {
        Duration::from_secs(self.breaker_cooldown_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub warehouse_root: WarehouseRoot,
    pub dlq: DlqConfig,
    pub quality: QualityConfig,
    pub retention: RetentionConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarehouseRoot(pub PathBuf);

impl Default for WarehouseRoot {
    fn default() -> Self {
        Self(PathBuf::from("warehouse"))
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}
