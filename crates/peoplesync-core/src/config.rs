//! Engine configuration
//!
//! Defaults are usable as-is. A `config.json` in the data directory
//! overrides individual fields; missing fields keep their defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SyncError;

pub const CONFIG_FILE_NAME: &str = "config.json";

const DEFAULT_AVATAR_MAX_DIMENSION: u32 = 256;
const DEFAULT_AVATAR_QUALITY: u8 = 80;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding `device.redb` and `backend.redb`
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Longer side of a processed avatar, in pixels
    pub avatar_max_dimension: u32,
    /// JPEG quality for processed avatars (1..=100)
    pub avatar_quality: u8,
    /// Capacity of the sync event broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("peoplesync_data"),
            avatar_max_dimension: DEFAULT_AVATAR_MAX_DIMENSION,
            avatar_quality: DEFAULT_AVATAR_QUALITY,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Load `<data_dir>/config.json` if present, else defaults.
    pub fn load(data_dir: impl AsRef<Path>) -> Result<Self, SyncError> {
        let data_dir = data_dir.as_ref();
        let path = data_dir.join(CONFIG_FILE_NAME);

        let mut config = if path.exists() {
            debug!(?path, "Loading configuration");
            let raw = std::fs::read(&path)?;
            serde_json::from_slice::<EngineConfig>(&raw)
                .map_err(|e| SyncError::Serialization(format!("{}: {e}", path.display())))?
        } else {
            EngineConfig::default()
        };
        config.data_dir = data_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.avatar_max_dimension == 0 {
            return Err(SyncError::InvalidOperation(
                "avatar_max_dimension must be positive".to_string(),
            ));
        }
        if !(1..=100).contains(&self.avatar_quality) {
            return Err(SyncError::InvalidOperation(format!(
                "avatar_quality must be within 1..=100 (got {})",
                self.avatar_quality
            )));
        }
        if self.event_channel_capacity == 0 {
            return Err(SyncError::InvalidOperation(
                "event_channel_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn device_db_path(&self) -> PathBuf {
        self.data_dir.join("device.redb")
    }

    pub fn backend_db_path(&self) -> PathBuf {
        self.data_dir.join("backend.redb")
    }
}
