//! Durable profile cache - the on-device mirror of the canonical profile
//!
//! Keyed by `profile:<identityId>`. Only the profile reconciler writes here;
//! anyone may read (e.g. to paint a previous avatar on the loading screen).

use std::collections::HashMap;

use parking_lot::Mutex;
use redb::{ReadableTable, TableDefinition};

use crate::error::SyncError;
use crate::types::CachedProfile;

use super::Storage;

/// Table for cached profiles (key: `profile:<id>`, value: postcard CachedProfile)
pub(crate) const PROFILE_CACHE_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("profile_cache");

/// Device-persistent key-value store for cached profiles
pub trait DurableCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<CachedProfile>, SyncError>;

    /// Replace the value under `key` atomically
    fn set(&self, key: &str, value: &CachedProfile) -> Result<(), SyncError>;
}

impl DurableCache for Storage {
    fn get(&self, key: &str) -> Result<Option<CachedProfile>, SyncError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let read_txn = db_guard.begin_read()?;
        let table = read_txn.open_table(PROFILE_CACHE_TABLE)?;

        match table.get(key)? {
            Some(data) => {
                let cached: CachedProfile = postcard::from_bytes(data.value())
                    .map_err(|e| SyncError::Serialization(e.to_string()))?;
                Ok(Some(cached))
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &CachedProfile) -> Result<(), SyncError> {
        let serialized =
            postcard::to_allocvec(value).map_err(|e| SyncError::Serialization(e.to_string()))?;

        let db = self.db_handle();
        let db_guard = db.read();
        let write_txn = db_guard.begin_write()?;
        {
            let mut table = write_txn.open_table(PROFILE_CACHE_TABLE)?;
            table.insert(key, serialized.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

/// In-memory cache for tests and ephemeral sessions
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CachedProfile>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl DurableCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<CachedProfile>, SyncError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &CachedProfile) -> Result<(), SyncError> {
        self.entries.lock().insert(key.to_string(), value.clone());
        Ok(())
    }
}
