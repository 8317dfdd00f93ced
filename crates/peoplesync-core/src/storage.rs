//! Persistent storage using redb.
//!
//! One `Storage` type backs two files:
//! - `device.redb`: the durable profile cache (survives sign-out)
//! - `backend.redb`: accounts, session and contacts of the local backend
//!
//! Tables are created on open regardless of which role the file plays.

use crate::error::SyncError;
use parking_lot::RwLock;
use redb::Database;
use std::path::Path;
use std::sync::Arc;

// Submodules
mod accounts;
mod contacts;
mod profile_cache;

use accounts::{ACCOUNTS_TABLE, PASSWORD_RESETS_TABLE, SESSION_TABLE};
use contacts::CONTACTS_TABLE;
use profile_cache::PROFILE_CACHE_TABLE;

pub use accounts::AccountRecord;
pub use profile_cache::{DurableCache, MemoryCache};

/// Storage layer using redb for ACID-compliant persistence
#[derive(Clone)]
pub struct Storage {
    db: Arc<RwLock<Database>>,
}

impl Storage {
    /// Create a new storage instance at the given path.
    ///
    /// This will:
    /// - Create the database directory if it doesn't exist
    /// - Initialize the database file
    /// - Create all required tables
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(PROFILE_CACHE_TABLE)?;
            let _ = write_txn.open_table(ACCOUNTS_TABLE)?;
            let _ = write_txn.open_table(SESSION_TABLE)?;
            let _ = write_txn.open_table(PASSWORD_RESETS_TABLE)?;
            let _ = write_txn.open_table(CONTACTS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }

    /// Shared database handle used by the table submodules
    pub(crate) fn db_handle(&self) -> Arc<RwLock<Database>> {
        self.db.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_storage_can_be_created() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.redb");
        assert!(Storage::new(&db_path).is_ok());
    }

    #[test]
    fn test_storage_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested/path/to/test.redb");
        let storage = Storage::new(&db_path);
        assert!(storage.is_ok());
        assert!(db_path.exists());
    }

    #[test]
    fn test_reopen_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.redb");
        drop(Storage::new(&db_path).unwrap());
        assert!(Storage::new(&db_path).is_ok());
    }
}
