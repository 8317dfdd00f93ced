//! Account Storage - records for the local identity provider
//!
//! Manages persistent storage for:
//! - Accounts (keyed by normalised email)
//! - The current sign-in session
//! - Password reset requests

use redb::{ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::types::IdentityId;

use super::Storage;

/// Table for accounts (key: normalised email, value: JSON AccountRecord)
pub(crate) const ACCOUNTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");

/// Table holding the signed-in identity (single key)
pub(crate) const SESSION_TABLE: TableDefinition<&str, &str> = TableDefinition::new("session");

/// Table for password reset requests (key: normalised email, value: unix millis)
pub(crate) const PASSWORD_RESETS_TABLE: TableDefinition<&str, i64> =
    TableDefinition::new("password_resets");

const SESSION_KEY: &str = "current";

/// A local account. Password material is a salted blake3 hash, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: IdentityId,
    pub email: String,
    pub display_name: Option<String>,
    pub password_hash: String,
    pub salt: String,
    pub created_at: i64,
    pub disabled: bool,
}

impl Storage {
    // ═══════════════════════════════════════════════════════════════════════
    // Account Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Save an account, overwriting any record with the same email.
    pub fn save_account(&self, account: &AccountRecord) -> Result<(), SyncError> {
        let data =
            serde_json::to_vec(account).map_err(|e| SyncError::Serialization(e.to_string()))?;

        let db = self.db_handle();
        let db_guard = db.read();
        let write_txn = db_guard.begin_write()?;
        {
            let mut table = write_txn.open_table(ACCOUNTS_TABLE)?;
            table.insert(account.email.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Load an account by normalised email
    pub fn load_account(&self, email: &str) -> Result<Option<AccountRecord>, SyncError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let read_txn = db_guard.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS_TABLE)?;

        match table.get(email)? {
            Some(v) => {
                let account: AccountRecord = serde_json::from_slice(v.value())
                    .map_err(|e| SyncError::Serialization(e.to_string()))?;
                Ok(Some(account))
            }
            None => Ok(None),
        }
    }

    /// Load an account by identity id (linear scan; account counts are tiny)
    pub fn load_account_by_id(&self, id: &IdentityId) -> Result<Option<AccountRecord>, SyncError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let read_txn = db_guard.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS_TABLE)?;

        for entry in table.iter()? {
            let (_, value) = entry?;
            let account: AccountRecord = serde_json::from_slice(value.value())
                .map_err(|e| SyncError::Serialization(e.to_string()))?;
            if &account.id == id {
                return Ok(Some(account));
            }
        }
        Ok(None)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Session Operations
    // ═══════════════════════════════════════════════════════════════════════

    /// Persist the signed-in identity, or clear it with `None`.
    pub fn save_session(&self, identity: Option<&IdentityId>) -> Result<(), SyncError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let write_txn = db_guard.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSION_TABLE)?;
            match identity {
                Some(id) => {
                    table.insert(SESSION_KEY, id.as_str())?;
                }
                None => {
                    table.remove(SESSION_KEY)?;
                }
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn load_session(&self) -> Result<Option<IdentityId>, SyncError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let read_txn = db_guard.begin_read()?;
        let table = read_txn.open_table(SESSION_TABLE)?;

        Ok(table
            .get(SESSION_KEY)?
            .map(|v| IdentityId::new(v.value().to_string())))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Password Reset Operations
    // ═══════════════════════════════════════════════════════════════════════

    pub fn record_password_reset(&self, email: &str, requested_at: i64) -> Result<(), SyncError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let write_txn = db_guard.begin_write()?;
        {
            let mut table = write_txn.open_table(PASSWORD_RESETS_TABLE)?;
            table.insert(email, requested_at)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Time of the most recent reset request for `email`
    pub fn last_password_reset(&self, email: &str) -> Result<Option<i64>, SyncError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let read_txn = db_guard.begin_read()?;
        let table = read_txn.open_table(PASSWORD_RESETS_TABLE)?;

        Ok(table.get(email)?.map(|v| v.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn account(email: &str, id: &str) -> AccountRecord {
        AccountRecord {
            id: IdentityId::new(id),
            email: email.to_string(),
            display_name: None,
            password_hash: "00".repeat(32),
            salt: "11".repeat(16),
            created_at: 1,
            disabled: false,
        }
    }

    #[test]
    fn test_save_and_load_account() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(temp_dir.path().join("backend.redb")).unwrap();

        storage.save_account(&account("ada@example.com", "U1")).unwrap();

        let loaded = storage.load_account("ada@example.com").unwrap().unwrap();
        assert_eq!(loaded.id, IdentityId::new("U1"));
        assert!(storage.load_account("bob@example.com").unwrap().is_none());
    }

    #[test]
    fn test_load_account_by_id() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(temp_dir.path().join("backend.redb")).unwrap();
        storage.save_account(&account("ada@example.com", "U1")).unwrap();
        storage.save_account(&account("bob@example.com", "U2")).unwrap();

        let loaded = storage.load_account_by_id(&IdentityId::new("U2")).unwrap().unwrap();
        assert_eq!(loaded.email, "bob@example.com");
        assert!(storage.load_account_by_id(&IdentityId::new("U3")).unwrap().is_none());
    }

    #[test]
    fn test_session_set_and_clear() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(temp_dir.path().join("backend.redb")).unwrap();

        assert!(storage.load_session().unwrap().is_none());
        storage.save_session(Some(&IdentityId::new("U1"))).unwrap();
        assert_eq!(storage.load_session().unwrap(), Some(IdentityId::new("U1")));
        storage.save_session(None).unwrap();
        assert!(storage.load_session().unwrap().is_none());
    }

    #[test]
    fn test_password_reset_records_latest_request() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(temp_dir.path().join("backend.redb")).unwrap();

        storage.record_password_reset("ada@example.com", 10).unwrap();
        storage.record_password_reset("ada@example.com", 20).unwrap();
        assert_eq!(storage.last_password_reset("ada@example.com").unwrap(), Some(20));
        assert_eq!(storage.last_password_reset("bob@example.com").unwrap(), None);
    }
}
