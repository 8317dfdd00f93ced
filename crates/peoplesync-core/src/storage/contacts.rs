//! Contact Storage - records of the local remote collection
//!
//! Ownership checks live in the collection, not here: this layer stores and
//! returns whatever it is given.

use redb::{ReadableTable, TableDefinition};

use crate::error::SyncError;
use crate::types::{Contact, ContactId, IdentityId};

use super::Storage;

/// Table for contacts (key: contact id, value: JSON Contact)
pub(crate) const CONTACTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("contacts");

impl Storage {
    /// Save a contact, overwriting any record with the same id.
    pub fn save_contact(&self, contact: &Contact) -> Result<(), SyncError> {
        let data =
            serde_json::to_vec(contact).map_err(|e| SyncError::Serialization(e.to_string()))?;

        let db = self.db_handle();
        let db_guard = db.read();
        let write_txn = db_guard.begin_write()?;
        {
            let mut table = write_txn.open_table(CONTACTS_TABLE)?;
            table.insert(contact.id.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Load a contact by id
    pub fn load_contact(&self, id: &ContactId) -> Result<Option<Contact>, SyncError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let read_txn = db_guard.begin_read()?;
        let table = read_txn.open_table(CONTACTS_TABLE)?;

        match table.get(id.as_str())? {
            Some(v) => {
                let contact: Contact = serde_json::from_slice(v.value())
                    .map_err(|e| SyncError::Serialization(e.to_string()))?;
                Ok(Some(contact))
            }
            None => Ok(None),
        }
    }

    /// Delete a contact by id. Returns whether a record was removed.
    pub fn delete_contact(&self, id: &ContactId) -> Result<bool, SyncError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let write_txn = db_guard.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(CONTACTS_TABLE)?;
            let removed = table.remove(id.as_str())?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// All contacts owned by `owner`, in id order
    pub fn list_contacts_owned_by(&self, owner: &IdentityId) -> Result<Vec<Contact>, SyncError> {
        let db = self.db_handle();
        let db_guard = db.read();
        let read_txn = db_guard.begin_read()?;
        let table = read_txn.open_table(CONTACTS_TABLE)?;

        let mut contacts = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let contact: Contact = serde_json::from_slice(value.value())
                .map_err(|e| SyncError::Serialization(e.to_string()))?;
            if &contact.owner_id == owner {
                contacts.push(contact);
            }
        }
        Ok(contacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContactFormData;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn contact(id: &str, owner: &str, name: &str) -> Contact {
        Contact::create(
            ContactId::new(id),
            IdentityId::new(owner),
            ContactFormData {
                name: name.into(),
                email: format!("{}@example.com", name.to_lowercase()),
                phone: "+44 20 7946 0958".into(),
                ..Default::default()
            },
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        )
    }

    #[test]
    fn test_save_and_load_contact() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(temp_dir.path().join("backend.redb")).unwrap();

        storage.save_contact(&contact("c1", "U1", "Ada")).unwrap();

        let loaded = storage.load_contact(&ContactId::new("c1")).unwrap().unwrap();
        assert_eq!(loaded.name, "Ada");
        assert!(storage.load_contact(&ContactId::new("c2")).unwrap().is_none());
    }

    #[test]
    fn test_delete_reports_presence() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(temp_dir.path().join("backend.redb")).unwrap();
        storage.save_contact(&contact("c1", "U1", "Ada")).unwrap();

        assert!(storage.delete_contact(&ContactId::new("c1")).unwrap());
        assert!(!storage.delete_contact(&ContactId::new("c1")).unwrap());
    }

    #[test]
    fn test_list_filters_by_owner() {
        let temp_dir = tempdir().unwrap();
        let storage = Storage::new(temp_dir.path().join("backend.redb")).unwrap();
        storage.save_contact(&contact("c1", "U1", "Ada")).unwrap();
        storage.save_contact(&contact("c2", "U2", "Bob")).unwrap();
        storage.save_contact(&contact("c3", "U1", "Cy")).unwrap();

        let mine = storage.list_contacts_owned_by(&IdentityId::new("U1")).unwrap();
        let names: Vec<_> = mine.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ada", "Cy"]);
    }
}
