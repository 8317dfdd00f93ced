//! Local remote collection backed by redb
//!
//! Every open query is a watcher holding the sending half of a channel.
//! Writes and subscription setup happen under the watcher lock, so a new
//! subscriber's `Reset` and the live events that follow it never interleave
//! with a concurrent write. Read-modify-write operations load the record
//! under the same lock, so a concurrent delete cannot be undone by an update
//! that read the record before it was removed.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::identity::{ErrorCode, ProviderError};
use crate::storage::Storage;
use crate::types::{Contact, ContactFormData, ContactId, ContactStatus, IdentityId};

use super::{ContactQuery, NewContact, RemoteCollection, RemoteEvent, RemoteSubscription};

struct Watcher {
    query: ContactQuery,
    tx: mpsc::UnboundedSender<RemoteEvent>,
}

/// [`RemoteCollection`] over the `contacts` table of a [`Storage`]
pub struct LocalCollection {
    storage: Storage,
    watchers: Mutex<Vec<Watcher>>,
}

impl LocalCollection {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            watchers: Mutex::new(Vec::new()),
        }
    }

    /// Number of live queries (closed receivers are pruned on the next write)
    pub fn watcher_count(&self) -> usize {
        self.watchers.lock().iter().filter(|w| !w.tx.is_closed()).count()
    }

    /// Deliver `event` about `contact` to every matching watcher.
    fn publish(watchers: &mut Vec<Watcher>, contact: &Contact, event: RemoteEvent) {
        watchers.retain(|w| !w.tx.is_closed());
        for watcher in watchers.iter().filter(|w| w.query.matches(contact)) {
            // A receiver dropped since the retain is cleaned up next time
            let _ = watcher.tx.send(event.clone());
        }
    }

    /// Load `id` and check that `actor` owns it
    fn owned_record(&self, actor: &IdentityId, id: &ContactId) -> Result<Contact, ProviderError> {
        let contact = self
            .storage
            .load_contact(id)
            .map_err(unavailable)?
            .ok_or_else(|| ErrorCode::NotFound.error(format!("contact {id} does not exist")))?;

        if &contact.owner_id != actor {
            warn!(contact_id = %id, actor = %actor, "Rejected write by non-owner");
            return Err(ErrorCode::PermissionDenied.error(format!(
                "contact {id} is not owned by the signed-in user"
            )));
        }
        Ok(contact)
    }

    /// Caller holds the watcher lock from the ownership check onwards
    fn save_and_publish(
        &self,
        watchers: &mut Vec<Watcher>,
        contact: Contact,
    ) -> Result<Contact, ProviderError> {
        self.storage.save_contact(&contact).map_err(unavailable)?;
        Self::publish(watchers, &contact, RemoteEvent::Modified(contact.clone()));
        Ok(contact)
    }
}

#[async_trait]
impl RemoteCollection for LocalCollection {
    async fn subscribe(&self, query: ContactQuery) -> Result<RemoteSubscription, ProviderError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watchers = self.watchers.lock();
        let current = self
            .storage
            .list_contacts_owned_by(&query.owner_id)
            .map_err(unavailable)?;
        debug!(owner = %query.owner_id, count = current.len(), "Opened live query");

        // The receiver is still in hand, so this cannot fail
        let _ = tx.send(RemoteEvent::Reset(current));
        watchers.push(Watcher { query, tx });

        Ok(RemoteSubscription::new(rx))
    }

    async fn create(
        &self,
        actor: &IdentityId,
        record: NewContact,
    ) -> Result<Contact, ProviderError> {
        if &record.owner_id != actor {
            return Err(ErrorCode::PermissionDenied.error("cannot create records for another user"));
        }

        let mut contact = Contact::create(
            ContactId::generate(),
            record.owner_id,
            record.data,
            record.date_added,
        );
        contact.status = record.status;

        let mut watchers = self.watchers.lock();
        self.storage.save_contact(&contact).map_err(unavailable)?;
        Self::publish(&mut watchers, &contact, RemoteEvent::Added(contact.clone()));

        debug!(contact_id = %contact.id, owner = %contact.owner_id, "Contact created");
        Ok(contact)
    }

    async fn update(
        &self,
        actor: &IdentityId,
        id: &ContactId,
        data: ContactFormData,
    ) -> Result<Contact, ProviderError> {
        let mut watchers = self.watchers.lock();
        let mut contact = self.owned_record(actor, id)?;
        contact.apply_form(data);
        debug!(contact_id = %id, "Contact updated");
        self.save_and_publish(&mut watchers, contact)
    }

    async fn set_status(
        &self,
        actor: &IdentityId,
        id: &ContactId,
        status: ContactStatus,
    ) -> Result<Contact, ProviderError> {
        let mut watchers = self.watchers.lock();
        let mut contact = self.owned_record(actor, id)?;
        contact.status = status;
        debug!(contact_id = %id, %status, "Contact status changed");
        self.save_and_publish(&mut watchers, contact)
    }

    async fn delete(&self, actor: &IdentityId, id: &ContactId) -> Result<(), ProviderError> {
        let mut watchers = self.watchers.lock();
        let contact = self.owned_record(actor, id)?;

        if !self.storage.delete_contact(id).map_err(unavailable)? {
            return Err(ErrorCode::NotFound.error(format!("contact {id} does not exist")));
        }
        Self::publish(&mut watchers, &contact, RemoteEvent::Removed(id.clone()));

        debug!(contact_id = %id, "Contact deleted");
        Ok(())
    }
}

fn unavailable(err: SyncError) -> ProviderError {
    warn!(error = %err, "Contact storage failure");
    ErrorCode::Unavailable.error(err.to_string())
}
