//! Remote collection capability
//!
//! A predicate-scoped live query plus point writes by id. Ownership is
//! enforced by the store: `update`/`delete` by a non-owner are rejected with
//! `permission-denied`, missing ids with `not-found`.

mod local;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::mpsc;

use crate::identity::ProviderError;
use crate::types::{Contact, ContactFormData, ContactId, ContactStatus, IdentityId};

pub use local::LocalCollection;

/// Live change delivered by a subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEvent {
    /// Full current membership; always the first event of a subscription
    Reset(Vec<Contact>),
    Added(Contact),
    Modified(Contact),
    Removed(ContactId),
}

/// Subscription predicate: "all contacts whose owner equals `owner_id`"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactQuery {
    pub owner_id: IdentityId,
}

impl ContactQuery {
    pub fn owned_by(owner_id: IdentityId) -> Self {
        Self { owner_id }
    }

    pub fn matches(&self, contact: &Contact) -> bool {
        contact.owner_id == self.owner_id
    }
}

/// A record to insert; the store assigns the id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub owner_id: IdentityId,
    pub data: ContactFormData,
    pub status: ContactStatus,
    pub date_added: NaiveDate,
}

/// Receiving half of a live query. Dropping it cancels the subscription.
#[derive(Debug)]
pub struct RemoteSubscription {
    rx: mpsc::UnboundedReceiver<RemoteEvent>,
}

impl RemoteSubscription {
    pub fn new(rx: mpsc::UnboundedReceiver<RemoteEvent>) -> Self {
        Self { rx }
    }

    /// Next event, or `None` once the store closes the query
    pub async fn recv(&mut self) -> Option<RemoteEvent> {
        self.rx.recv().await
    }
}

#[async_trait]
pub trait RemoteCollection: Send + Sync {
    async fn subscribe(&self, query: ContactQuery) -> Result<RemoteSubscription, ProviderError>;

    async fn create(&self, actor: &IdentityId, record: NewContact)
        -> Result<Contact, ProviderError>;

    async fn update(
        &self,
        actor: &IdentityId,
        id: &ContactId,
        data: ContactFormData,
    ) -> Result<Contact, ProviderError>;

    /// Change only the status of a record, under the same ownership rules
    async fn set_status(
        &self,
        actor: &IdentityId,
        id: &ContactId,
        status: ContactStatus,
    ) -> Result<Contact, ProviderError>;

    async fn delete(&self, actor: &IdentityId, id: &ContactId) -> Result<(), ProviderError>;
}
