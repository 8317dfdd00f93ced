//! Generation-tagged live query over the remote collection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  RemoteCollectionSync                                           │
//! │  ├── scope: Mutex<Scope>                                        │
//! │  │   └── generation + identity currently subscribed             │
//! │  ├── listener: JoinHandle                                       │
//! │  │   └── Forwards RemoteEvents tagged with its generation       │
//! │  ├── snapshot_tx: watch::Sender<ContactSnapshot>                │
//! │  │   └── Latest full snapshot (never a delta)                   │
//! │  └── event_tx: broadcast::Sender<SyncEvent>                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Ingest and unsubscribe both take the scope lock, so once `unsubscribe`
//! or a newer `subscribe` has bumped the generation no event from the old
//! listener can reach the snapshot.

use std::sync::Arc;

use chrono::Local;
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::events::{SyncEvent, SyncStatus};
use crate::error::{SyncError, SyncResult};
use crate::identity::{translate, AuthAction};
use crate::remote::{ContactQuery, NewContact, RemoteCollection, RemoteEvent};
use crate::types::{Contact, ContactFormData, ContactId, ContactStatus, IdentityId};

/// Default capacity for the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Complete membership of the subscribed partition at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactSnapshot {
    /// Generation that produced this snapshot
    pub generation: u64,
    pub identity: Option<IdentityId>,
    /// In the order the store delivered them
    pub contacts: Vec<Contact>,
    pub status: SyncStatus,
}

#[derive(Debug, Default)]
struct Scope {
    generation: u64,
    identity: Option<IdentityId>,
}

struct Shared {
    scope: Mutex<Scope>,
    snapshot_tx: watch::Sender<ContactSnapshot>,
    event_tx: broadcast::Sender<SyncEvent>,
}

impl Shared {
    /// Apply `event` if it belongs to the current generation.
    fn ingest(&self, generation: u64, event: RemoteEvent) -> bool {
        let scope = self.scope.lock();
        let Some(identity) = scope.identity.as_ref().filter(|_| scope.generation == generation)
        else {
            debug!(generation, current = scope.generation, "Discarding stale event");
            let _ = self.event_tx.send(SyncEvent::StaleDiscarded {
                generation,
                current: scope.generation,
            });
            return false;
        };

        let mut contacts = self.snapshot_tx.borrow().contacts.clone();
        let owned = |c: &Contact| {
            if &c.owner_id == identity {
                true
            } else {
                warn!(contact_id = %c.id, "Dropping record outside the subscribed partition");
                false
            }
        };

        match event {
            RemoteEvent::Reset(all) => {
                contacts = all.into_iter().filter(|c| owned(c)).collect();
            }
            RemoteEvent::Added(contact) | RemoteEvent::Modified(contact) => {
                if owned(&contact) {
                    match contacts.iter_mut().find(|c| c.id == contact.id) {
                        Some(existing) => *existing = contact,
                        None => contacts.push(contact),
                    }
                }
            }
            RemoteEvent::Removed(id) => contacts.retain(|c| c.id != id),
        }

        let contact_count = contacts.len();
        let status = SyncStatus::Live { contact_count };
        let previous = self.snapshot_tx.send_replace(ContactSnapshot {
            generation,
            identity: Some(identity.clone()),
            contacts,
            status: status.clone(),
        });

        if previous.status != status {
            let _ = self
                .event_tx
                .send(SyncEvent::StatusChanged { generation, status });
        }
        let _ = self.event_tx.send(SyncEvent::SnapshotReplaced {
            generation,
            identity: identity.clone(),
            contact_count,
        });
        true
    }

    /// Record a failure of the live query for `generation`, if still current.
    fn fail(&self, generation: u64, message: String) {
        let scope = self.scope.lock();
        if scope.generation != generation {
            return;
        }
        warn!(generation, %message, "Live query failed");

        let status = SyncStatus::Error(message.clone());
        self.snapshot_tx.send_modify(|snapshot| snapshot.status = status.clone());
        let _ = self.event_tx.send(SyncEvent::SyncError {
            generation,
            message,
        });
        let _ = self
            .event_tx
            .send(SyncEvent::StatusChanged { generation, status });
    }

    /// Start a new generation scoped to `identity` (or to nobody).
    fn advance(&self, identity: Option<IdentityId>) -> u64 {
        let mut scope = self.scope.lock();
        scope.generation += 1;
        scope.identity = identity.clone();
        let generation = scope.generation;

        let status = if identity.is_some() {
            SyncStatus::Connecting
        } else {
            SyncStatus::Idle
        };
        self.snapshot_tx.send_replace(ContactSnapshot {
            generation,
            identity,
            contacts: Vec::new(),
            status: status.clone(),
        });
        let _ = self
            .event_tx
            .send(SyncEvent::StatusChanged { generation, status });
        generation
    }
}

/// Live local view of one identity's contacts
///
/// # Example
///
/// ```ignore
/// let sync = RemoteCollectionSync::new(remote);
/// let generation = sync.subscribe(identity_id).await?;
/// let snapshot = sync.wait_until_live(generation).await?;
///
/// sync.create(form).await?;          // shows up via the subscription
/// sync.unsubscribe();                // synchronous
/// ```
pub struct RemoteCollectionSync {
    remote: Arc<dyn RemoteCollection>,
    shared: Arc<Shared>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl RemoteCollectionSync {
    pub fn new(remote: Arc<dyn RemoteCollection>) -> Self {
        Self::with_capacity(remote, EVENT_CHANNEL_CAPACITY)
    }

    /// Create with a custom capacity for the [`SyncEvent`] channel
    pub fn with_capacity(remote: Arc<dyn RemoteCollection>, capacity: usize) -> Self {
        let (snapshot_tx, _) = watch::channel(ContactSnapshot::default());
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            remote,
            shared: Arc::new(Shared {
                scope: Mutex::new(Scope::default()),
                snapshot_tx,
                event_tx,
            }),
            listener: Mutex::new(None),
        }
    }

    /// Open the live query for `identity`, replacing any previous one.
    ///
    /// Returns the generation of the new subscription. The snapshot is
    /// replaced with an empty `Connecting` one immediately, so nothing
    /// scoped to the previous identity remains visible.
    pub async fn subscribe(&self, identity: IdentityId) -> SyncResult<u64> {
        let generation = self.shared.advance(Some(identity.clone()));
        self.stop_listener();
        info!(%identity, generation, "Subscribing to contacts");

        let mut subscription = match self
            .remote
            .subscribe(ContactQuery::owned_by(identity.clone()))
            .await
        {
            Ok(subscription) => subscription,
            Err(err) => {
                let err = translate(err, AuthAction::ContactWrite);
                self.shared.fail(generation, err.to_string());
                return Err(err);
            }
        };

        let mut listener = self.listener.lock();
        if self.current_generation() != generation {
            debug!(generation, "Subscription superseded before it started");
            return Ok(generation);
        }
        if let Some(old) = listener.take() {
            old.abort();
        }

        let shared = self.shared.clone();
        *listener = Some(tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                shared.ingest(generation, event);
            }
            shared.fail(generation, "live query closed".to_string());
        }));

        Ok(generation)
    }

    /// Tear down the live query and clear the snapshot. Synchronous: once
    /// this returns no event of the old generation can be applied.
    pub fn unsubscribe(&self) {
        let generation = self.shared.advance(None);
        self.stop_listener();
        info!(generation, "Unsubscribed from contacts");
    }

    /// Apply a remote event tagged with `generation`.
    ///
    /// Returns `false` when the event was discarded as stale.
    pub fn ingest(&self, generation: u64, event: RemoteEvent) -> bool {
        self.shared.ingest(generation, event)
    }

    fn stop_listener(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
    }

    pub fn current_generation(&self) -> u64 {
        self.shared.scope.lock().generation
    }

    /// Identity the current generation is scoped to
    pub fn identity(&self) -> Option<IdentityId> {
        self.shared.scope.lock().identity.clone()
    }

    /// The latest snapshot
    pub fn snapshot(&self) -> ContactSnapshot {
        self.shared.snapshot_tx.borrow().clone()
    }

    /// Receiver notified whenever a new snapshot is published
    pub fn watch(&self) -> watch::Receiver<ContactSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Subscribe to sync events
    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Wait until the snapshot of `generation` is live.
    ///
    /// Fails if the query errors or a newer generation takes over first.
    pub async fn wait_until_live(&self, generation: u64) -> SyncResult<ContactSnapshot> {
        let mut rx = self.watch();
        let snapshot = rx
            .wait_for(|s| {
                s.generation != generation
                    || s.status.is_live()
                    || matches!(s.status, SyncStatus::Error(_))
            })
            .await
            .map_err(|_| SyncError::InvalidOperation("sync shut down".to_string()))?
            .clone();

        if snapshot.generation != generation {
            return Err(SyncError::InvalidOperation(format!(
                "subscription {generation} was superseded"
            )));
        }
        if let SyncStatus::Error(message) = &snapshot.status {
            return Err(SyncError::Network(message.clone()));
        }
        Ok(snapshot)
    }

    fn acting_identity(&self) -> SyncResult<IdentityId> {
        self.identity().ok_or(SyncError::NotSignedIn)
    }

    /// Create a contact owned by the subscribed identity.
    ///
    /// Status is `active` and `date_added` is today's device-local date. The
    /// record appears in the snapshot only once the subscription delivers it.
    pub async fn create(&self, data: ContactFormData) -> SyncResult<Contact> {
        let actor = self.acting_identity()?;
        let record = NewContact {
            owner_id: actor.clone(),
            data,
            status: ContactStatus::Active,
            date_added: Local::now().date_naive(),
        };

        let contact = self
            .remote
            .create(&actor, record)
            .await
            .map_err(|e| translate(e, AuthAction::ContactWrite))?;
        debug!(contact_id = %contact.id, "Create acknowledged");
        Ok(contact)
    }

    pub async fn update(&self, id: &ContactId, data: ContactFormData) -> SyncResult<Contact> {
        let actor = self.acting_identity()?;
        self.remote
            .update(&actor, id, data)
            .await
            .map_err(|e| translate(e, AuthAction::ContactWrite))
    }

    pub async fn set_status(&self, id: &ContactId, status: ContactStatus) -> SyncResult<Contact> {
        let actor = self.acting_identity()?;
        self.remote
            .set_status(&actor, id, status)
            .await
            .map_err(|e| translate(e, AuthAction::ContactWrite))
    }

    pub async fn delete(&self, id: &ContactId) -> SyncResult<()> {
        let actor = self.acting_identity()?;
        self.remote
            .delete(&actor, id)
            .await
            .map_err(|e| translate(e, AuthAction::ContactWrite))
    }
}

impl Drop for RemoteCollectionSync {
    fn drop(&mut self) {
        self.stop_listener();
    }
}
