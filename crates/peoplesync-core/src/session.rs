//! Session lifecycle
//!
//! Turns identity transitions into subscribe/unsubscribe on the contact
//! sync and load/clear on the profile reconciler. Transitions are
//! serialised and idempotent: reporting the same identity twice does
//! nothing the second time.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::profile::ProfileReconciler;
use crate::sync::RemoteCollectionSync;
use crate::types::{Identity, IdentityId};

pub struct SessionLifecycle {
    sync: Arc<RemoteCollectionSync>,
    profile: Arc<ProfileReconciler>,
    active: Mutex<Option<IdentityId>>,
}

impl SessionLifecycle {
    pub fn new(sync: Arc<RemoteCollectionSync>, profile: Arc<ProfileReconciler>) -> Self {
        Self {
            sync,
            profile,
            active: Mutex::new(None),
        }
    }

    /// Identity the session is currently driven for
    pub async fn active_identity(&self) -> Option<IdentityId> {
        self.active.lock().await.clone()
    }

    /// React to the provider reporting `identity` (or a sign-out).
    pub async fn on_identity_changed(&self, identity: Option<Identity>) -> SyncResult<()> {
        let mut active = self.active.lock().await;

        match identity {
            Some(identity) if active.as_ref() == Some(&identity.id) => {
                debug!(identity = %identity.id, "Identity unchanged");
                Ok(())
            }
            Some(identity) => {
                if let Some(previous) = active.take() {
                    info!(from = %previous, to = %identity.id, "Switching identity");
                    self.profile.clear_on_sign_out();
                }

                let started = match self.profile.load_for_identity(&identity) {
                    Ok(_) => self.sync.subscribe(identity.id.clone()).await.map(|_| ()),
                    Err(err) => Err(err),
                };
                if let Err(err) = started {
                    warn!(identity = %identity.id, error = %err, "Session start failed, rolling back");
                    self.tear_down();
                    return Err(err);
                }
                *active = Some(identity.id);
                Ok(())
            }
            None => {
                match active.take() {
                    Some(previous) => info!(identity = %previous, "Session ended"),
                    None if self.profile.is_loaded() || self.sync.identity().is_some() => {
                        warn!("Session ended with partially started state");
                    }
                    None => return Ok(()),
                }
                self.tear_down();
                Ok(())
            }
        }
    }

    /// Drop the live query and the loaded profile
    fn tear_down(&self) {
        self.sync.unsubscribe();
        self.profile.clear_on_sign_out();
    }

    /// Follow a provider's identity channel until it closes.
    pub fn spawn_watcher(
        self: Arc<Self>,
        mut identities: watch::Receiver<Option<Identity>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let identity = identities.borrow_and_update().clone();
                if let Err(err) = self.on_identity_changed(identity).await {
                    warn!(error = %err, "Identity transition failed");
                }
                if identities.changed().await.is_err() {
                    debug!("Identity channel closed");
                    break;
                }
            }
        })
    }
}
