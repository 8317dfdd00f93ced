//! The Directory - main entry point for peoplesync
//!
//! One `Directory` per process wires the collaborators (identity provider,
//! remote collection, durable cache) into the sync, profile and session
//! components and exposes the user-level operations.

use std::path::Path;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{SyncError, SyncResult};
use crate::filter::{self, DashboardStats, FilterState};
use crate::identity::{translate, AuthAction, IdentityProvider, LocalIdentityProvider};
use crate::imaging::ImagePipeline;
use crate::profile::{self, CommitReport, ProfileReconciler, ProfileUpdate};
use crate::remote::{LocalCollection, RemoteCollection};
use crate::session::SessionLifecycle;
use crate::storage::{DurableCache, Storage};
use crate::sync::{ContactSnapshot, RemoteCollectionSync, SyncEvent};
use crate::types::{
    AvatarImage, Contact, ContactFormData, ContactId, ContactStatus, Identity, IdentityId,
    ImageBlob, Profile,
};
use crate::validate::{validate_contact, validate_credentials, CredentialField};

/// Message shown when a reset is requested without an email
pub const RESET_EMAIL_REQUIRED: &str = "Please enter your email first to reset your password.";

/// Personal contact directory for one device
pub struct Directory {
    config: EngineConfig,
    identity: Arc<dyn IdentityProvider>,
    cache: Arc<dyn DurableCache>,
    sync: Arc<RemoteCollectionSync>,
    profile: Arc<ProfileReconciler>,
    session: Arc<SessionLifecycle>,
    pipeline: ImagePipeline,
}

impl Directory {
    /// Open a directory over the local backend in `config.data_dir`.
    ///
    /// Creates `device.redb` (profile cache) and `backend.redb` (accounts
    /// and contacts) if they do not exist.
    pub fn open(config: EngineConfig) -> SyncResult<Self> {
        config.validate()?;
        info!(data_dir = ?config.data_dir, "Opening directory");
        std::fs::create_dir_all(&config.data_dir)?;

        let device = Storage::new(config.device_db_path())?;
        let backend = Storage::new(config.backend_db_path())?;

        let identity = Arc::new(LocalIdentityProvider::new(backend.clone())?);
        let remote = Arc::new(LocalCollection::new(backend));

        Ok(Self::with_collaborators(
            config,
            identity,
            remote,
            Arc::new(device),
        ))
    }

    /// Load `config.json` from `data_dir` and open the local backend there.
    pub fn open_dir(data_dir: impl AsRef<Path>) -> SyncResult<Self> {
        Self::open(EngineConfig::load(data_dir)?)
    }

    /// Wire the components around externally supplied collaborators
    pub fn with_collaborators(
        config: EngineConfig,
        identity: Arc<dyn IdentityProvider>,
        remote: Arc<dyn RemoteCollection>,
        cache: Arc<dyn DurableCache>,
    ) -> Self {
        let sync = Arc::new(RemoteCollectionSync::with_capacity(
            remote,
            config.event_channel_capacity,
        ));
        let profile = Arc::new(ProfileReconciler::new(identity.clone(), cache.clone()));
        let session = Arc::new(SessionLifecycle::new(sync.clone(), profile.clone()));
        let pipeline = ImagePipeline::from_config(&config);

        Self {
            config,
            identity,
            cache,
            sync,
            profile,
            session,
            pipeline,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Session
    // ═══════════════════════════════════════════════════════════════════════

    /// Pick up a session the provider already holds (e.g. from a previous
    /// run) and start syncing it.
    pub async fn resume(&self) -> SyncResult<Option<Identity>> {
        let identity = self.identity.current_identity();
        if let Some(identity) = &identity {
            debug!(identity = %identity.id, "Resuming session");
        }
        self.session.on_identity_changed(identity.clone()).await?;
        Ok(identity)
    }

    /// Validate the sign-up form, create the account and start its session.
    pub async fn sign_up(&self, email: &str, password: &str, confirm: &str) -> SyncResult<Identity> {
        validate_credentials(email, password, confirm).into_result()?;

        let identity = self
            .identity
            .sign_up(email.trim(), password)
            .await
            .map_err(|e| translate(e, AuthAction::SignUp))?;
        self.session.on_identity_changed(Some(identity.clone())).await?;
        Ok(identity)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> SyncResult<Identity> {
        let identity = self
            .identity
            .sign_in(email.trim(), password)
            .await
            .map_err(|e| translate(e, AuthAction::SignIn))?;
        self.session.on_identity_changed(Some(identity.clone())).await?;
        Ok(identity)
    }

    /// End the session. The profile cache is kept for the next sign-in.
    pub async fn sign_out(&self) -> SyncResult<()> {
        self.identity
            .sign_out()
            .await
            .map_err(|e| translate(e, AuthAction::SignOut))?;
        self.session.on_identity_changed(None).await
    }

    pub async fn send_password_reset(&self, email: &str) -> SyncResult<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(SyncError::validation([(
                CredentialField::Email,
                RESET_EMAIL_REQUIRED,
            )]));
        }
        self.identity
            .send_password_reset(email)
            .await
            .map_err(|e| translate(e, AuthAction::PasswordReset))
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.identity.current_identity()
    }

    /// Receiver of the provider's identity transitions
    pub fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.identity.watch_identity()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Contacts
    // ═══════════════════════════════════════════════════════════════════════

    /// Validate and create a contact owned by the signed-in identity.
    pub async fn add_contact(&self, data: ContactFormData) -> SyncResult<Contact> {
        let data = data.trimmed();
        validate_contact(&data).into_result()?;
        self.sync.create(data).await
    }

    pub async fn edit_contact(&self, id: &ContactId, data: ContactFormData) -> SyncResult<Contact> {
        let data = data.trimmed();
        validate_contact(&data).into_result()?;
        self.sync.update(id, data).await
    }

    pub async fn set_contact_status(
        &self,
        id: &ContactId,
        status: ContactStatus,
    ) -> SyncResult<Contact> {
        self.sync.set_status(id, status).await
    }

    pub async fn delete_contact(&self, id: &ContactId) -> SyncResult<()> {
        self.sync.delete(id).await
    }

    /// Latest snapshot of the signed-in identity's contacts
    pub fn snapshot(&self) -> ContactSnapshot {
        self.sync.snapshot()
    }

    /// Wait for the current subscription to deliver its first snapshot.
    pub async fn wait_until_synced(&self) -> SyncResult<ContactSnapshot> {
        if self.sync.identity().is_none() {
            return Err(SyncError::NotSignedIn);
        }
        self.sync
            .wait_until_live(self.sync.current_generation())
            .await
    }

    /// Wait until the snapshot satisfies `predicate`, e.g. after a write.
    pub async fn wait_for_snapshot(
        &self,
        mut predicate: impl FnMut(&ContactSnapshot) -> bool,
    ) -> SyncResult<ContactSnapshot> {
        let mut rx = self.sync.watch();
        let snapshot = rx
            .wait_for(|s| predicate(s))
            .await
            .map_err(|_| SyncError::InvalidOperation("sync shut down".to_string()))?
            .clone();
        Ok(snapshot)
    }

    pub fn view(&self, filter: &FilterState) -> Vec<Contact> {
        filter::derive(&self.sync.snapshot().contacts, filter)
    }

    /// Dashboard counters for `today` and the most recent contacts
    pub fn dashboard(&self, today: NaiveDate) -> (DashboardStats, Vec<Contact>) {
        let snapshot = self.sync.snapshot();
        let stats = DashboardStats::compute(&snapshot.contacts, today);
        let recent = filter::derive(
            &snapshot.contacts,
            &FilterState::new("", filter::Category::Dashboard),
        );
        (stats, recent)
    }

    /// Dashboard as of today's device-local date
    pub fn dashboard_today(&self) -> (DashboardStats, Vec<Contact>) {
        self.dashboard(Local::now().date_naive())
    }

    pub fn sync_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.sync.events()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Profile
    // ═══════════════════════════════════════════════════════════════════════

    pub fn profile(&self) -> Profile {
        self.profile.profile()
    }

    pub fn watch_profile(&self) -> watch::Receiver<Profile> {
        self.profile.watch()
    }

    pub async fn commit_profile(&self, update: ProfileUpdate) -> SyncResult<CommitReport> {
        self.profile.commit(update).await
    }

    /// Run an upload through the image pipeline. Does not touch the profile.
    pub fn process_avatar(&self, blob: &ImageBlob) -> SyncResult<AvatarImage> {
        Ok(self.pipeline.process(blob)?)
    }

    /// Process an upload and commit it as the avatar.
    pub async fn set_avatar(&self, blob: &ImageBlob) -> SyncResult<CommitReport> {
        let avatar = self.process_avatar(blob)?;
        self.commit_profile(ProfileUpdate::avatar(avatar)).await
    }

    /// Read a cached profile without any identity confirmed
    pub fn peek_cached_profile(&self, identity: &IdentityId) -> SyncResult<Option<Profile>> {
        profile::peek_cached(self.cache.as_ref(), identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open() -> (TempDir, Directory) {
        let temp_dir = TempDir::new().unwrap();
        let dir = Directory::open(EngineConfig::new(temp_dir.path())).unwrap();
        (temp_dir, dir)
    }

    #[test]
    fn test_open_creates_databases() {
        let (temp_dir, _dir) = open();
        assert!(temp_dir.path().join("device.redb").exists());
        assert!(temp_dir.path().join("backend.redb").exists());
    }

    #[tokio::test]
    async fn test_sign_up_validates_before_provider() {
        let (_temp, dir) = open();
        let err = dir.sign_up("ada@example.com", "abc12345", "abc12345").await.unwrap_err();
        let fields = err.field_errors().unwrap();
        assert!(fields.contains_key("password"));
        assert!(dir.current_identity().is_none());
    }

    #[tokio::test]
    async fn test_reset_requires_email() {
        let (_temp, dir) = open();
        let err = dir.send_password_reset("  ").await.unwrap_err();
        assert_eq!(
            err.field_errors().unwrap().get("email").map(String::as_str),
            Some(RESET_EMAIL_REQUIRED)
        );
    }

    #[tokio::test]
    async fn test_contact_writes_need_session() {
        let (_temp, dir) = open();
        let err = dir
            .add_contact(ContactFormData {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                phone: "+1-202-555-0101".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotSignedIn));
    }

    #[tokio::test]
    async fn test_invalid_contact_never_reaches_remote() {
        let (_temp, dir) = open();
        dir.sign_up("ada@example.com", "Abc123!@", "Abc123!@").await.unwrap();
        dir.wait_until_synced().await.unwrap();

        let err = dir
            .add_contact(ContactFormData {
                name: "Ada".into(),
                email: "not-an-email".into(),
                phone: "123".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        let fields = err.field_errors().unwrap();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("phone"));
        assert!(dir.snapshot().contacts.is_empty());
    }
}
