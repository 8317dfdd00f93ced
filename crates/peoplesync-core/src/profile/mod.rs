//! Profile reconciliation
//!
//! [`ProfileReconciler`] owns the canonical in-memory [`Profile`] and keeps
//! the durable cache a mirror of it.
//!
//! ```text
//!            load_for_identity             commit (any number)
//!  Unloaded ───────────────────▶ Loaded ◀──────────────────┐
//!     ▲                            │  └────────────────────┘
//!     └──────── clear_on_sign_out ─┘
//! ```
//!
//! Every successful field change computes the next profile, writes it to
//! the cache, and only then swaps it in as canonical. If the cache write
//! fails, canonical state is left as it was.

pub mod merge;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};
use crate::identity::{translate, AuthAction, IdentityProvider};
use crate::storage::DurableCache;
use crate::types::{
    AvatarImage, CachedProfile, Identity, IdentityId, PartialProfile, Profile, ProfileField,
};
use crate::validate::{check_password_policy, validate_display_name};

pub use merge::reconcile;

/// Message used when a credential change arrives without the current password
pub const CURRENT_PASSWORD_REQUIRED: &str =
    "Please enter your current password to change it.";

/// A requested password change
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialChange {
    pub current_password: Option<String>,
    pub new_password: String,
    pub confirm: String,
}

impl std::fmt::Debug for CredentialChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialChange")
            .field("current_password", &self.current_password.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

/// Fields to commit; `None` leaves a field alone
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    /// Expected to come out of the image pipeline
    pub avatar_image: Option<AvatarImage>,
    pub credential: Option<CredentialChange>,
}

impl ProfileUpdate {
    pub fn display_name(name: impl Into<String>) -> Self {
        Self {
            display_name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn avatar(image: AvatarImage) -> Self {
        Self {
            avatar_image: Some(image),
            ..Self::default()
        }
    }
}

/// Outcome of a commit. Fields fail independently.
#[derive(Debug, Default)]
pub struct CommitReport {
    pub saved: Vec<ProfileField>,
    pub rejected: Vec<(ProfileField, SyncError)>,
}

impl CommitReport {
    /// Nothing was changed and nothing failed
    pub fn nothing_to_save(&self) -> bool {
        self.saved.is_empty() && self.rejected.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.rejected.is_empty()
    }

    pub fn error(&self, field: ProfileField) -> Option<&SyncError> {
        self.rejected
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, err)| err)
    }
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Unloaded,
    Loaded { identity: Identity, profile: Profile },
}

/// Owner of the canonical profile for the signed-in identity
pub struct ProfileReconciler {
    provider: Arc<dyn IdentityProvider>,
    cache: Arc<dyn DurableCache>,
    state: Mutex<State>,
    profile_tx: watch::Sender<Profile>,
}

impl ProfileReconciler {
    pub fn new(provider: Arc<dyn IdentityProvider>, cache: Arc<dyn DurableCache>) -> Self {
        let (profile_tx, _) = watch::channel(Profile::default());
        Self {
            provider,
            cache,
            state: Mutex::new(State::Unloaded),
            profile_tx,
        }
    }

    /// Seed the canonical profile for `identity` from the cache, overlaid
    /// with whatever the provider holds that the cache does not.
    pub fn load_for_identity(&self, identity: &Identity) -> SyncResult<Profile> {
        let key = identity.id.profile_cache_key();
        let cached = match self.cache.get(&key) {
            Ok(cached) => cached,
            Err(err) => {
                warn!(identity = %identity.id, error = %err, "Profile cache unreadable, loading from provider");
                None
            }
        };

        let mut state = self.state.lock();
        let memory = match &*state {
            State::Loaded {
                identity: loaded,
                profile,
            } if loaded.id == identity.id => PartialProfile::from_profile(profile),
            _ => PartialProfile::default(),
        };
        let cache_view = cached
            .as_ref()
            .map(PartialProfile::from_cached)
            .unwrap_or_default();
        let profile = reconcile(&PartialProfile::from_identity(identity), &memory, &cache_view);

        if cached.as_ref().map(CachedProfile::to_profile).as_ref() != Some(&profile) {
            if let Err(err) = self.cache.set(&key, &CachedProfile::mirror(&profile)) {
                warn!(identity = %identity.id, error = %err, "Could not refresh profile cache");
            }
        }

        info!(identity = %identity.id, from_cache = cached.is_some(), "Profile loaded");
        *state = State::Loaded {
            identity: identity.clone(),
            profile: profile.clone(),
        };
        self.profile_tx.send_replace(profile.clone());
        Ok(profile)
    }

    /// Apply the provided fields.
    ///
    /// Validation, reauthentication and provider failures reject only the
    /// field they concern. A commit that changes nothing returns a report
    /// for which [`CommitReport::nothing_to_save`] is true.
    pub async fn commit(&self, update: ProfileUpdate) -> SyncResult<CommitReport> {
        let (identity, current) = match &*self.state.lock() {
            State::Loaded { identity, profile } => (identity.clone(), profile.clone()),
            State::Unloaded => return Err(SyncError::NotSignedIn),
        };

        let mut report = CommitReport::default();
        let mut staged = PartialProfile::default();

        if let Some(name) = update.display_name {
            match validate_display_name(&name) {
                Err(message) => report.rejected.push((
                    ProfileField::DisplayName,
                    SyncError::validation([(ProfileField::DisplayName, message)]),
                )),
                Ok(name) if current.display_name.as_deref() == Some(name.as_str()) => {}
                Ok(name) => match self.provider.update_display_name(&name).await {
                    Ok(()) => staged.display_name = Some(name),
                    Err(err) => report.rejected.push((
                        ProfileField::DisplayName,
                        translate(err, AuthAction::ProfileUpdate),
                    )),
                },
            }
        }

        if let Some(avatar) = update.avatar_image {
            if current.avatar_image.as_ref() != Some(&avatar) {
                staged.avatar_image = Some(avatar);
            }
        }

        if let Some(change) = update.credential {
            match self.change_credential(&identity, change).await {
                Ok(()) => report.saved.push(ProfileField::Password),
                Err(err) => {
                    warn!(identity = %identity.id, error = %err, "Credential change rejected");
                    report.rejected.push((ProfileField::Password, err));
                }
            }
        }

        if staged != PartialProfile::default() {
            let fields = staged_fields(&staged);
            match self.write_through(&identity.id, staged) {
                Ok(()) => report.saved.extend(fields),
                Err(err) => {
                    warn!(identity = %identity.id, error = %err, "Profile write-through failed");
                    let message = err.to_string();
                    for field in fields {
                        report
                            .rejected
                            .push((field, SyncError::Storage(message.clone())));
                    }
                }
            }
        }

        if report.nothing_to_save() {
            debug!(identity = %identity.id, "Nothing to save");
        } else {
            info!(
                identity = %identity.id,
                saved = report.saved.len(),
                rejected = report.rejected.len(),
                "Profile commit finished"
            );
        }
        Ok(report)
    }

    /// Reauthenticate with the current password, then change it.
    async fn change_credential(
        &self,
        identity: &Identity,
        change: CredentialChange,
    ) -> SyncResult<()> {
        if change.new_password.is_empty() {
            return Err(SyncError::validation([(
                ProfileField::Password,
                "Password is required",
            )]));
        }
        if let Err(message) = check_password_policy(&change.new_password) {
            return Err(SyncError::validation([(ProfileField::Password, message)]));
        }
        if change.new_password != change.confirm {
            return Err(SyncError::validation([(
                ProfileField::Password,
                "Passwords do not match",
            )]));
        }

        let current = change
            .current_password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| SyncError::Reauthentication(CURRENT_PASSWORD_REQUIRED.to_string()))?;

        self.provider
            .reauthenticate(&identity.email, &current)
            .await
            .map_err(|e| translate(e, AuthAction::Reauthenticate))?;
        self.provider
            .change_password(&change.new_password)
            .await
            .map_err(|e| translate(e, AuthAction::ProfileUpdate))?;

        info!(identity = %identity.id, "Password changed");
        Ok(())
    }

    /// Cache first, then canonical. Fields are laid over the canonical
    /// profile as it is now, so the last commit to land wins per field.
    fn write_through(&self, identity_id: &IdentityId, staged: PartialProfile) -> SyncResult<()> {
        let mut state = self.state.lock();
        let State::Loaded { identity, profile } = &mut *state else {
            return Err(SyncError::NotSignedIn);
        };
        if &identity.id != identity_id {
            return Err(SyncError::InvalidOperation(
                "identity changed during commit".to_string(),
            ));
        }

        let next = reconcile(
            &PartialProfile::default(),
            &staged,
            &PartialProfile::from_profile(profile),
        );
        self.cache
            .set(&identity_id.profile_cache_key(), &CachedProfile::mirror(&next))?;

        debug!(identity = %identity_id, "Profile cache written");
        *profile = next.clone();
        self.profile_tx.send_replace(next);
        Ok(())
    }

    /// Reset canonical state. The durable cache is kept.
    pub fn clear_on_sign_out(&self) {
        let previous = std::mem::take(&mut *self.state.lock());
        if let State::Loaded { identity, .. } = previous {
            info!(identity = %identity.id, "Profile cleared");
        }
        self.profile_tx.send_replace(Profile::default());
    }

    /// Snapshot of the canonical profile
    pub fn profile(&self) -> Profile {
        self.profile_tx.borrow().clone()
    }

    /// Receiver notified whenever the canonical profile changes
    pub fn watch(&self) -> watch::Receiver<Profile> {
        self.profile_tx.subscribe()
    }

    /// Identity the profile is loaded for
    pub fn loaded_identity(&self) -> Option<IdentityId> {
        match &*self.state.lock() {
            State::Loaded { identity, .. } => Some(identity.id.clone()),
            State::Unloaded => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded_identity().is_some()
    }
}

/// Read a cached profile without loading it (e.g. before any identity is
/// confirmed at startup).
pub fn peek_cached(cache: &dyn DurableCache, identity: &IdentityId) -> SyncResult<Option<Profile>> {
    Ok(cache
        .get(&identity.profile_cache_key())?
        .map(|cached| cached.to_profile()))
}

fn staged_fields(staged: &PartialProfile) -> Vec<ProfileField> {
    let mut fields = Vec::new();
    if staged.display_name.is_some() {
        fields.push(ProfileField::DisplayName);
    }
    if staged.avatar_image.is_some() {
        fields.push(ProfileField::AvatarImage);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::LocalIdentityProvider;
    use crate::storage::{MemoryCache, Storage};
    use tempfile::TempDir;

    const AVATAR: &str = "data:image/jpeg;base64,/9j/4AAQ";

    struct Fixture {
        _dir: TempDir,
        provider: Arc<LocalIdentityProvider>,
        cache: Arc<MemoryCache>,
        reconciler: ProfileReconciler,
        identity: Identity,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("backend.redb")).unwrap();
        let provider = Arc::new(LocalIdentityProvider::new(storage).unwrap());
        let identity = provider.sign_up("ada@example.com", "Abc123!@").await.unwrap();
        let cache = Arc::new(MemoryCache::new());
        let reconciler = ProfileReconciler::new(provider.clone(), cache.clone());
        Fixture {
            _dir: dir,
            provider,
            cache,
            reconciler,
            identity,
        }
    }

    #[tokio::test]
    async fn test_commit_requires_load() {
        let f = fixture().await;
        let err = f
            .reconciler
            .commit(ProfileUpdate::display_name("Ada"))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotSignedIn));
    }

    #[tokio::test]
    async fn test_load_seeds_email_from_provider() {
        let f = fixture().await;
        let profile = f.reconciler.load_for_identity(&f.identity).unwrap();
        assert_eq!(profile.email.as_deref(), Some("ada@example.com"));
        assert!(f.reconciler.is_loaded());
    }

    #[tokio::test]
    async fn test_display_name_commit_writes_through() {
        let f = fixture().await;
        f.reconciler.load_for_identity(&f.identity).unwrap();

        let report = f
            .reconciler
            .commit(ProfileUpdate::display_name("  Ada Lovelace "))
            .await
            .unwrap();
        assert_eq!(report.saved, vec![ProfileField::DisplayName]);

        let cached = f
            .cache
            .get(&f.identity.id.profile_cache_key())
            .unwrap()
            .unwrap();
        assert_eq!(cached.display_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(f.reconciler.profile().display_name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(
            f.provider.current_identity().unwrap().display_name.as_deref(),
            Some("Ada Lovelace")
        );
    }

    #[tokio::test]
    async fn test_unchanged_commit_is_nothing_to_save() {
        let f = fixture().await;
        f.reconciler.load_for_identity(&f.identity).unwrap();
        f.reconciler
            .commit(ProfileUpdate::display_name("Ada"))
            .await
            .unwrap();

        let report = f
            .reconciler
            .commit(ProfileUpdate::display_name("Ada"))
            .await
            .unwrap();
        assert!(report.nothing_to_save());

        let report = f.reconciler.commit(ProfileUpdate::default()).await.unwrap();
        assert!(report.nothing_to_save());
    }

    #[tokio::test]
    async fn test_invalid_name_does_not_block_avatar() {
        let f = fixture().await;
        f.reconciler.load_for_identity(&f.identity).unwrap();

        let report = f
            .reconciler
            .commit(ProfileUpdate {
                display_name: Some("   ".into()),
                avatar_image: AvatarImage::from_data_uri(AVATAR),
                credential: None,
            })
            .await
            .unwrap();

        assert_eq!(report.saved, vec![ProfileField::AvatarImage]);
        assert!(matches!(
            report.error(ProfileField::DisplayName),
            Some(SyncError::Validation(_))
        ));
        assert!(f.reconciler.profile().avatar_image.is_some());
    }

    #[tokio::test]
    async fn test_missing_current_password_aborts_only_credential() {
        let f = fixture().await;
        f.reconciler.load_for_identity(&f.identity).unwrap();

        let report = f
            .reconciler
            .commit(ProfileUpdate {
                display_name: Some("Ada".into()),
                avatar_image: None,
                credential: Some(CredentialChange {
                    current_password: None,
                    new_password: "Xyz789!@".into(),
                    confirm: "Xyz789!@".into(),
                }),
            })
            .await
            .unwrap();

        assert_eq!(report.saved, vec![ProfileField::DisplayName]);
        assert!(matches!(
            report.error(ProfileField::Password),
            Some(SyncError::Reauthentication(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_current_password_is_reauthentication_error() {
        let f = fixture().await;
        f.reconciler.load_for_identity(&f.identity).unwrap();

        let report = f
            .reconciler
            .commit(ProfileUpdate {
                credential: Some(CredentialChange {
                    current_password: Some("not-it".into()),
                    new_password: "Xyz789!@".into(),
                    confirm: "Xyz789!@".into(),
                }),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(matches!(
            report.error(ProfileField::Password),
            Some(SyncError::Reauthentication(_))
        ));
    }

    #[tokio::test]
    async fn test_password_change_succeeds() {
        let f = fixture().await;
        f.reconciler.load_for_identity(&f.identity).unwrap();

        let report = f
            .reconciler
            .commit(ProfileUpdate {
                credential: Some(CredentialChange {
                    current_password: Some("Abc123!@".into()),
                    new_password: "Xyz789!@".into(),
                    confirm: "Xyz789!@".into(),
                }),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(report.saved, vec![ProfileField::Password]);
    }

    #[tokio::test]
    async fn test_clear_keeps_cache() {
        let f = fixture().await;
        f.reconciler.load_for_identity(&f.identity).unwrap();
        f.reconciler
            .commit(ProfileUpdate::avatar(AvatarImage::from_data_uri(AVATAR).unwrap()))
            .await
            .unwrap();

        f.reconciler.clear_on_sign_out();
        assert!(f.reconciler.profile().is_empty());
        assert!(!f.reconciler.is_loaded());

        let peeked = peek_cached(f.cache.as_ref(), &f.identity.id).unwrap().unwrap();
        assert_eq!(peeked.avatar_image.as_ref().map(|a| a.as_str()), Some(AVATAR));

        let reloaded = f.reconciler.load_for_identity(&f.identity).unwrap();
        assert_eq!(reloaded.avatar_image, peeked.avatar_image);
    }
}
