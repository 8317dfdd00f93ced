//! Local identity provider backed by redb
//!
//! Accounts are keyed by normalised email. Passwords are stored as a salted
//! blake3 hash; the plaintext never leaves this module and is never logged.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::RngCore;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::error::SyncError;
use crate::storage::{AccountRecord, Storage};
use crate::types::{Identity, IdentityId};
use crate::validate::is_valid_email;

use super::errors::{ErrorCode, ProviderError};
use super::IdentityProvider;

/// Minimum password length the provider itself enforces
pub const PROVIDER_MIN_PASSWORD_LEN: usize = 6;

/// How long a sign-in or reauthentication counts as "recent"
const RECENT_LOGIN_WINDOW: Duration = Duration::from_secs(5 * 60);

const SALT_LEN: usize = 16;

/// [`IdentityProvider`] over the `accounts`/`session` tables of a [`Storage`]
pub struct LocalIdentityProvider {
    storage: Storage,
    current: watch::Sender<Option<Identity>>,
    last_login: Mutex<Option<Instant>>,
}

impl LocalIdentityProvider {
    /// Open the provider, restoring a persisted session if there is one.
    pub fn new(storage: Storage) -> Result<Self, SyncError> {
        let restored = match storage.load_session()? {
            Some(id) => match storage.load_account_by_id(&id)? {
                Some(account) if !account.disabled => Some(identity_of(&account)),
                _ => {
                    warn!(identity = %id, "Dropping session for missing or disabled account");
                    storage.save_session(None)?;
                    None
                }
            },
            None => None,
        };

        if let Some(identity) = &restored {
            debug!(identity = %identity.id, "Restored session");
        }

        let (current, _) = watch::channel(restored);
        Ok(Self {
            storage,
            current,
            last_login: Mutex::new(None),
        })
    }

    fn account(&self, email: &str) -> Result<Option<AccountRecord>, ProviderError> {
        self.storage.load_account(email).map_err(unavailable)
    }

    fn current_account(&self) -> Result<AccountRecord, ProviderError> {
        let identity = self
            .current
            .borrow()
            .clone()
            .ok_or_else(|| ProviderError::new("auth/no-current-user", "no user is signed in"))?;

        self.storage
            .load_account_by_id(&identity.id)
            .map_err(unavailable)?
            .ok_or_else(|| ErrorCode::UserNotFound.error("account no longer exists"))
    }

    fn establish_session(&self, account: &AccountRecord) -> Result<Identity, ProviderError> {
        self.storage
            .save_session(Some(&account.id))
            .map_err(unavailable)?;
        *self.last_login.lock() = Some(Instant::now());

        let identity = identity_of(account);
        self.current.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    fn login_is_recent(&self) -> bool {
        self.last_login
            .lock()
            .is_some_and(|at| at.elapsed() <= RECENT_LOGIN_WINDOW)
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        let email = normalise_email(email);
        if !is_valid_email(&email) {
            return Err(ErrorCode::InvalidEmail.error("malformed email"));
        }
        if password.is_empty() {
            return Err(ErrorCode::MissingPassword.error("password is empty"));
        }

        let account = self
            .account(&email)?
            .ok_or_else(|| ErrorCode::UserNotFound.error("no account for email"))?;
        if account.disabled {
            return Err(ErrorCode::UserDisabled.error("account disabled"));
        }
        if !verify_password(&account, password) {
            return Err(ErrorCode::WrongPassword.error("password mismatch"));
        }

        info!(identity = %account.id, "Signed in");
        self.establish_session(&account)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        let email = normalise_email(email);
        if !is_valid_email(&email) {
            return Err(ErrorCode::InvalidEmail.error("malformed email"));
        }
        if password.chars().count() < PROVIDER_MIN_PASSWORD_LEN {
            return Err(ErrorCode::WeakPassword.error("password too short"));
        }
        if self.account(&email)?.is_some() {
            return Err(ErrorCode::EmailAlreadyInUse.error("email already registered"));
        }

        let (salt, password_hash) = hash_new_password(password);
        let account = AccountRecord {
            id: IdentityId::new(Ulid::new().to_string()),
            email,
            display_name: None,
            password_hash,
            salt,
            created_at: chrono::Utc::now().timestamp_millis(),
            disabled: false,
        };
        self.storage.save_account(&account).map_err(unavailable)?;

        info!(identity = %account.id, "Account created");
        self.establish_session(&account)
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.storage.save_session(None).map_err(unavailable)?;
        *self.last_login.lock() = None;

        let previous = self.current.send_replace(None);
        if let Some(identity) = previous {
            info!(identity = %identity.id, "Signed out");
        }
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), ProviderError> {
        let email = normalise_email(email);
        if !is_valid_email(&email) {
            return Err(ErrorCode::InvalidEmail.error("malformed email"));
        }
        if self.account(&email)?.is_none() {
            return Err(ErrorCode::UserNotFound.error("no account for email"));
        }

        self.storage
            .record_password_reset(&email, chrono::Utc::now().timestamp_millis())
            .map_err(unavailable)?;
        info!(email = %email, "Password reset requested");
        Ok(())
    }

    fn current_identity(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    async fn update_display_name(&self, name: &str) -> Result<(), ProviderError> {
        let mut account = self.current_account()?;
        account.display_name = Some(name.to_string());
        self.storage.save_account(&account).map_err(unavailable)?;

        self.current.send_modify(|current| {
            if let Some(identity) = current {
                identity.display_name = Some(name.to_string());
            }
        });
        debug!(identity = %account.id, "Display name updated");
        Ok(())
    }

    async fn reauthenticate(
        &self,
        email: &str,
        current_password: &str,
    ) -> Result<(), ProviderError> {
        let account = self.current_account()?;
        if normalise_email(email) != account.email {
            return Err(ProviderError::new(
                "auth/user-mismatch",
                "credential does not belong to the signed-in user",
            ));
        }
        if current_password.is_empty() {
            return Err(ErrorCode::MissingPassword.error("password is empty"));
        }
        if !verify_password(&account, current_password) {
            return Err(ErrorCode::WrongPassword.error("password mismatch"));
        }

        *self.last_login.lock() = Some(Instant::now());
        debug!(identity = %account.id, "Reauthenticated");
        Ok(())
    }

    async fn change_password(&self, new_password: &str) -> Result<(), ProviderError> {
        let mut account = self.current_account()?;
        if !self.login_is_recent() {
            return Err(ErrorCode::RequiresRecentLogin.error("reauthenticate first"));
        }
        if new_password.chars().count() < PROVIDER_MIN_PASSWORD_LEN {
            return Err(ErrorCode::WeakPassword.error("password too short"));
        }

        let (salt, password_hash) = hash_new_password(new_password);
        account.salt = salt;
        account.password_hash = password_hash;
        self.storage.save_account(&account).map_err(unavailable)?;

        info!(identity = %account.id, "Password changed");
        Ok(())
    }

    fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }
}

fn identity_of(account: &AccountRecord) -> Identity {
    Identity {
        id: account.id.clone(),
        email: account.email.clone(),
        display_name: account.display_name.clone(),
    }
}

fn normalise_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn unavailable(err: SyncError) -> ProviderError {
    warn!(error = %err, "Identity storage failure");
    ErrorCode::Unavailable.error(err.to_string())
}

fn password_digest(salt: &[u8], password: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize()
}

/// Fresh salt and hash for `password`, both hex encoded
fn hash_new_password(password: &str) -> (String, String) {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    let digest = password_digest(&salt, password);
    (hex::encode(salt), digest.to_hex().to_string())
}

fn verify_password(account: &AccountRecord, password: &str) -> bool {
    let Ok(salt) = hex::decode(&account.salt) else {
        return false;
    };
    let Ok(stored) = blake3::Hash::from_hex(&account.password_hash) else {
        return false;
    };
    // blake3::Hash equality is constant-time
    password_digest(&salt, password) == stored
}
