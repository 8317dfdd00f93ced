//! Identity capability
//!
//! The identity provider is an external collaborator: credential exchange,
//! session state, and the one profile field it holds (display name). This
//! module defines the seam ([`IdentityProvider`]), the fixed error-code table
//! used to translate its failures, and a local implementation backed by redb.

pub mod errors;
mod local;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::types::Identity;

pub use errors::{translate, user_message, AuthAction, ErrorCode, ProviderError};
pub use local::LocalIdentityProvider;

/// Credential exchange and profile-field mutation
///
/// Every fallible call reports a [`ProviderError`] carrying a provider code;
/// callers translate it with [`translate`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ProviderError>;

    /// Create an account and sign it in
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;

    async fn send_password_reset(&self, email: &str) -> Result<(), ProviderError>;

    fn current_identity(&self) -> Option<Identity>;

    async fn update_display_name(&self, name: &str) -> Result<(), ProviderError>;

    /// Prove possession of the current credential before a sensitive change
    async fn reauthenticate(&self, email: &str, current_password: &str)
        -> Result<(), ProviderError>;

    async fn change_password(&self, new_password: &str) -> Result<(), ProviderError>;

    /// Identity transitions (signed in / signed out)
    fn watch_identity(&self) -> watch::Receiver<Option<Identity>>;
}
