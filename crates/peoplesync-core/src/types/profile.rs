//! Profile types - canonical in-memory profile and its durable mirror
//!
//! One logical profile exists per identity, held in three places:
//! the identity provider (display name only), the in-memory canonical
//! [`Profile`], and the on-device [`CachedProfile`].

use serde::{Deserialize, Serialize};

use super::{AvatarImage, Identity};

/// The canonical profile the rest of the system renders from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub avatar_image: Option<AvatarImage>,
    pub display_name: Option<String>,
    /// Read-only after account creation
    pub email: Option<String>,
}

impl Profile {
    pub fn is_empty(&self) -> bool {
        self.avatar_image.is_none() && self.display_name.is_none() && self.email.is_none()
    }

    /// Name to show in headers: display name, else the email's local part.
    pub fn label(&self) -> Option<&str> {
        self.display_name.as_deref().or_else(|| {
            self.email
                .as_deref()
                .map(|email| email.split('@').next().unwrap_or(email))
        })
    }
}

/// What one store knows about a profile; `None` means "this store has no
/// opinion", not "the field is absent".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialProfile {
    pub avatar_image: Option<AvatarImage>,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

impl PartialProfile {
    /// The identity provider only ever holds display name and email.
    pub fn from_identity(identity: &Identity) -> Self {
        Self {
            avatar_image: None,
            display_name: identity.display_name.clone(),
            email: Some(identity.email.clone()),
        }
    }

    pub fn from_cached(cached: &CachedProfile) -> Self {
        Self {
            avatar_image: cached.avatar_image.clone(),
            display_name: cached.display_name.clone(),
            email: cached.email.clone(),
        }
    }

    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            avatar_image: profile.avatar_image.clone(),
            display_name: profile.display_name.clone(),
            email: profile.email.clone(),
        }
    }
}

/// Durable per-identity mirror of the canonical profile
///
/// Stored under `profile:<identityId>`. Survives sign-out on purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedProfile {
    pub avatar_image: Option<AvatarImage>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    /// Unix timestamp (millis) of the write
    pub updated_at: i64,
}

impl CachedProfile {
    /// Snapshot a canonical profile, stamped with the current time
    pub fn mirror(profile: &Profile) -> Self {
        Self {
            avatar_image: profile.avatar_image.clone(),
            display_name: profile.display_name.clone(),
            email: profile.email.clone(),
            updated_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn to_profile(&self) -> Profile {
        Profile {
            avatar_image: self.avatar_image.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
        }
    }
}

/// Profile fields a commit can touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProfileField {
    DisplayName,
    AvatarImage,
    Password,
}

impl std::fmt::Display for ProfileField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ProfileField::DisplayName => "display_name",
            ProfileField::AvatarImage => "avatar_image",
            ProfileField::Password => "password",
        })
    }
}
