//! Core types for peoplesync

use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub mod contact;
pub mod image;
pub mod profile;

pub use contact::{Contact, ContactField, ContactFormData, ContactStatus};
pub use image::{AvatarImage, ImageBlob};
pub use profile::{CachedProfile, PartialProfile, Profile, ProfileField};

/// Stable opaque id of an authenticated end-user
///
/// Assigned by the identity provider; never derived locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityId(pub String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Namespaced durable-cache key for this identity's profile.
    pub fn profile_cache_key(&self) -> String {
        format!("profile:{}", self.0)
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Remote-assigned contact id
///
/// The local backend issues ULIDs so ids sort by creation time, but callers
/// must treat the string as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContactId(pub String);

impl ContactId {
    /// Generate a fresh id (used by the local backend only)
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated identity as reported by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub email: String,
    /// Provider-held display name, authoritative only at first load
    pub display_name: Option<String>,
}
