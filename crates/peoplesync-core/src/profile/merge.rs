//! Precedence rule for the three profile stores
//!
//! | Field          | Winner (first present)          |
//! |----------------|---------------------------------|
//! | `avatar_image` | memory, cache, provider         |
//! | `display_name` | memory, cache, provider         |
//! | `email`        | provider, cache, memory         |
//!
//! The provider never holds an avatar, and on a fresh load memory is empty,
//! so in practice the cache wins over the provider for avatar and name.

use crate::types::{PartialProfile, Profile};

/// Merge what each store knows into one canonical profile.
pub fn reconcile(
    provider: &PartialProfile,
    memory: &PartialProfile,
    cache: &PartialProfile,
) -> Profile {
    Profile {
        avatar_image: first(&[
            &memory.avatar_image,
            &cache.avatar_image,
            &provider.avatar_image,
        ]),
        display_name: first(&[
            &memory.display_name,
            &cache.display_name,
            &provider.display_name,
        ]),
        email: first(&[&provider.email, &cache.email, &memory.email]),
    }
}

fn first<T: Clone>(candidates: &[&Option<T>]) -> Option<T> {
    candidates.iter().find_map(|c| (*c).clone())
}
