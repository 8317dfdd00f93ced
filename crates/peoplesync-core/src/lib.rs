//! peoplesync Core Library
//!
//! A personal contact directory kept in sync with a per-user partition of a
//! remote store, plus a user profile reconciled across the identity
//! provider, memory, and an on-device cache.
//!
//! ## Overview
//!
//! ```text
//!  identity transitions ──▶ SessionLifecycle
//!                              ├──▶ RemoteCollectionSync ──▶ snapshot ──▶ filter::derive
//!                              └──▶ ProfileReconciler    ──▶ canonical Profile
//!                                        ▲
//!                         ImagePipeline ─┘ (candidate avatars)
//! ```
//!
//! The identity provider, remote collection and durable cache are traits;
//! a redb-backed local implementation of each ships with the crate.
//!
//! ## Quick Start
//!
//! ```ignore
//! use peoplesync_core::{ContactFormData, Directory, EngineConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dir = Directory::open(EngineConfig::new("~/.peoplesync/data"))?;
//!     dir.sign_up("ada@example.com", "Abc123!@", "Abc123!@").await?;
//!
//!     dir.add_contact(ContactFormData {
//!         name: "Charles Babbage".into(),
//!         email: "charles@example.com".into(),
//!         phone: "+44 20 7946 0958".into(),
//!         ..Default::default()
//!     })
//!     .await?;
//!
//!     let snapshot = dir.wait_for_snapshot(|s| !s.contacts.is_empty()).await?;
//!     println!("{} contacts", snapshot.contacts.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod identity;
pub mod imaging;
pub mod profile;
pub mod remote;
pub mod session;
pub mod storage;
pub mod sync;
pub mod types;
pub mod validate;

// Re-exports
pub use config::EngineConfig;
pub use engine::Directory;
pub use error::{SyncError, SyncResult};
pub use filter::{Category, DashboardStats, FilterState};
pub use identity::{IdentityProvider, LocalIdentityProvider, ProviderError};
pub use imaging::{ImagePipeline, ImageProcessingError};
pub use profile::{CommitReport, CredentialChange, ProfileReconciler, ProfileUpdate};
pub use remote::{LocalCollection, RemoteCollection, RemoteEvent};
pub use session::SessionLifecycle;
pub use storage::{DurableCache, MemoryCache, Storage};
pub use sync::{ContactSnapshot, RemoteCollectionSync, SyncEvent, SyncStatus};
pub use types::*;
