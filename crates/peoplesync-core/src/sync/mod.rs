//! Live synchronization of the contact collection
//!
//! [`RemoteCollectionSync`] keeps a local snapshot of the signed-in
//! identity's partition of the remote collection. Every subscription is
//! tagged with a generation; events from older generations are discarded.

mod collection;
pub mod events;

pub use collection::{ContactSnapshot, RemoteCollectionSync};
pub use events::{SyncEvent, SyncStatus};
