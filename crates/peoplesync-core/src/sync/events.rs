//! Sync event types and status tracking for the live contact query
//!
//! ## Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  SyncStatus: State of the current subscription                  │
//! │  ├── Idle: No identity subscribed                               │
//! │  ├── Connecting: Query opened, first snapshot not yet in        │
//! │  ├── Live: Snapshot tracks the remote partition                 │
//! │  └── Error: Query failed or closed                              │
//! │                                                                 │
//! │  SyncEvent: Notifications about sync activity                   │
//! │  ├── SnapshotReplaced: A new full snapshot was published        │
//! │  ├── StaleDiscarded: Event from an older generation dropped     │
//! │  ├── StatusChanged: Subscription status moved                   │
//! │  └── SyncError: The live query failed                           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use crate::types::IdentityId;

/// Status of the live contact subscription
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SyncStatus {
    /// No identity subscribed
    #[default]
    Idle,
    /// Waiting for the first snapshot
    Connecting,
    /// Receiving live updates
    Live {
        /// Contacts in the current snapshot
        contact_count: usize,
    },
    /// The live query failed or was closed by the store
    Error(String),
}

impl SyncStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, SyncStatus::Live { .. })
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "Idle"),
            SyncStatus::Connecting => write!(f, "Connecting"),
            SyncStatus::Live { contact_count } => write!(f, "Live ({} contacts)", contact_count),
            SyncStatus::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Events emitted by [`super::RemoteCollectionSync`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A complete replacement snapshot was published
    SnapshotReplaced {
        generation: u64,
        identity: IdentityId,
        contact_count: usize,
    },
    /// An event tagged with an older generation was dropped
    StaleDiscarded {
        /// Generation the event was tagged with
        generation: u64,
        /// Generation in effect when it arrived
        current: u64,
    },
    StatusChanged {
        generation: u64,
        status: SyncStatus,
    },
    SyncError {
        generation: u64,
        message: String,
    },
}

impl SyncEvent {
    /// Generation the event belongs to
    pub fn generation(&self) -> u64 {
        match self {
            SyncEvent::SnapshotReplaced { generation, .. } => *generation,
            SyncEvent::StaleDiscarded { generation, .. } => *generation,
            SyncEvent::StatusChanged { generation, .. } => *generation,
            SyncEvent::SyncError { generation, .. } => *generation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_status_default_is_idle() {
        let status: SyncStatus = Default::default();
        assert_eq!(status, SyncStatus::Idle);
        assert!(!status.is_live());
    }

    #[test]
    fn test_sync_status_display() {
        assert_eq!(format!("{}", SyncStatus::Connecting), "Connecting");
        assert_eq!(
            format!("{}", SyncStatus::Live { contact_count: 3 }),
            "Live (3 contacts)"
        );
        assert_eq!(
            format!("{}", SyncStatus::Error("closed".to_string())),
            "Error: closed"
        );
    }

    #[test]
    fn test_sync_event_generation() {
        let event = SyncEvent::StaleDiscarded {
            generation: 1,
            current: 2,
        };
        assert_eq!(event.generation(), 1);
    }
}
