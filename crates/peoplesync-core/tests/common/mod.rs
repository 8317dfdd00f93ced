//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use peoplesync_core::identity::{IdentityProvider, LocalIdentityProvider, ProviderError};
use peoplesync_core::{
    ContactSnapshot, Directory, EngineConfig, Identity, LocalCollection, MemoryCache, Storage,
};
use tempfile::TempDir;
use tokio::sync::watch;

pub const PASSWORD: &str = "Abc123!@";

/// Default timeout for waiting on live snapshots
pub const WAIT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

/// Identity provider wrapper that counts the sensitive calls
pub struct RecordingProvider {
    inner: LocalIdentityProvider,
    pub reauthenticate_calls: AtomicUsize,
    pub change_password_calls: AtomicUsize,
    pub update_display_name_calls: AtomicUsize,
}

impl RecordingProvider {
    pub fn new(inner: LocalIdentityProvider) -> Self {
        Self {
            inner,
            reauthenticate_calls: AtomicUsize::new(0),
            change_password_calls: AtomicUsize::new(0),
            update_display_name_calls: AtomicUsize::new(0),
        }
    }

    pub fn reauthentications(&self) -> usize {
        self.reauthenticate_calls.load(Ordering::SeqCst)
    }

    pub fn password_changes(&self) -> usize {
        self.change_password_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for RecordingProvider {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        self.inner.sign_in(email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, ProviderError> {
        self.inner.sign_up(email, password).await
    }

    async fn sign_out(&self) -> Result<(), ProviderError> {
        self.inner.sign_out().await
    }

    async fn send_password_reset(&self, email: &str) -> Result<(), ProviderError> {
        self.inner.send_password_reset(email).await
    }

    fn current_identity(&self) -> Option<Identity> {
        self.inner.current_identity()
    }

    async fn update_display_name(&self, name: &str) -> Result<(), ProviderError> {
        self.update_display_name_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.update_display_name(name).await
    }

    async fn reauthenticate(
        &self,
        email: &str,
        current_password: &str,
    ) -> Result<(), ProviderError> {
        self.reauthenticate_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.reauthenticate(email, current_password).await
    }

    async fn change_password(&self, new_password: &str) -> Result<(), ProviderError> {
        self.change_password_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.change_password(new_password).await
    }

    fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.inner.watch_identity()
    }
}

/// A directory over the local backend, with the provider and cache exposed
pub struct TestDirectory {
    pub temp_dir: TempDir,
    pub dir: Directory,
    pub provider: Arc<RecordingProvider>,
    pub cache: Arc<MemoryCache>,
}

pub fn test_directory() -> TestDirectory {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let backend = Storage::new(temp_dir.path().join("backend.redb")).unwrap();
    let provider = Arc::new(RecordingProvider::new(
        LocalIdentityProvider::new(backend.clone()).unwrap(),
    ));
    let cache = Arc::new(MemoryCache::new());
    let dir = Directory::with_collaborators(
        EngineConfig::new(temp_dir.path()),
        provider.clone(),
        Arc::new(LocalCollection::new(backend)),
        cache.clone(),
    );
    TestDirectory {
        temp_dir,
        dir,
        provider,
        cache,
    }
}

/// Wait (bounded) until the directory's snapshot satisfies `predicate`
pub async fn wait_for(
    dir: &Directory,
    predicate: impl FnMut(&ContactSnapshot) -> bool,
) -> ContactSnapshot {
    tokio::time::timeout(WAIT, dir.wait_for_snapshot(predicate))
        .await
        .expect("timed out waiting for snapshot")
        .unwrap()
}
