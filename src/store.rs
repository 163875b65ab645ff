//! # Application Store
//!
//! Read-only access to the in-memory application index kept fresh by the
//! application watcher. The metrics exporter only ever lists from it.

use crate::crd::Application;
use kube_runtime::reflector::Store;
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use thiserror::Error;

/// Failure to list applications from the store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The watcher has not delivered its initial listing yet
    #[error("application store has not completed its initial sync")]
    NotSynced,
    /// Backend-specific failure
    #[error("application store unavailable: {0}")]
    Unavailable(String),
}

/// Lists applications from an eventually-consistent index
pub trait ApplicationLister: Send + Sync {
    /// List every application in the index (no selector, matches all)
    fn list(&self) -> Result<Vec<Arc<Application>>, StoreError>;
}

impl<T: ApplicationLister + ?Sized> ApplicationLister for Arc<T> {
    fn list(&self) -> Result<Vec<Arc<Application>>, StoreError> {
        (**self).list()
    }
}

/// Lister backed by a `kube_runtime` reflector store
///
/// Listing fails with [`StoreError::NotSynced`] until the watcher reports the
/// end of its initial listing, so a cold cache is never exported as "no applications".
#[derive(Clone)]
pub struct ReflectorLister {
    store: Store<Application>,
    synced_at: Arc<RwLock<Option<SystemTime>>>,
}

impl ReflectorLister {
    pub fn new(store: Store<Application>) -> Self {
        Self {
            store,
            synced_at: Arc::new(RwLock::new(None)),
        }
    }

    /// Record the end of a full listing (initial or after a watch restart)
    pub fn mark_synced(&self) {
        let now = Some(SystemTime::now());
        match self.synced_at.write() {
            Ok(mut guard) => *guard = now,
            Err(poisoned) => *poisoned.into_inner() = now,
        }
    }

    /// Time of the last full listing, `None` before the first one completes
    pub fn last_synced(&self) -> Option<SystemTime> {
        match self.synced_at.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn is_synced(&self) -> bool {
        self.last_synced().is_some()
    }

    /// Number of cached applications
    pub fn len(&self) -> usize {
        self.store.state().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ReflectorLister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectorLister")
            .field("synced", &self.is_synced())
            .finish_non_exhaustive()
    }
}

impl ApplicationLister for ReflectorLister {
    fn list(&self) -> Result<Vec<Arc<Application>>, StoreError> {
        if !self.is_synced() {
            return Err(StoreError::NotSynced);
        }
        Ok(self.store.state())
    }
}
