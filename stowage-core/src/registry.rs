//! Open-handle registry keyed by backend fingerprint.
//!
//! Callers reuse one adapter per [`Storer::uuid`](crate::Storer::uuid)
//! instead of opening duplicate physical connections with divergent
//! reconnect state. The registry is an explicit object owned by the
//! embedding layer, with an explicit shutdown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::storer::AbstractStorer;
use crate::StorageError;

#[derive(Default)]
pub struct StorerRegistry {
    inner: Mutex<HashMap<String, AbstractStorer>>,
}

impl StorerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `storer`, or returns the instance already open for the
    /// same fingerprint.
    pub fn register(&self, storer: AbstractStorer) -> Result<AbstractStorer, StorageError> {
        let uuid = storer.uuid();
        let mut inner = self
            .inner
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        if let Some(existing) = inner.get(&uuid) {
            debug!("reuse the already open {} storer {uuid}", existing.name());

            return Ok(Arc::clone(existing));
        }

        inner.insert(uuid, Arc::clone(&storer));

        Ok(storer)
    }

    /// The already open instance for `uuid`, if any.
    pub fn get(&self, uuid: &str) -> Option<AbstractStorer> {
        self.inner.lock().ok()?.get(uuid).cloned()
    }

    /// Fingerprints of every open handle.
    pub fn uuids(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Drops every registered handle.
    pub fn shutdown(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.clear();
        }
    }
}
