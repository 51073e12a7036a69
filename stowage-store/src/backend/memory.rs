//! In-memory implementation of the Storer contract, the counterpart of
//! an in-process cache engine. Values are reclaimed lazily on read; the
//! backend clock only decides reclamation, never freshness.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::warn;

use stowage_core::{expires_at, Expiry, StorageError, Storer};

#[derive(Debug, Clone)]
struct StoredValue {
    value: Vec<u8>,
    invalid_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.invalid_at.is_some_and(|invalid_at| invalid_at <= now)
    }
}

pub struct MemoryStorer {
    store: Mutex<HashMap<String, StoredValue>>,
    stale: Duration,
}

impl MemoryStorer {
    pub fn new(stale: Duration) -> Self {
        Self {
            store: Mutex::new(HashMap::new()),
            stale,
        }
    }
}

#[async_trait]
impl Storer for MemoryStorer {
    fn name(&self) -> &'static str {
        "MEMORY"
    }

    fn uuid(&self) -> String {
        format!("MEMORY-{}", self.stale.as_secs())
    }

    fn stale_window(&self) -> Duration {
        self.stale
    }

    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut store = self.store.lock().ok()?;
        let now = Utc::now();

        let expired = match store.get(key) {
            Some(stored) => stored.is_expired(now),
            None => return None,
        };

        if expired {
            store.remove(key);

            return None;
        }

        store.get(key).map(|stored| stored.value.clone())
    }

    async fn set(&self, key: &str, value: &[u8], expiry: Expiry) -> Result<(), StorageError> {
        let mut store = self
            .store
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        store.insert(
            key.to_string(),
            StoredValue {
                value: value.to_vec(),
                invalid_at: expires_at(expiry, Utc::now()),
            },
        );

        Ok(())
    }

    async fn delete(&self, key: &str) {
        if let Ok(mut store) = self.store.lock() {
            store.remove(key);
        }
    }

    async fn delete_many(&self, pattern: &str) {
        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => {
                warn!("invalid pattern {pattern} passed to delete_many: {e}");

                return;
            }
        };

        if let Ok(mut store) = self.store.lock() {
            store.retain(|key, _| !re.is_match(key));
        }
    }

    async fn map_keys(&self, prefix: &str) -> HashMap<String, String> {
        let mut keys = HashMap::new();

        if let Ok(store) = self.store.lock() {
            let now = Utc::now();

            for (key, stored) in store.iter() {
                if stored.is_expired(now) {
                    continue;
                }

                if let Some(stripped) = key.strip_prefix(prefix) {
                    keys.insert(
                        stripped.to_string(),
                        String::from_utf8_lossy(&stored.value).into_owned(),
                    );
                }
            }
        }

        keys
    }

    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn reset(&self) -> Result<(), StorageError> {
        let mut store = self
            .store
            .lock()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        store.clear();

        Ok(())
    }
}

impl std::fmt::Debug for MemoryStorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size = self.store.lock().map(|store| store.len()).unwrap_or(0);

        f.debug_struct("MemoryStorer")
            .field("size", &size)
            .field("stale", &self.stale)
            .finish()
    }
}
