//! Fjall-backed persistent storer.
//!
//! Layout: a single `store` partition mapping storage keys to values
//! prefixed with an 8 byte big-endian unix-millisecond expiry (0 when
//! the value never expires). Expired values are reclaimed lazily on
//! read, matching the contract's decoupling of logical freshness from
//! physical expiry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use regex::Regex;
use tracing::{error, warn};

use stowage_core::{expires_at, Expiry, StorageError, Storer};

const EXPIRY_LEN: usize = 8;

pub struct FjallStorer {
    keyspace: Keyspace,
    store: PartitionHandle,
    path: PathBuf,
    stale: Duration,
}

impl FjallStorer {
    pub fn open(path: impl AsRef<Path>, stale: Duration) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let keyspace = Config::new(&path)
            .open()
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let store = keyspace
            .open_partition("store", PartitionCreateOptions::default())
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(Self {
            keyspace,
            store,
            path,
            stale,
        })
    }

    fn encode_value(value: &[u8], invalid_at_millis: u64) -> Vec<u8> {
        let mut buf = Vec::with_capacity(EXPIRY_LEN + value.len());
        buf.extend_from_slice(&invalid_at_millis.to_be_bytes());
        buf.extend_from_slice(value);

        buf
    }

    fn decode_value(raw: &[u8]) -> Option<(u64, &[u8])> {
        if raw.len() < EXPIRY_LEN {
            return None;
        }

        let mut millis = [0u8; EXPIRY_LEN];
        millis.copy_from_slice(&raw[..EXPIRY_LEN]);

        Some((u64::from_be_bytes(millis), &raw[EXPIRY_LEN..]))
    }

    fn now_millis() -> u64 {
        Utc::now().timestamp_millis().max(0) as u64
    }
}

#[async_trait]
impl Storer for FjallStorer {
    fn name(&self) -> &'static str {
        "FJALL"
    }

    fn uuid(&self) -> String {
        format!("{}-{}", self.path.display(), self.stale.as_secs())
    }

    fn stale_window(&self) -> Duration {
        self.stale
    }

    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let raw = self.store.get(key).ok().flatten()?;
        let (invalid_at, value) = Self::decode_value(&raw)?;

        if invalid_at != 0 && invalid_at <= Self::now_millis() {
            let _ = self.store.remove(key);

            return None;
        }

        Some(value.to_vec())
    }

    async fn set(&self, key: &str, value: &[u8], expiry: Expiry) -> Result<(), StorageError> {
        let invalid_at = expires_at(expiry, Utc::now())
            .map(|at| at.timestamp_millis().max(0) as u64)
            .unwrap_or(0);

        self.store
            .insert(key, Self::encode_value(value, invalid_at))
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        // Best-effort sync to disk for durability.
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    async fn delete(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            error!("impossible to delete the key {key} in Fjall: {e}");
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

        let mut matched = Vec::new();

        for kv in self.store.iter() {
            let Ok((key, _)) = kv else {
                continue;
            };

            let key = String::from_utf8_lossy(&key).into_owned();
            if re.is_match(&key) {
                matched.push(key);
            }
        }

        for key in matched {
            if let Err(e) = self.store.remove(&key) {
                error!("impossible to delete the key {key} in Fjall: {e}");
            }
        }
    }

    async fn map_keys(&self, prefix: &str) -> HashMap<String, String> {
        let mut keys = HashMap::new();
        let now = Self::now_millis();

        for kv in self.store.prefix(prefix) {
            let Ok((key, raw)) = kv else {
                continue;
            };

            let Some((invalid_at, value)) = Self::decode_value(&raw) else {
                continue;
            };

            if invalid_at != 0 && invalid_at <= now {
                continue;
            }

            let key = String::from_utf8_lossy(&key);
            if let Some(stripped) = key.strip_prefix(prefix) {
                keys.insert(
                    stripped.to_string(),
                    String::from_utf8_lossy(value).into_owned(),
                );
            }
        }

        keys
    }

    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn reset(&self) -> Result<(), StorageError> {
        let mut keys = Vec::new();

        for kv in self.store.iter() {
            let Ok((key, _)) = kv else {
                continue;
            };

            keys.push(key);
        }

        for key in keys {
            self.store
                .remove(key)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for FjallStorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FjallStorer")
            .field("path", &self.path)
            .field("stale", &self.stale)
            .finish()
    }
}
