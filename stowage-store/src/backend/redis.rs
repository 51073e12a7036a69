//! Redis-backed storer.
//!
//! Operations fail fast while the connection is being re-established;
//! the first operation observing a transient failure starts the
//! supervisor's reconnect loop, which swaps a freshly connected client
//! in behind the lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use rustis::client::{Client, IntoConfig};
use rustis::resp::BulkString;
use rustis::commands::{
    FlushingMode, GenericCommands, ScanOptions, ServerCommands, StringCommands,
};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

use stowage_core::{Expiry, StorageError, Storer, Supervisor};

/// Connection parameters, already resolved by the embedding layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// `redis://` connection URL.
    pub url: String,
    /// Client name announced to the server.
    pub client_name: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            client_name: "stowage-redis".to_string(),
        }
    }
}

pub struct RedisStorer {
    client: Arc<RwLock<Client>>,
    supervisor: Supervisor,
    config: RedisConfig,
    stale: Duration,
}

impl RedisStorer {
    pub async fn connect(config: RedisConfig, stale: Duration) -> Result<Self, StorageError> {
        let client = Self::open_client(&config).await?;

        Ok(Self {
            client: Arc::new(RwLock::new(client)),
            supervisor: Supervisor::new(),
            config,
            stale,
        })
    }

    async fn open_client(config: &RedisConfig) -> Result<Client, StorageError> {
        let mut client_config = config
            .url
            .clone()
            .into_config()
            .map_err(|e| StorageError::InvalidConfiguration(e.to_string()))?;
        client_config.connection_name = config.client_name.clone();

        Client::connect(client_config)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
    }

    fn check_gate(&self) -> Result<(), StorageError> {
        if self.supervisor.is_reconnecting() {
            return Err(StorageError::Reconnecting);
        }

        Ok(())
    }

    /// Flags the adapter as reconnecting and swaps a new client in once
    /// the server answers again.
    fn reconnect(&self) {
        let config = self.config.clone();
        let client = Arc::clone(&self.client);

        self.supervisor.trigger(move || {
            let config = config.clone();
            let client = Arc::clone(&client);

            async move {
                let new_client = Self::open_client(&config).await?;
                *client.write().await = new_client;

                debug!("swapped in a new Redis connection");

                Ok::<(), StorageError>(())
            }
        });
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StorageError> {
        let client = self.client.read().await;
        let mut keys = Vec::new();
        let mut cursor = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = client
                .scan(cursor, ScanOptions::default().match_pattern(pattern))
                .await
                .map_err(|e| StorageError::Backend(e.to_string()))?;

            keys.extend(batch);
            cursor = next;

            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl Storer for RedisStorer {
    fn name(&self) -> &'static str {
        "REDIS"
    }

    fn uuid(&self) -> String {
        format!(
            "{}-{}-{}",
            self.config.url,
            self.config.client_name,
            self.stale.as_secs()
        )
    }

    fn stale_window(&self) -> Duration {
        self.stale
    }

    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        if self.supervisor.is_reconnecting() {
            return None;
        }

        let client = self.client.read().await;

        match client.get::<_, Option<BulkString>>(key).await {
            Ok(value) => value.map(Vec::from),
            Err(e) => {
                error!("impossible to get the key {key} in Redis: {e}");
                drop(client);
                self.reconnect();

                None
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], expiry: Expiry) -> Result<(), StorageError> {
        self.check_gate()?;

        let client = self.client.read().await;
        let result = match expiry {
            Expiry::After(ttl) if !ttl.is_zero() => {
                client.setex(key, ttl.as_secs().max(1), value.to_vec()).await
            }
            _ => client.set(key, value.to_vec()).await,
        };

        result.map_err(|e| {
            error!("impossible to set the key {key} into Redis: {e}");
            drop(client);
            self.reconnect();

            StorageError::Backend(e.to_string())
        })
    }

    async fn delete(&self, key: &str) {
        if self.supervisor.is_reconnecting() {
            return;
        }

        let client = self.client.read().await;
        if let Err(e) = client.del(key).await {
            error!("impossible to delete the key {key} in Redis: {e}");
            drop(client);
            self.reconnect();
        }
    }

    async fn delete_many(&self, pattern: &str) {
        if self.supervisor.is_reconnecting() {
            return;
        }

        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => {
                warn!("invalid pattern {pattern} passed to delete_many: {e}");

                return;
            }
        };

        let keys = match self.scan_keys("*").await {
            Ok(keys) => keys,
            Err(e) => {
                error!("cannot scan the Redis keys: {e}");
                self.reconnect();

                return;
            }
        };

        let matched: Vec<String> = keys.into_iter().filter(|key| re.is_match(key)).collect();
        if matched.is_empty() {
            return;
        }

        let client = self.client.read().await;
        if let Err(e) = client.del(matched).await {
            error!("impossible to delete the matched keys in Redis: {e}");
        }
    }

    async fn map_keys(&self, prefix: &str) -> HashMap<String, String> {
        let mut kv_store = HashMap::new();

        if self.supervisor.is_reconnecting() {
            return kv_store;
        }

        let keys = match self.scan_keys(&format!("{prefix}*")).await {
            Ok(keys) => keys,
            Err(e) => {
                error!("cannot scan the Redis keys: {e}");
                self.reconnect();

                return kv_store;
            }
        };

        for key in keys {
            if let Some(value) = self.get(&key).await {
                if let Some(stripped) = key.strip_prefix(prefix) {
                    kv_store.insert(
                        stripped.to_string(),
                        String::from_utf8_lossy(&value).into_owned(),
                    );
                }
            }
        }

        kv_store
    }

    async fn init(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn reset(&self) -> Result<(), StorageError> {
        self.check_gate()?;

        let client = self.client.read().await;

        client
            .flushdb(FlushingMode::Default)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))
    }
}

impl std::fmt::Debug for RedisStorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStorer")
            .field("url", &self.config.url)
            .field("stale", &self.stale)
            .finish()
    }
}
