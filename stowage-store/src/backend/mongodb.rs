//! MongoDB-backed storer.
//!
//! One collection of `{ key, value, invalid_at }` documents, upserted on
//! write. Expired documents are filtered (and reclaimed) lazily on read;
//! the driver's own connection pool handles reconnection.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bson::spec::BinarySubtype;
use bson::{doc, Binary};
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use stowage_core::{expires_at, Expiry, StorageError, Storer};

/// Connection parameters, already resolved by the embedding layer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    /// `mongodb://` connection string.
    pub uri: String,
    pub database: String,
    pub collection: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://127.0.0.1:27017".to_string(),
            database: "stowage".to_string(),
            collection: "cache".to_string(),
        }
    }
}

/// One stored key/value pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDocument {
    key: String,
    value: Binary,
    invalid_at: Option<bson::DateTime>,
}

impl StoredDocument {
    fn is_expired(&self) -> bool {
        self.invalid_at
            .is_some_and(|invalid_at| invalid_at.to_chrono() <= Utc::now())
    }
}

pub struct MongoStorer {
    collection: Collection<StoredDocument>,
    config: MongoConfig,
    stale: Duration,
}

impl MongoStorer {
    pub async fn connect(config: MongoConfig, stale: Duration) -> Result<Self, StorageError> {
        let client = Client::with_uri_str(&config.uri)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let collection = client
            .database(&config.database)
            .collection(&config.collection);

        Ok(Self {
            collection,
            config,
            stale,
        })
    }
}

#[async_trait]
impl Storer for MongoStorer {
    fn name(&self) -> &'static str {
        "MONGODB"
    }

    fn uuid(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.config.uri,
            self.config.database,
            self.config.collection,
            self.stale.as_secs()
        )
    }

    fn stale_window(&self) -> Duration {
        self.stale
    }

    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let stored = self
            .collection
            .find_one(doc! { "key": key })
            .await
            .ok()
            .flatten()?;

        if stored.is_expired() {
            let _ = self.collection.delete_one(doc! { "key": key }).await;

            return None;
        }

        Some(stored.value.bytes)
    }

    async fn set(&self, key: &str, value: &[u8], expiry: Expiry) -> Result<(), StorageError> {
        let document = StoredDocument {
            key: key.to_string(),
            value: Binary {
                subtype: BinarySubtype::Generic,
                bytes: value.to_vec(),
            },
            invalid_at: expires_at(expiry, Utc::now()).map(bson::DateTime::from_chrono),
        };

        let update = bson::to_document(&document).map_err(|e| {
            error!("impossible to serialize the key {key} for MongoDB: {e}");

            StorageError::Backend(e.to_string())
        })?;

        self.collection
            .update_one(doc! { "key": key }, doc! { "$set": update })
            .upsert(true)
            .await
            .map_err(|e| {
                error!("impossible to set the key {key} into MongoDB: {e}");

                StorageError::Backend(e.to_string())
            })?;

        Ok(())
    }

    async fn delete(&self, key: &str) {
        if let Err(e) = self.collection.delete_one(doc! { "key": key }).await {
            error!("impossible to delete the key {key} in MongoDB: {e}");
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

        let mut cursor = match self.collection.find(doc! {}).await {
            Ok(cursor) => cursor,
            Err(e) => {
                error!("cannot scan the MongoDB keys: {e}");

                return;
            }
        };

        let mut matched = Vec::new();
        while let Ok(Some(stored)) = cursor.try_next().await {
            if re.is_match(&stored.key) {
                matched.push(stored.key);
            }
        }

        if matched.is_empty() {
            return;
        }

        if let Err(e) = self
            .collection
            .delete_many(doc! { "key": { "$in": matched } })
            .await
        {
            error!("impossible to delete the matched keys in MongoDB: {e}");
        }
    }

    async fn map_keys(&self, prefix: &str) -> HashMap<String, String> {
        let mut keys = HashMap::new();

        let filter = doc! { "key": { "$regex": format!("^{}", regex::escape(prefix)) } };
        let mut cursor = match self.collection.find(filter).await {
            Ok(cursor) => cursor,
            Err(e) => {
                error!("cannot scan the MongoDB keys: {e}");

                return keys;
            }
        };

        while let Ok(Some(stored)) = cursor.try_next().await {
            if stored.is_expired() {
                continue;
            }

            if let Some(stripped) = stored.key.strip_prefix(prefix) {
                keys.insert(
                    stripped.to_string(),
                    String::from_utf8_lossy(&stored.value.bytes).into_owned(),
                );
            }
        }

        keys
    }

    async fn init(&self) -> Result<(), StorageError> {
        let key_index = IndexModel::builder()
            .keys(doc! { "key": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        let expiry_index = IndexModel::builder().keys(doc! { "invalid_at": 1 }).build();

        self.collection
            .create_indexes(vec![key_index, expiry_index])
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        info!("storage indexes created");

        Ok(())
    }

    async fn reset(&self) -> Result<(), StorageError> {
        self.collection
            .delete_many(doc! {})
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }
}

impl std::fmt::Debug for MongoStorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoStorer")
            .field("database", &self.config.database)
            .field("collection", &self.config.collection)
            .field("stale", &self.stale)
            .finish()
    }
}
