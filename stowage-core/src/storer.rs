//! Backend capability contract.
//!
//! Every backend adapter implements the storage primitives; the
//! multi-level operations and the mapping-document key listing are
//! provided once here so their externally observable behavior is
//! identical regardless of which engine stores the bytes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use tracing::{debug, error};

use crate::compress::compress;
use crate::election::{elect, Elected, Revalidator};
use crate::mapping::{decode_mapping, update_mapping, MAPPING_KEY_PREFIX};
use crate::StorageError;

/// Physical expiry applied to a stored value.
///
/// Expiry only reclaims space. Whether a still-present entry counts as
/// fresh or stale is decided by the mapping document's own timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    /// No additional expiry beyond the backend's defaults.
    #[default]
    Backend,
    /// Reclaim the value after the given duration. A zero duration is
    /// treated as [`Expiry::Backend`].
    After(Duration),
    /// Exempt from expiry where the backend supports it.
    Never,
}

/// Wall-clock instant at which a value stored at `now` with `expiry`
/// should be reclaimed, if any.
pub fn expires_at(expiry: Expiry, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match expiry {
        Expiry::Backend | Expiry::Never => None,
        Expiry::After(ttl) if ttl.is_zero() => None,
        Expiry::After(ttl) => Some(now + to_chrono(ttl)),
    }
}

// Caps absurd durations instead of overflowing datetime arithmetic.
fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::days(36_500))
}

#[async_trait]
pub trait Storer: Send + Sync {
    /// Static backend identifier.
    fn name(&self) -> &'static str;

    /// Deterministic fingerprint of the effective connection identity
    /// (address, credentials, staleness window). Callers reuse one open
    /// adapter per fingerprint instead of opening duplicate connections.
    fn uuid(&self) -> String;

    /// Grace period added to every physical TTL so stale candidates
    /// outlive logical freshness.
    fn stale_window(&self) -> Duration;

    /// Raw stored bytes, or `None` when the key is absent. Never an
    /// error: read failures degrade to a miss.
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores raw bytes under `key` with the given physical expiry.
    async fn set(&self, key: &str, value: &[u8], expiry: Expiry) -> Result<(), StorageError>;

    /// Best-effort single-key deletion.
    async fn delete(&self, key: &str);

    /// Best-effort deletion of every stored key matching the regular
    /// expression `pattern`. An invalid pattern logs and no-ops.
    async fn delete_many(&self, pattern: &str);

    /// All stored key/value pairs whose key starts with `prefix`, with
    /// the prefix stripped from the returned keys.
    async fn map_keys(&self, prefix: &str) -> HashMap<String, String>;

    /// Idempotent backend warm-up.
    async fn init(&self) -> Result<(), StorageError>;

    /// Clears all data owned by this instance.
    async fn reset(&self) -> Result<(), StorageError>;

    /// Real keys recorded by the mapping documents, across all base keys.
    /// Entries past their staleness window are skipped, duplicates are
    /// not deduplicated, and undecodable documents are ignored.
    async fn list_keys(&self) -> Vec<String> {
        let now = Utc::now();
        let mut keys = Vec::new();

        for value in self.map_keys(MAPPING_KEY_PREFIX).await.into_values() {
            let Ok(document) = decode_mapping(value.as_bytes()) else {
                continue;
            };

            for entry in document.mapping.values() {
                if entry.fresh_until < now && entry.stale_until < now {
                    continue;
                }

                keys.push(entry.real_key.clone());
            }
        }

        keys
    }

    /// Loads the mapping document for `base_key` and elects fresh/stale
    /// candidates for the request. Election failures degrade to a miss.
    async fn get_multi_level(
        &self,
        base_key: &str,
        headers: &HeaderMap,
        validator: &mut Revalidator,
    ) -> Elected {
        let Some(mapping_bytes) = self.get(&format!("{MAPPING_KEY_PREFIX}{base_key}")).await
        else {
            return Elected::default();
        };

        match elect(self, &mapping_bytes, headers, validator, Utc::now()).await {
            Ok(elected) => elected,
            Err(e) => {
                error!("an error occurred during the election for the key {base_key}: {e}");

                Elected::default()
            }
        }
    }

    /// Compresses and stores one variant body under `varied_key`, then
    /// upserts its entry in `base_key`'s mapping document.
    ///
    /// The body is stored with a physical expiry of `ttl` plus the
    /// staleness window so stale serving survives logical expiry; the
    /// mapping document itself is stored durably. The body write always
    /// precedes the mapping write so a reader never follows a mapping
    /// entry to a body that does not exist yet. Two concurrent calls for
    /// the same base key may lose one of the mapping updates; callers
    /// needing stronger guarantees serialize writes per base key.
    #[allow(clippy::too_many_arguments)]
    async fn set_multi_level(
        &self,
        base_key: &str,
        varied_key: &str,
        value: &[u8],
        varied_headers: &HeaderMap,
        etag: &str,
        ttl: Duration,
        real_key: &str,
    ) -> Result<(), StorageError> {
        let now = Utc::now();

        let compressed = compress(value).map_err(|e| {
            error!("impossible to compress the key {varied_key}: {e}");

            e
        })?;

        self.set(
            varied_key,
            &compressed,
            Expiry::After(ttl + self.stale_window()),
        )
        .await?;

        let mapping_key = format!("{MAPPING_KEY_PREFIX}{base_key}");
        let existing = self.get(&mapping_key).await.unwrap_or_default();

        let fresh_until = now + to_chrono(ttl);
        let stale_until = now + to_chrono(ttl + self.stale_window());

        let updated = update_mapping(
            &existing,
            varied_key,
            now,
            fresh_until,
            stale_until,
            varied_headers,
            etag,
            real_key,
        )?;

        debug!("store the new mapping for the key {varied_key}");

        self.set(&mapping_key, &updated, Expiry::Never).await
    }
}

pub type AbstractStorer = Arc<dyn Storer + Send + Sync>;
