//! Mapping document model, codec and updater.
//!
//! Every base key owns one mapping document, stored under
//! `IDX_<base key>`. The document lists the varied keys written for that
//! base key together with the metadata needed to replay `Vary` matching
//! and to decide freshness without asking the backend whether a key
//! expired.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::StorageError;

/// Keys carrying this prefix hold mapping documents, never response
/// bodies. Mapping bytes are only ever produced and consumed by this
/// module, no body transform (LZ4) applies to them.
pub const MAPPING_KEY_PREFIX: &str = "IDX_";

/// Metadata for one stored response variant.
///
/// Invariant: `stored_at <= fresh_until <= stale_until`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    pub stored_at: DateTime<Utc>,
    pub fresh_until: DateTime<Utc>,
    pub stale_until: DateTime<Utc>,
    /// Header name -> joined request value(s) captured at store time,
    /// multi-value headers joined with `", "`.
    #[serde(default)]
    pub varied_headers: BTreeMap<String, String>,
    #[serde(default)]
    pub etag: String,
    /// The externally visible logical cache key, independent of the
    /// storage key shapes.
    #[serde(default)]
    pub real_key: String,
}

/// Per-base-key document mapping each varied key to its entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingDocument {
    #[serde(default)]
    pub mapping: HashMap<String, MappingEntry>,
}

/// Decodes mapping bytes. An empty input decodes to an empty document,
/// a malformed non-empty input is a [`StorageError::Decode`].
pub fn decode_mapping(item: &[u8]) -> Result<MappingDocument, StorageError> {
    if item.is_empty() {
        return Ok(MappingDocument::default());
    }

    serde_json::from_slice(item).map_err(|e| StorageError::Decode(e.to_string()))
}

/// Encodes a mapping document to its stored representation.
pub fn encode_mapping(mapping: &MappingDocument) -> Result<Vec<u8>, StorageError> {
    serde_json::to_vec(mapping).map_err(|e| StorageError::Encode(e.to_string()))
}

/// Joins header values the way they are replayed at election time.
pub(crate) fn join_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut joined = BTreeMap::new();

    for name in headers.keys() {
        let value = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");

        joined.insert(name.as_str().to_string(), value);
    }

    joined
}

/// Upserts the entry for `varied_key` into the existing mapping bytes and
/// returns the re-encoded document.
///
/// A corrupt existing document is a hard error on the write path, never a
/// silent reset of the accumulated variants. Entries are never removed
/// here, pruning is the backend's own expiry mechanism.
#[allow(clippy::too_many_arguments)]
pub fn update_mapping(
    existing: &[u8],
    varied_key: &str,
    now: DateTime<Utc>,
    fresh_until: DateTime<Utc>,
    stale_until: DateTime<Utc>,
    varied_headers: &HeaderMap,
    etag: &str,
    real_key: &str,
) -> Result<Vec<u8>, StorageError> {
    let mut document = decode_mapping(existing).map_err(|e| {
        error!("impossible to decode the mapping for the key {varied_key}: {e}");

        e
    })?;

    document.mapping.insert(
        varied_key.to_string(),
        MappingEntry {
            stored_at: now,
            fresh_until,
            stale_until,
            varied_headers: join_headers(varied_headers),
            etag: etag.to_string(),
            real_key: real_key.to_string(),
        },
    );

    encode_mapping(&document)
}
