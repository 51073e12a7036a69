//! Fresh/stale election over a mapping document.
//!
//! Given the mapping bytes for a base key and the headers of an incoming
//! request, the election scans every recorded variant, replays `Vary`
//! matching and validator matching, and elects at most one fresh and one
//! stale candidate. Freshness is decided against the document's own
//! timestamps, never against the backend's expiry mechanism.

use chrono::{DateTime, Utc};
use http::HeaderMap;
use tracing::{debug, error};

use crate::compress::decompress;
use crate::mapping::decode_mapping;
use crate::response::{parse_response, CachedResponse};
use crate::storer::Storer;
use crate::StorageError;

/// Conditional-request context shared between the caller and the
/// election. The election records on it whether a stored validator
/// satisfied the request's validators.
#[derive(Debug, Clone, Default)]
pub struct Revalidator {
    /// Validators carried by the request (`If-None-Match`).
    pub request_etags: Vec<String>,
    /// The validator of the last stored entry checked.
    pub response_etag: String,
    /// Whether the last checked entry satisfies the request validators.
    pub matched: bool,
    /// Whether an exact validator hit allows a 304 short-circuit.
    pub not_modified: bool,
    /// Whether any checked entry carried a validator at all.
    pub need_revalidation: bool,
}

impl Revalidator {
    /// Builds a revalidator from the request's `If-None-Match` header.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let request_etags = headers
            .get_all(http::header::IF_NONE_MATCH)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();

        Self {
            request_etags,
            ..Self::default()
        }
    }
}

/// Records whether `etag` satisfies the validator's request validators.
///
/// An entry without a validator, or a request without validators, always
/// matches. An exact hit (or a `*` request validator) additionally flags
/// the response as not modified.
pub fn validate_etag(etag: &str, validator: &mut Revalidator) {
    validator.response_etag = etag.to_string();
    validator.need_revalidation = validator.need_revalidation || !etag.is_empty();
    validator.matched = etag.is_empty() || validator.request_etags.is_empty();
    validator.not_modified = false;

    for request_etag in &validator.request_etags {
        if request_etag == "*" || request_etag == etag {
            validator.matched = true;
            validator.not_modified = true;

            return;
        }
    }
}

/// Outcome of an election: at most one fresh and one stale candidate.
#[derive(Debug, Default)]
pub struct Elected {
    pub fresh: Option<CachedResponse>,
    pub stale: Option<CachedResponse>,
}

fn request_header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get_all(name)
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .collect::<Vec<_>>()
        .join(", ")
}

fn read_stored_response(varied_key: &str, raw: &[u8]) -> Result<CachedResponse, StorageError> {
    decompress(raw)
        .and_then(|value| parse_response(&value))
        .map_err(|e| {
            error!("an error occurred while reading the response for the key {varied_key}: {e}");

            e
        })
}

/// Scans the mapping and elects fresh/stale candidates for the request.
///
/// The iteration order over entries is unspecified: when several entries
/// independently qualify as fresh, any of them may win. A fresh hit
/// short-circuits the scan, a stale hit is kept while scanning continues.
/// Body lookups go through the caller's own storage (`storer.get`).
pub async fn elect<S>(
    storer: &S,
    mapping_bytes: &[u8],
    headers: &HeaderMap,
    validator: &mut Revalidator,
    now: DateTime<Utc>,
) -> Result<Elected, StorageError>
where
    S: Storer + ?Sized,
{
    let mut elected = Elected::default();

    if mapping_bytes.is_empty() {
        return Ok(elected);
    }

    let document = decode_mapping(mapping_bytes)?;

    for (varied_key, entry) in &document.mapping {
        let vary_matches = entry
            .varied_headers
            .iter()
            .all(|(name, stored)| request_header_value(headers, name) == *stored);

        if !vary_matches {
            continue;
        }

        validate_etag(&entry.etag, validator);

        if !validator.matched {
            debug!("the stored key {varied_key} did not match the request validators");

            continue;
        }

        if now < entry.fresh_until {
            if let Some(raw) = storer.get(varied_key).await {
                debug!("the stored key {varied_key} is a fresh candidate");
                elected.fresh = Some(read_stored_response(varied_key, &raw)?);

                return Ok(elected);
            }
        }

        if now < entry.stale_until {
            if let Some(raw) = storer.get(varied_key).await {
                debug!("the stored key {varied_key} is a stale candidate");
                elected.stale = Some(read_stored_response(varied_key, &raw)?);
            }
        }
    }

    Ok(elected)
}
