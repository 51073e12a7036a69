//! Storage protocol for HTTP response caches.
//!
//! This crate holds the backend-agnostic part of the cache storage layer:
//! the per-base-key mapping document and its codec, the updater that
//! records new response variants, the election algorithm that picks a
//! fresh or stale candidate for an incoming request, and the [`Storer`]
//! contract every backend adapter satisfies so the protocol behaves
//! identically regardless of which engine stores the bytes.
//!
//! Backends live in the companion `stowage-store` crate.

pub mod compress;
pub mod election;
pub mod mapping;
pub mod registry;
pub mod response;
pub mod storer;
pub mod supervisor;

pub use compress::{compress, decompress};
pub use election::{elect, validate_etag, Elected, Revalidator};
pub use mapping::{
    decode_mapping, encode_mapping, update_mapping, MappingDocument, MappingEntry,
    MAPPING_KEY_PREFIX,
};
pub use registry::StorerRegistry;
pub use response::{parse_response, CachedResponse};
pub use storer::{expires_at, AbstractStorer, Expiry, Storer};
pub use supervisor::{ConnState, Supervisor};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Mapping decode error: {0}")]
    Decode(String),
    #[error("Mapping encode error: {0}")]
    Encode(String),
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Malformed stored response: {0}")]
    MalformedResponse(String),
    #[error("Backend is reconnecting")]
    Reconnecting,
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Storage error: {0}")]
    Backend(String),
}
