//! Facade crate re-exporting the storage protocol and its backends.
//!
//! Most consumers only need [`Storer`], a backend constructor and the
//! [`StorerRegistry`]; depend on `stowage-core` directly when embedding
//! the protocol without any bundled backend.

pub use stowage_core::{
    compress, decompress, decode_mapping, elect, encode_mapping, expires_at, parse_response,
    update_mapping, validate_etag, AbstractStorer, CachedResponse, ConnState, Elected, Expiry,
    MappingDocument, MappingEntry, Revalidator, StorageError, Storer, StorerRegistry, Supervisor,
    MAPPING_KEY_PREFIX,
};

#[cfg(feature = "fjall")]
pub use stowage_store::FjallStorer;
pub use stowage_store::MemoryStorer;
#[cfg(feature = "mongodb")]
pub use stowage_store::{MongoConfig, MongoStorer};
#[cfg(feature = "redis")]
pub use stowage_store::{RedisConfig, RedisStorer};
