//! Storage backend adapters for the stowage cache protocol.
//!
//! Every adapter implements the [`stowage_core::Storer`] contract with
//! identical externally observable semantics; only where the bytes live
//! differs. Currently supported backends:
//! - in-memory (always available)
//! - fjall, embedded persistent (with the "fjall" feature)
//! - redis (with the "redis" feature)
//! - mongodb (with the "mongodb" feature)

pub mod backend;

#[cfg(feature = "fjall")]
pub use backend::FjallStorer;
pub use backend::MemoryStorer;
#[cfg(feature = "mongodb")]
pub use backend::{MongoConfig, MongoStorer};
#[cfg(feature = "redis")]
pub use backend::{RedisConfig, RedisStorer};
