pub mod memory;

#[cfg(feature = "fjall")]
pub mod fjall;
#[cfg(feature = "mongodb")]
pub mod mongodb;
#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "fjall")]
pub use fjall::FjallStorer;
pub use memory::MemoryStorer;
#[cfg(feature = "mongodb")]
pub use mongodb::{MongoConfig, MongoStorer};
#[cfg(feature = "redis")]
pub use redis::{RedisConfig, RedisStorer};
