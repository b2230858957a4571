//! Bucket store backends held in process memory.
//!
//! Configuration is shared with the Postgres backend:
//!
//! ```toml
//! [buckets]
//! default_lifetime_seconds = 604800
//! backend = "memory"
//! memory_capacity = 1024
//! ```

mod config;
mod lock;
mod memory;

pub use config::{BucketStoreConfig, DEFAULT_LIFETIME_SECS, DEFAULT_MEMORY_CAPACITY};
pub use memory::MemoryBucketStore;
