//! Two-tier detail cache
//!
//! Each detail kind (show, season, movie, person) gets a [`DetailCache`]:
//! a bounded LRU memory tier with a fixed TTL in front of a disk tier that
//! persists encoded records per kind. A [`FetchCoordinator`] puts the cache
//! in front of a network fetch and makes sure concurrent misses for the same
//! key share a single request.
//!
//! Disk problems never surface as failures. Unreadable or corrupt records
//! are misses, failed writes are logged, and a disk tier that cannot be
//! opened leaves the cache running memory-only.

pub mod clock;
pub mod codec;
pub mod coordinator;
pub mod disk;
pub mod error;
pub mod facade;
pub mod key;
pub mod memory;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use codec::{Codec, CodecError, JsonCodec};
pub use coordinator::{CoordinatorStats, DetailFetcher, FetchCoordinator};
pub use disk::DiskTier;
pub use error::{CacheError, FetchError, ResolveError};
pub use facade::{CacheStats, DetailCache};
pub use key::{CacheKey, EntityKind, KeyError};
pub use memory::MemoryTier;
