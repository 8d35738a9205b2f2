//! Distributed cache integration for the recommendation path.
//!
//! The cache is a pure performance optimization: every read path has a
//! direct-computation fallback, and cache failures surface as
//! [`Error::CacheUnavailable`](crate::error::Error::CacheUnavailable) rather
//! than crashing a request.
//!
//! Two client implementations are provided:
//! - `memcached`: text-protocol client over TCP with lazy reconnect
//! - `memory`: in-process store, selected with the `memory://` endpoint

mod memcached;
mod memory;
mod pool;

pub use memcached::MemcachedStore;
pub use memory::MemoryStore;
pub use pool::CachePool;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Key/value cache client with standard get/set/delete semantics.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`; a zero `ttl` means no expiry.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}
