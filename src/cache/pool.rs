//! Fixed-size cache client pool with scoped acquisition.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};

use super::{CacheStore, MemcachedStore, MemoryStore};
use crate::config::CacheSettings;
use crate::error::{Error, Result};

/// A fixed-size pool of cache clients.
///
/// The pool never grows: all clients are created at construction. A client
/// is checked out for the duration of one operation via [`with_client`]
/// (blocking up to the configured wait bound) and returned on every exit
/// path, including errors and cancellation.
///
/// [`with_client`]: CachePool::with_client
pub struct CachePool {
    free: Mutex<VecDeque<Arc<dyn CacheStore>>>,
    permits: Semaphore,
    size: usize,
    wait: Duration,
}

impl CachePool {
    pub fn new(clients: Vec<Arc<dyn CacheStore>>, wait: Duration) -> Self {
        let size = clients.len();
        Self {
            free: Mutex::new(clients.into()),
            permits: Semaphore::new(size),
            size,
            wait,
        }
    }

    /// Build a pool from cache settings.
    ///
    /// The endpoint `memory://` selects the in-process store; anything else
    /// is treated as a comma-separated memcached server list. Clients dial
    /// lazily, so construction does not touch the network.
    pub fn connect(settings: &CacheSettings) -> Result<Self> {
        let servers = settings
            .servers
            .as_deref()
            .ok_or_else(|| Error::Config("cache servers not configured".into()))?;

        let clients: Vec<Arc<dyn CacheStore>> = if servers.trim() == "memory://" {
            let shared = MemoryStore::new();
            (0..settings.pool_size)
                .map(|_| Arc::new(shared.clone()) as Arc<dyn CacheStore>)
                .collect()
        } else {
            let list: Vec<String> = servers
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if list.is_empty() {
                return Err(Error::Config("empty cache server list".into()));
            }
            (0..settings.pool_size)
                .map(|_| Arc::new(MemcachedStore::new(list.clone())) as Arc<dyn CacheStore>)
                .collect()
        };

        Ok(Self::new(clients, settings.checkout_wait()))
    }

    /// Configured pool size.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Clients currently checked in.
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Check out one client, run `op`, and return the client to the pool.
    ///
    /// Blocks up to the configured wait bound when all clients are in use,
    /// then fails with [`Error::PoolExhausted`]. Client failures inside `op`
    /// propagate to the caller; the client is returned regardless.
    pub async fn with_client<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn CacheStore>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let permit = tokio::time::timeout(self.wait, self.permits.acquire())
            .await
            .map_err(|_| Error::PoolExhausted)?
            .map_err(|_| Error::PoolExhausted)?;

        let client = self
            .free
            .lock()
            .pop_front()
            .expect("pool invariant: permit held but no free client");
        let guard = ClientGuard {
            pool: self,
            client: Some(client),
            _permit: permit,
        };

        op(guard.client()).await
    }
}

/// Returns the client to the free list on drop, before the permit is
/// released.
struct ClientGuard<'a> {
    pool: &'a CachePool,
    client: Option<Arc<dyn CacheStore>>,
    _permit: SemaphorePermit<'a>,
}

impl ClientGuard<'_> {
    fn client(&self) -> Arc<dyn CacheStore> {
        self.client
            .as_ref()
            .expect("client present until drop")
            .clone()
    }
}

impl Drop for ClientGuard<'_> {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.free.lock().push_back(client);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_pool(size: usize, wait: Duration) -> CachePool {
        let shared = MemoryStore::new();
        let clients = (0..size)
            .map(|_| Arc::new(shared.clone()) as Arc<dyn CacheStore>)
            .collect();
        CachePool::new(clients, wait)
    }

    #[tokio::test]
    async fn test_client_returned_on_success_and_error() {
        let pool = memory_pool(1, Duration::from_millis(100));

        pool.with_client(|c| async move { c.set("k", b"v", Duration::ZERO).await })
            .await
            .unwrap();
        assert_eq!(pool.available(), 1);

        let result: Result<()> = pool
            .with_client(|_| async { Err(Error::CacheUnavailable("boom".into())) })
            .await;
        assert!(result.is_err());
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_pool_times_out() {
        let pool = Arc::new(memory_pool(1, Duration::from_millis(50)));

        let holder = Arc::clone(&pool);
        let held = tokio::spawn(async move {
            holder
                .with_client(|_| async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(())
                })
                .await
        });

        // Give the holder time to check out the only client.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let result: Result<()> = pool.with_client(|_| async { Ok(()) }).await;
        assert!(matches!(result, Err(Error::PoolExhausted)));

        held.await.unwrap().unwrap();
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_oversubscription_waits_instead_of_failing() {
        let pool = Arc::new(memory_pool(2, Duration::from_secs(5)));

        let mut tasks = Vec::new();
        for i in 0..8 {
            let pool = Arc::clone(&pool);
            tasks.push(tokio::spawn(async move {
                pool.with_client(|c| async move {
                    let key = format!("k{}", i);
                    c.set(&key, b"v", Duration::ZERO).await?;
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    c.get(&key).await
                })
                .await
            }));
        }

        for task in tasks {
            assert!(task.await.unwrap().unwrap().is_some());
        }
        assert_eq!(pool.available(), 2);
    }
}
