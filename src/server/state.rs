//! Server state management

use std::sync::atomic::{AtomicU32, AtomicU64};
use std::sync::Arc;
use std::time::Duration;

use crate::artifact::ArtifactHandle;
use crate::cache::CachePool;

/// Shared server state
///
/// One instance per running REST server; the artifact handle and the
/// optional cache pool are shared read-only across all request handlers.
#[derive(Clone)]
pub struct ServerState {
    /// The loaded artifact
    pub artifact: Arc<ArtifactHandle>,

    /// Cache client pool; present only for cache-enabled recommendation
    /// services
    pub cache: Option<Arc<CachePool>>,

    /// Expiry applied to cached recommendation entries
    pub cache_ttl: Duration,

    /// Request counters
    pub metrics: Arc<Metrics>,
}

impl ServerState {
    pub fn new(
        artifact: Arc<ArtifactHandle>,
        cache: Option<Arc<CachePool>>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            artifact,
            cache,
            cache_ttl,
            metrics: Arc::new(Metrics::default()),
        }
    }
}

/// Request counters
#[derive(Default)]
pub struct Metrics {
    /// Total requests processed
    pub total_requests: AtomicU64,

    /// Requests currently in flight
    pub active_requests: AtomicU32,
}
