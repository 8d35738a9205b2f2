//! Recommendation route with optional cache short-circuit.

use axum::extract::{Json, State};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::RequestGuard;
use crate::cache::CachePool;
use crate::error::{Error, Result};
use crate::server::state::ServerState;

const DEFAULT_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub model: String,
    pub items: Vec<String>,
}

/// Handle `POST /recommend`.
///
/// The cache is consulted first when a pool is configured; any cache failure
/// degrades to direct computation, and cache writes are best-effort.
pub async fn recommend(
    State(state): State<ServerState>,
    Json(request): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>> {
    let _guard = RequestGuard::new(&state.metrics);

    let user = request
        .user
        .filter(|u| !u.is_empty())
        .ok_or_else(|| Error::Validation("missing required field 'user'".into()))?;
    let limit = request.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 {
        return Err(Error::Validation("'limit' must be positive".into()));
    }

    let model = state.artifact.name().to_string();
    let key = cache_key(&model, &user, limit);

    if let Some(pool) = &state.cache {
        match lookup(pool, &key).await {
            Ok(Some(items)) => {
                debug!(key = %key, "cache hit");
                return Ok(Json(RecommendResponse { model, items }));
            }
            Ok(None) => debug!(key = %key, "cache miss"),
            Err(e) => warn!(key = %key, "cache lookup failed, computing directly: {}", e),
        }
    }

    let items = state.artifact.recommend(&user, limit)?;

    if let Some(pool) = &state.cache {
        if let Err(e) = store(pool, &key, &items, state.cache_ttl).await {
            warn!(key = %key, "cache store failed: {}", e);
        }
    }

    Ok(Json(RecommendResponse { model, items }))
}

/// Derive the cache key from the request's identifying fields.
///
/// Deterministic: the same logical request always maps to the same key.
/// Whitespace is stripped because memcached keys cannot carry it.
pub fn cache_key(model: &str, user: &str, limit: usize) -> String {
    let mut key = format!("rec:{}:{}:{}", model, user, limit);
    key.retain(|c| !c.is_whitespace());
    key
}

async fn lookup(pool: &CachePool, key: &str) -> Result<Option<Vec<String>>> {
    let key = key.to_string();
    let raw = pool
        .with_client(move |client| async move { client.get(&key).await })
        .await?;
    match raw {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

async fn store(pool: &CachePool, key: &str, items: &[String], ttl: Duration) -> Result<()> {
    let key = key.to_string();
    let bytes = serde_json::to_vec(items)?;
    pool.with_client(move |client| async move { client.set(&key, &bytes, ttl).await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_stable() {
        assert_eq!(cache_key("reco", "42", 10), cache_key("reco", "42", 10));
        assert_eq!(cache_key("reco", "42", 10), "rec:reco:42:10");
    }

    #[test]
    fn test_cache_key_distinguishes_requests() {
        assert_ne!(cache_key("reco", "42", 10), cache_key("reco", "42", 5));
        assert_ne!(cache_key("reco", "42", 10), cache_key("reco", "7", 10));
        assert_ne!(cache_key("a", "42", 10), cache_key("b", "42", 10));
    }

    #[test]
    fn test_cache_key_has_no_whitespace() {
        assert_eq!(cache_key("m", "a user", 1), "rec:m:auser:1");
    }
}
