//! Cache for structured analyses keyed by the fingerprint of the text they
//! were computed from. Redis in deployments, an expiring map for single-node
//! runs and tests, or nothing at all.

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, error, instrument, warn};

use crate::analysis::StructuredAnalysis;

/// Key/value cache for computed analyses, keyed by text fingerprint.
#[async_trait]
pub trait AnalysisCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<StructuredAnalysis>;

    async fn set(&self, key: &str, value: &StructuredAnalysis) -> Result<()>;

    /// Drop a key. Returns whether something was removed.
    async fn invalidate(&self, key: &str) -> Result<bool>;

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str;
}

/// Analyses stored as JSON strings with a fixed expiry. Redis errors
/// degrade to misses on read.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl RedisCache {
    pub async fn new(redis_url: &str, ttl_secs: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("REDIS_URL is not a valid redis url")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("could not connect to redis")?;

        tracing::info!(ttl_secs, "Redis analysis cache connected");
        Ok(Self { conn, ttl_secs })
    }
}

#[async_trait]
impl AnalysisCache for RedisCache {
    #[instrument(skip(self), fields(cache_hit = false))]
    async fn get(&self, key: &str) -> Option<StructuredAnalysis> {
        let mut conn = self.conn.clone();
        let raw = match conn.get::<_, Option<String>>(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                error!(key, error = %e, "Redis read failed");
                return None;
            }
        };

        match serde_json::from_str::<StructuredAnalysis>(&raw) {
            Ok(analysis) => {
                tracing::Span::current().record("cache_hit", true);
                debug!(key, "Cache hit");
                Some(analysis)
            }
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable cached analysis");
                None
            }
        }
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: &StructuredAnalysis) -> Result<()> {
        let payload = serde_json::to_string(value).context("analysis is not serializable")?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, payload, self.ttl_secs)
            .await
            .context("redis SETEX failed")?;
        debug!(key, ttl_secs = self.ttl_secs, "Analysis cached");
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: u32 = conn
            .del(key)
            .await
            .context("redis DEL failed")?;
        Ok(removed > 0)
    }

    async fn health_check(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("redis PING failed")?;
        anyhow::ensure!(reply == "PONG", "unexpected PING reply {reply:?}");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// In-process cache with per-entry expiry.
pub struct MemoryAnalysisCache {
    entries: Mutex<HashMap<String, (Instant, StructuredAnalysis)>>,
    ttl: Duration,
}

impl MemoryAnalysisCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AnalysisCache for MemoryAnalysisCache {
    async fn get(&self, key: &str) -> Option<StructuredAnalysis> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            Some((expires_at, value)) if *expires_at > Instant::now() => {
                debug!(key = key, "Cache hit");
                return Some(value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            entries.remove(key);
            debug!(key = key, "Cache entry expired");
        } else {
            debug!(key = key, "Cache miss");
        }
        None
    }

    async fn set(&self, key: &str, value: &StructuredAnalysis) -> Result<()> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        entries.retain(|_, (expires_at, _)| *expires_at > now);
        entries.insert(key.to_string(), (now + self.ttl, value.clone()));
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnalysisCache;

#[async_trait]
impl AnalysisCache for NoopAnalysisCache {
    async fn get(&self, _key: &str) -> Option<StructuredAnalysis> {
        None
    }

    async fn set(&self, _key: &str, _value: &StructuredAnalysis) -> Result<()> {
        Ok(())
    }

    async fn invalidate(&self, _key: &str) -> Result<bool> {
        Ok(false)
    }

    fn backend_name(&self) -> &'static str {
        "none"
    }
}
