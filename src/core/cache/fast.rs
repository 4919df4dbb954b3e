//! Fast tier: low-latency content key → audio path mapping with expiry.
//!
//! The tier is optional. Callers always hold an `Arc<dyn FastCache>`;
//! [`NoopFastCache`] stands in when the tier is disabled.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::{Cache as MokaCache, CacheBuilder as MokaCacheBuilder};
use thiserror::Error;

/// Errors that can occur during fast cache operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Failure reported by a fallible backend. The in-process tiers never
    /// fail; callers treat this as a miss and log it.
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Result type for fast cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Capability interface of the fast tier.
#[async_trait]
pub trait FastCache: Send + Sync {
    /// Retrieves the audio path stored under `key`, if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<PathBuf>>;

    /// Stores an audio path with a TTL.
    async fn set(&self, key: &str, audio_path: PathBuf, ttl: Duration) -> Result<()>;

    /// Deletes a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Returns the backend type as a string identifier.
    fn backend_type(&self) -> &str;
}

/// Shared handle to a fast tier.
pub type SharedFastCache = Arc<dyn FastCache>;

/// Internal structure for memory cache entries with expiration.
struct FastCacheRecord {
    audio_path: PathBuf,
    expires_at: Instant,
}

/// In-process fast tier backed by Moka.
pub struct MokaFastCache {
    cache: MokaCache<String, Arc<FastCacheRecord>>,
}

impl MokaFastCache {
    /// Creates a new memory fast tier.
    ///
    /// # Arguments
    ///
    /// * `max_entries` - Maximum number of entries to store
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: MokaCacheBuilder::new(max_entries).build(),
        }
    }
}

#[async_trait]
impl FastCache for MokaFastCache {
    async fn get(&self, key: &str) -> Result<Option<PathBuf>> {
        let Some(record) = self.cache.get(key).await else {
            return Ok(None);
        };
        if Instant::now() >= record.expires_at {
            self.cache.invalidate(key).await;
            return Ok(None);
        }
        Ok(Some(record.audio_path.clone()))
    }

    async fn set(&self, key: &str, audio_path: PathBuf, ttl: Duration) -> Result<()> {
        let record = Arc::new(FastCacheRecord {
            audio_path,
            expires_at: Instant::now() + ttl,
        });
        self.cache.insert(key.to_string(), record).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    fn backend_type(&self) -> &str {
        "memory"
    }
}

/// Disabled fast tier: never stores, never hits.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFastCache;

#[async_trait]
impl FastCache for NoopFastCache {
    async fn get(&self, _key: &str) -> Result<Option<PathBuf>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _audio_path: PathBuf, _ttl: Duration) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn backend_type(&self) -> &str {
        "disabled"
    }
}
