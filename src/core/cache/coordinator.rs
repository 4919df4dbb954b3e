//! Two-tier cache in front of the synthesis backend.
//!
//! Lookup order is fast tier, then durable index, then backend. A hit is only
//! honoured when its audio file still exists. Cache writes after a synthesis
//! are best-effort: the response never depends on them.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::audio_store::AudioStore;
use super::fast::SharedFastCache;
use super::index::{CacheEntry, CacheIndex, IndexError, unix_now};
use crate::core::request::{ContentKey, SynthesisRequest};
use crate::core::tts::BoxedTTS;
use crate::errors::AppResult;

/// Where a resolved audio file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSource {
    Fast,
    Durable,
    Synthesized,
}

/// Outcome of [`CacheCoordinator::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub audio_path: PathBuf,
    pub size: u64,
    pub source: CacheSource,
}

impl Resolved {
    pub fn was_cached(&self) -> bool {
        self.source != CacheSource::Synthesized
    }
}

/// Coordinator tuning.
#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// TTL of fast-tier entries, both on populate and on promotion.
    pub fast_cache_ttl: Duration,
    /// Serialise concurrent misses for the same content key.
    pub coalesce_requests: bool,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            fast_cache_ttl: Duration::from_secs(3600),
            coalesce_requests: false,
        }
    }
}

/// Counter snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub fast_hits: u64,
    pub durable_hits: u64,
    pub misses: u64,
    pub synthesis_failures: u64,
    pub stale_records: u64,
}

#[derive(Debug, Default)]
struct Counters {
    fast_hits: AtomicU64,
    durable_hits: AtomicU64,
    misses: AtomicU64,
    synthesis_failures: AtomicU64,
    stale_records: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CoordinatorStats {
        CoordinatorStats {
            fast_hits: self.fast_hits.load(Ordering::Relaxed),
            durable_hits: self.durable_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            synthesis_failures: self.synthesis_failures.load(Ordering::Relaxed),
            stale_records: self.stale_records.load(Ordering::Relaxed),
        }
    }
}

/// Orchestrates fast tier → durable index → backend → store.
pub struct CacheCoordinator {
    backend: BoxedTTS,
    store: AudioStore,
    index: CacheIndex,
    fast: SharedFastCache,
    fast_cache_ttl: Duration,
    in_flight: Option<DashMap<ContentKey, Arc<Mutex<()>>>>,
    counters: Counters,
}

impl CacheCoordinator {
    pub fn new(
        backend: BoxedTTS,
        store: AudioStore,
        index: CacheIndex,
        fast: SharedFastCache,
        options: CoordinatorOptions,
    ) -> Self {
        Self {
            backend,
            store,
            index,
            fast,
            fast_cache_ttl: options.fast_cache_ttl,
            in_flight: options.coalesce_requests.then(DashMap::new),
            counters: Counters::default(),
        }
    }

    pub fn backend(&self) -> &BoxedTTS {
        &self.backend
    }

    pub fn store(&self) -> &AudioStore {
        &self.store
    }

    pub fn index(&self) -> &CacheIndex {
        &self.index
    }

    pub fn fast_cache(&self) -> &SharedFastCache {
        &self.fast
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.counters.snapshot()
    }

    /// Returns the audio for a normalized request, synthesizing on a miss.
    ///
    /// # Errors
    /// Fails only when synthesis fails or the synthesized audio cannot be
    /// written. Cache read and write failures are logged and treated as misses.
    pub async fn resolve(&self, request: &SynthesisRequest) -> AppResult<Resolved> {
        let key = request.content_key();

        if let Some(hit) = self.lookup_cached(&key, request).await {
            return Ok(hit);
        }

        let Some(in_flight) = &self.in_flight else {
            return self.synthesize_and_store(&key, request).await;
        };

        let slot = in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = slot.lock().await;
            match self.lookup_cached(&key, request).await {
                Some(hit) => Ok(hit),
                None => self.synthesize_and_store(&key, request).await,
            }
        };

        drop(slot);
        in_flight.remove_if(&key, |_, slot| Arc::strong_count(slot) == 1);

        result
    }

    async fn lookup_cached(&self, key: &ContentKey, request: &SynthesisRequest) -> Option<Resolved> {
        let fast_key = key.fast_cache_key();

        match self.fast.get(&fast_key).await {
            Ok(Some(path)) => match self.store.stat(&path).await {
                Ok(Some(stored)) => {
                    Counters::bump(&self.counters.fast_hits);
                    debug!(key = %key, "Fast cache hit");
                    return Some(Resolved {
                        audio_path: stored.path,
                        size: stored.size,
                        source: CacheSource::Fast,
                    });
                }
                Ok(None) => {
                    debug!(key = %key, path = %path.display(), "Fast cache entry points at a missing file");
                    if let Err(e) = self.fast.delete(&fast_key).await {
                        warn!("Failed to evict stale fast cache entry: {e}");
                    }
                }
                Err(e) => warn!("Failed to stat cached audio {}: {e}", path.display()),
            },
            Ok(None) => {}
            Err(e) => warn!("Fast cache lookup failed: {e}"),
        }

        match self.index.lookup(key, &request.voice, &request.format).await {
            Ok(Some(entry)) => match self.store.stat(&entry.audio_path).await {
                Ok(Some(stored)) => {
                    Counters::bump(&self.counters.durable_hits);
                    debug!(key = %key, "Durable cache hit");
                    if let Err(e) = self
                        .fast
                        .set(&fast_key, stored.path.clone(), self.fast_cache_ttl)
                        .await
                    {
                        warn!("Failed to promote entry to fast cache: {e}");
                    }
                    return Some(Resolved {
                        audio_path: stored.path,
                        size: stored.size,
                        source: CacheSource::Durable,
                    });
                }
                Ok(None) => {
                    Counters::bump(&self.counters.stale_records);
                    warn!(
                        key = %key,
                        path = %entry.audio_path.display(),
                        "Cache record points at a missing file; dropping record"
                    );
                    if let Err(e) = self.index.delete(key, &entry.voice, &entry.format).await {
                        warn!("Failed to drop stale cache record: {e}");
                    }
                }
                Err(e) => warn!(
                    "Failed to stat cached audio {}: {e}",
                    entry.audio_path.display()
                ),
            },
            Ok(None) => {}
            Err(e) => warn!("Cache index lookup failed: {e}"),
        }

        None
    }

    async fn synthesize_and_store(
        &self,
        key: &ContentKey,
        request: &SynthesisRequest,
    ) -> AppResult<Resolved> {
        Counters::bump(&self.counters.misses);
        debug!(key = %key, voice = %request.voice, format = %request.format, "Cache miss; synthesizing");

        let audio = match self.backend.synthesize(request).await {
            Ok(audio) => audio,
            Err(e) => {
                Counters::bump(&self.counters.synthesis_failures);
                return Err(e.into());
            }
        };

        let path = self.store.write(&audio, key, &request.format).await?;

        let entry = CacheEntry::new(key.clone(), &request.voice, &request.format, path.clone());
        match self.index.insert(&entry).await {
            Ok(()) => {}
            Err(IndexError::Duplicate { .. }) => {
                debug!(key = %key, "Cache record already present");
            }
            Err(e) => warn!("Failed to persist cache record: {e}"),
        }

        if let Err(e) = self
            .fast
            .set(&key.fast_cache_key(), path.clone(), self.fast_cache_ttl)
            .await
        {
            warn!("Failed to populate fast cache: {e}");
        }

        Ok(Resolved {
            audio_path: path,
            size: audio.len() as u64,
            source: CacheSource::Synthesized,
        })
    }

    /// Evicts durable records older than `max_age` relative to `now`
    /// (unix seconds), removing their files and fast-tier entries. Temp files
    /// from interrupted writes older than the same threshold are removed too.
    ///
    /// File and fast-tier removal is best-effort.
    pub async fn sweep_at(&self, max_age: Duration, now: i64) -> AppResult<Vec<CacheEntry>> {
        let evicted = self.index.evict_older_than_at(max_age, now).await?;

        for entry in &evicted {
            if let Err(e) = self.store.remove(&entry.audio_path).await {
                warn!("Failed to remove expired audio {}: {e}", entry.audio_path.display());
            }
            if let Err(e) = self.fast.delete(&entry.content_key.fast_cache_key()).await {
                warn!("Failed to evict expired fast cache entry: {e}");
            }
        }

        let cutoff_secs = now.saturating_sub(max_age.as_secs() as i64).max(0) as u64;
        let cutoff = UNIX_EPOCH + Duration::from_secs(cutoff_secs);
        match self.store.remove_stale_temp_files(cutoff).await {
            Ok(0) => {}
            Ok(n) => info!("Removed {n} stale temp files"),
            Err(e) => warn!("Failed to remove stale temp files: {e}"),
        }

        info!("Evicted {} expired cache entries", evicted.len());
        Ok(evicted)
    }

    pub async fn sweep(&self, max_age: Duration) -> AppResult<Vec<CacheEntry>> {
        self.sweep_at(max_age, unix_now()).await
    }
}
