//! Service-facing synthesis contract.
//!
//! [`TtsService`] is what an outer transport (HTTP handlers, the CLI) talks
//! to. It normalizes requests, drives the cache coordinator and renders
//! results as public audio URLs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::config::{DEFAULT_CLEANUP_HOURS, ServiceConfig};
use crate::core::cache::{
    AudioStore, CacheCoordinator, CacheIndex, CoordinatorStats, FastCache, MokaFastCache,
    NoopFastCache, SharedFastCache, audio_url, content_type_for,
};
use crate::core::openai::OpenAISpeechRequest;
use crate::core::request::{RequestNormalizer, SynthesisRequest};
use crate::core::tts::{BaseTTS, EdgeOutputFormat, create_tts_provider};
use crate::errors::{AppError, AppResult};
use crate::utils::generate_request_id;

/// Result of a synthesis call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesisResponse {
    pub audio_url: String,
    /// Audio length in bytes.
    pub size: u64,
    pub task_id: String,
    pub cached: bool,
}

/// A stored audio file ready to be served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioFile {
    pub path: PathBuf,
    pub content_type: String,
    pub size: u64,
}

/// Cache statistics across both tiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: u64,
    /// Unix seconds of the oldest durable record.
    pub oldest_created_at: Option<i64>,
    pub fast_cache_backend: String,
    pub lookups: CoordinatorStats,
}

pub struct TtsService {
    coordinator: CacheCoordinator,
    normalizer: RequestNormalizer,
    audio_url_prefix: String,
    cleanup_max_age: Duration,
}

impl TtsService {
    pub fn new(
        coordinator: CacheCoordinator,
        normalizer: RequestNormalizer,
        audio_url_prefix: impl Into<String>,
    ) -> Self {
        Self {
            coordinator,
            normalizer,
            audio_url_prefix: audio_url_prefix.into(),
            cleanup_max_age: Duration::from_secs(DEFAULT_CLEANUP_HOURS * 3600),
        }
    }

    /// Sets the age used by [`TtsService::cleanup_expired`] when none is given.
    pub fn with_cleanup_max_age(mut self, max_age: Duration) -> Self {
        self.cleanup_max_age = max_age;
        self
    }

    /// Wires the Edge backend, audio store, durable index and fast tier
    /// described by `config`.
    ///
    /// # Errors
    /// Fails if the backend configuration is invalid or the storage directory
    /// or index database cannot be opened.
    pub async fn from_config(config: &ServiceConfig) -> AppResult<Self> {
        let backend = create_tts_provider("edge", config.edge_config())
            .map_err(|e| AppError::Internal(format!("Failed to create synthesis backend: {e}")))?;

        let store = AudioStore::new(&config.storage_path);
        tokio::fs::create_dir_all(store.root()).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create storage directory {}: {e}",
                store.root().display()
            ))
        })?;

        let index = CacheIndex::open(&config.database_path).await?;

        let fast: SharedFastCache = if config.fast_cache_enabled {
            Arc::new(MokaFastCache::new(config.fast_cache_max_entries))
        } else {
            Arc::new(NoopFastCache)
        };

        info!(
            storage = %config.storage_path.display(),
            database = %config.database_path.display(),
            fast_cache = fast.backend_type(),
            coalesce = config.coalesce_requests,
            "TTS service initialized"
        );

        let coordinator =
            CacheCoordinator::new(backend, store, index, fast, config.coordinator_options());

        Ok(
            Self::new(coordinator, config.normalizer(), &config.audio_url_prefix)
                .with_cleanup_max_age(config.cleanup_max_age()),
        )
    }

    pub fn coordinator(&self) -> &CacheCoordinator {
        &self.coordinator
    }

    /// Synthesizes `request`, serving from cache when possible.
    pub async fn synthesize(&self, request: SynthesisRequest) -> AppResult<SynthesisResponse> {
        let request = self.normalizer.normalize(request)?;
        let resolved = self.coordinator.resolve(&request).await?;

        Ok(SynthesisResponse {
            audio_url: audio_url(&self.audio_url_prefix, &resolved.audio_path),
            size: resolved.size,
            task_id: generate_request_id(),
            cached: resolved.was_cached(),
        })
    }

    /// Synthesizes an OpenAI-style request and returns the audio file itself.
    ///
    /// The content type names the encoding actually requested from the
    /// backend, so formats it cannot produce are labelled as MP3.
    pub async fn synthesize_openai(&self, request: OpenAISpeechRequest) -> AppResult<AudioFile> {
        let request = self
            .normalizer
            .normalize(request.into_synthesis_request()?)?;
        let resolved = self.coordinator.resolve(&request).await?;

        Ok(AudioFile {
            path: resolved.audio_path,
            content_type: EdgeOutputFormat::from_format(&request.format)
                .content_type()
                .to_string(),
            size: resolved.size,
        })
    }

    /// Maps a public filename onto a path inside the storage root.
    pub fn resolve_audio_path(&self, filename: &str) -> AppResult<PathBuf> {
        Ok(self.coordinator.store().resolve(filename)?)
    }

    /// Looks up a stored file by its public filename.
    ///
    /// # Errors
    /// `InvalidFilename` for names that cannot address a file, `NotFound` if
    /// nothing is stored under the name.
    pub async fn audio_file(&self, filename: &str) -> AppResult<AudioFile> {
        let path = self.resolve_audio_path(filename)?;
        let stored = self
            .coordinator
            .store()
            .stat(&path)
            .await?
            .ok_or_else(|| AppError::NotFound(filename.to_string()))?;

        let name = stored
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(AudioFile {
            content_type: content_type_for(&name).to_string(),
            path: stored.path,
            size: stored.size,
        })
    }

    /// Evicts cache entries older than `max_age_hours` (or the configured
    /// default) and returns how many durable records were removed.
    pub async fn cleanup_expired(&self, max_age_hours: Option<u64>) -> AppResult<u64> {
        let max_age = max_age_hours
            .map(|hours| Duration::from_secs(hours.saturating_mul(3600)))
            .unwrap_or(self.cleanup_max_age);

        let evicted = self.coordinator.sweep(max_age).await?;
        Ok(evicted.len() as u64)
    }

    pub async fn cache_stats(&self) -> AppResult<CacheStats> {
        let index = self.coordinator.index().stats().await?;
        Ok(CacheStats {
            total_entries: index.total_entries,
            oldest_created_at: index.oldest_created_at,
            fast_cache_backend: self.coordinator.fast_cache().backend_type().to_string(),
            lookups: self.coordinator.stats(),
        })
    }

    /// Description of the synthesis backend.
    pub fn provider_info(&self) -> serde_json::Value {
        self.coordinator.backend().get_provider_info()
    }
}
