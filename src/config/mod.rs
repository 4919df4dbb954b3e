//! Service configuration.
//!
//! Configuration is assembled from three layers, highest priority first:
//! a YAML file (optional), environment variables (including those loaded
//! from `.env` by the binary) and built-in defaults.
//!
//! # Example
//! ```rust,no_run
//! use voxcache::config::ServiceConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServiceConfig::from_file(&PathBuf::from("config.yaml"))?;
//! println!("Audio stored under {}", config.storage_path.display());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::core::cache::CoordinatorOptions;
use crate::core::request::RequestNormalizer;
use crate::core::tts::EdgeTTSConfig;

mod env;
mod merge;
mod utils;
mod validation;
mod yaml;

pub use merge::merge_config;
pub use utils::parse_bool;
pub use yaml::YamlConfig;

pub const DEFAULT_STORAGE_PATH: &str = "./data/audio";
pub const DEFAULT_CLEANUP_HOURS: u64 = 168;
pub const DEFAULT_AUDIO_URL_PREFIX: &str = "/api/v1/audio";
pub const DEFAULT_DATABASE_PATH: &str = "./data/tts_cache.db";
pub const DEFAULT_FAST_CACHE_MAX_ENTRIES: u64 = 10_000;
pub const DEFAULT_FAST_CACHE_TTL_SECS: u64 = 3600;
pub const DEFAULT_VOICE: &str = "en-US-JennyNeural";
pub const DEFAULT_FORMAT: &str = "mp3";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Every environment variable the loader reads.
#[cfg(test)]
pub(crate) const ENV_VARS: &[&str] = &[
    "STORAGE_PATH",
    "STORAGE_CLEANUP_HOURS",
    "AUDIO_URL_PREFIX",
    "DATABASE_PATH",
    "FAST_CACHE_ENABLED",
    "FAST_CACHE_MAX_ENTRIES",
    "FAST_CACHE_TTL_SECONDS",
    "TTS_DEFAULT_VOICE",
    "TTS_DEFAULT_FORMAT",
    "TTS_COALESCE_REQUESTS",
    "EDGE_TTS_ENDPOINT",
    "EDGE_TTS_USER_AGENT",
    "EDGE_TTS_CONNECT_TIMEOUT_SECONDS",
    "EDGE_TTS_RECEIVE_TIMEOUT_SECONDS",
    "LOG_LEVEL",
];

/// Fully resolved service configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Directory holding synthesized audio files.
    pub storage_path: PathBuf,
    /// Default maximum age, in hours, for the cleanup sweep.
    pub cleanup_hours: u64,
    /// Prefix of the public audio URLs handed back to callers.
    pub audio_url_prefix: String,

    /// SQLite database backing the durable tier.
    pub database_path: PathBuf,

    pub fast_cache_enabled: bool,
    pub fast_cache_max_entries: u64,
    pub fast_cache_ttl: Duration,

    pub default_voice: String,
    pub default_format: String,
    /// Serialise concurrent misses for the same content.
    pub coalesce_requests: bool,

    pub edge_endpoint: String,
    pub edge_user_agent: String,
    pub edge_connect_timeout: Duration,
    pub edge_receive_timeout: Duration,

    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let edge = EdgeTTSConfig::default();
        Self {
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            cleanup_hours: DEFAULT_CLEANUP_HOURS,
            audio_url_prefix: DEFAULT_AUDIO_URL_PREFIX.to_string(),
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            fast_cache_enabled: true,
            fast_cache_max_entries: DEFAULT_FAST_CACHE_MAX_ENTRIES,
            fast_cache_ttl: Duration::from_secs(DEFAULT_FAST_CACHE_TTL_SECS),
            default_voice: DEFAULT_VOICE.to_string(),
            default_format: DEFAULT_FORMAT.to_string(),
            coalesce_requests: false,
            edge_endpoint: edge.endpoint,
            edge_user_agent: edge.user_agent,
            edge_connect_timeout: edge.connect_timeout,
            edge_receive_timeout: edge.receive_timeout,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. Default values
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, an environment
    /// variable is malformed, or validation fails.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = YamlConfig::from_file(path)?;
        let mut config = merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the merged configuration, normalising the default format.
    pub fn validate(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        validation::validate_path("STORAGE_PATH", &self.storage_path)?;
        validation::validate_path("DATABASE_PATH", &self.database_path)?;
        validation::validate_backend_endpoint(&self.edge_endpoint)?;
        validation::validate_non_zero_duration(
            "EDGE_TTS_CONNECT_TIMEOUT_SECONDS",
            self.edge_connect_timeout,
        )?;
        validation::validate_non_zero_duration(
            "EDGE_TTS_RECEIVE_TIMEOUT_SECONDS",
            self.edge_receive_timeout,
        )?;
        if self.fast_cache_enabled {
            validation::validate_non_zero("FAST_CACHE_MAX_ENTRIES", self.fast_cache_max_entries)?;
            validation::validate_non_zero_duration("FAST_CACHE_TTL_SECONDS", self.fast_cache_ttl)?;
        }
        validation::validate_log_level(&self.log_level)?;
        self.default_format = validation::normalize_default_format(&self.default_format);
        Ok(())
    }

    /// Backend connection settings.
    pub fn edge_config(&self) -> EdgeTTSConfig {
        EdgeTTSConfig {
            endpoint: self.edge_endpoint.clone(),
            user_agent: self.edge_user_agent.clone(),
            connect_timeout: self.edge_connect_timeout,
            receive_timeout: self.edge_receive_timeout,
            ..EdgeTTSConfig::default()
        }
    }

    pub fn coordinator_options(&self) -> CoordinatorOptions {
        CoordinatorOptions {
            fast_cache_ttl: self.fast_cache_ttl,
            coalesce_requests: self.coalesce_requests,
        }
    }

    pub fn normalizer(&self) -> RequestNormalizer {
        RequestNormalizer::new(&self.default_voice, &self.default_format)
    }

    /// Default cleanup age.
    pub fn cleanup_max_age(&self) -> Duration {
        Duration::from_secs(self.cleanup_hours.saturating_mul(3600))
    }
}
