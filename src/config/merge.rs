use std::path::PathBuf;
use std::time::Duration;

use super::env::{env_bool, env_parse, env_string};
use super::yaml::YamlConfig;
use super::{
    DEFAULT_AUDIO_URL_PREFIX, DEFAULT_CLEANUP_HOURS, DEFAULT_DATABASE_PATH, DEFAULT_FAST_CACHE_MAX_ENTRIES,
    DEFAULT_FAST_CACHE_TTL_SECS, DEFAULT_FORMAT, DEFAULT_LOG_LEVEL, DEFAULT_STORAGE_PATH, DEFAULT_VOICE,
    ServiceConfig,
};
use crate::core::tts::edge::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_RECEIVE_TIMEOUT_SECS, DEFAULT_USER_AGENT, EDGE_TTS_URL,
};

/// Merge YAML configuration with environment variables
///
/// Priority order (highest to lowest):
/// 1. YAML configuration values
/// 2. Environment variables
/// 3. Default values
///
/// # Arguments
/// * `yaml_config` - Optional YAML configuration to use as overrides
pub fn merge_config(
    yaml_config: Option<YamlConfig>,
) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
    let yaml = yaml_config.unwrap_or_default();

    // Helper macro to get value with priority: YAML > ENV > Default
    macro_rules! get_value {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            $yaml_value
                .or_else(|| env_string($env_var))
                .unwrap_or_else(|| $default.to_string())
        };
    }

    // Same priority for parsed values; a malformed variable is an error
    macro_rules! get_parsed {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            match $yaml_value {
                Some(value) => value,
                None => env_parse($env_var)?.unwrap_or($default),
            }
        };
    }

    macro_rules! get_bool {
        ($env_var:expr, $yaml_value:expr, $default:expr) => {
            match $yaml_value {
                Some(value) => value,
                None => env_bool($env_var)?.unwrap_or($default),
            }
        };
    }

    let storage = yaml.storage.unwrap_or_default();
    let database = yaml.database.unwrap_or_default();
    let fast_cache = yaml.fast_cache.unwrap_or_default();
    let tts = yaml.tts.unwrap_or_default();
    let edge = yaml.edge_tts.unwrap_or_default();
    let logging = yaml.logging.unwrap_or_default();

    // Storage
    let storage_path = PathBuf::from(get_value!(
        "STORAGE_PATH",
        storage.path,
        DEFAULT_STORAGE_PATH
    ));
    let cleanup_hours = get_parsed!(
        "STORAGE_CLEANUP_HOURS",
        storage.cleanup_hours,
        DEFAULT_CLEANUP_HOURS
    );
    let audio_url_prefix = get_value!(
        "AUDIO_URL_PREFIX",
        storage.audio_url_prefix,
        DEFAULT_AUDIO_URL_PREFIX
    );

    let database_path = PathBuf::from(get_value!(
        "DATABASE_PATH",
        database.path,
        DEFAULT_DATABASE_PATH
    ));

    // Fast tier
    let fast_cache_enabled = get_bool!("FAST_CACHE_ENABLED", fast_cache.enabled, true);
    let fast_cache_max_entries = get_parsed!(
        "FAST_CACHE_MAX_ENTRIES",
        fast_cache.max_entries,
        DEFAULT_FAST_CACHE_MAX_ENTRIES
    );
    let fast_cache_ttl_secs: u64 = get_parsed!(
        "FAST_CACHE_TTL_SECONDS",
        fast_cache.ttl_seconds,
        DEFAULT_FAST_CACHE_TTL_SECS
    );

    // Synthesis defaults
    let default_voice = get_value!("TTS_DEFAULT_VOICE", tts.default_voice, DEFAULT_VOICE);
    let default_format = get_value!("TTS_DEFAULT_FORMAT", tts.default_format, DEFAULT_FORMAT);
    let coalesce_requests = get_bool!("TTS_COALESCE_REQUESTS", tts.coalesce_requests, false);

    // Edge backend
    let edge_endpoint = get_value!("EDGE_TTS_ENDPOINT", edge.endpoint, EDGE_TTS_URL);
    let edge_user_agent = get_value!("EDGE_TTS_USER_AGENT", edge.user_agent, DEFAULT_USER_AGENT);
    let connect_timeout_secs: u64 = get_parsed!(
        "EDGE_TTS_CONNECT_TIMEOUT_SECONDS",
        edge.connect_timeout_seconds,
        DEFAULT_CONNECT_TIMEOUT_SECS
    );
    let receive_timeout_secs: u64 = get_parsed!(
        "EDGE_TTS_RECEIVE_TIMEOUT_SECONDS",
        edge.receive_timeout_seconds,
        DEFAULT_RECEIVE_TIMEOUT_SECS
    );

    let log_level = get_value!("LOG_LEVEL", logging.level, DEFAULT_LOG_LEVEL);

    Ok(ServiceConfig {
        storage_path,
        cleanup_hours,
        audio_url_prefix,
        database_path,
        fast_cache_enabled,
        fast_cache_max_entries,
        fast_cache_ttl: Duration::from_secs(fast_cache_ttl_secs),
        default_voice,
        default_format,
        coalesce_requests,
        edge_endpoint,
        edge_user_agent,
        edge_connect_timeout: Duration::from_secs(connect_timeout_secs),
        edge_receive_timeout: Duration::from_secs(receive_timeout_secs),
        log_level,
    })
}
