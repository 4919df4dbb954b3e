use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables and defaults.
///
/// # Example YAML structure
/// ```yaml
/// storage:
///   path: "./data/audio"
///   cleanup_hours: 168
///   audio_url_prefix: "/api/v1/audio"
///
/// database:
///   path: "./data/tts_cache.db"
///
/// fast_cache:
///   enabled: true
///   max_entries: 10000
///   ttl_seconds: 3600
///
/// tts:
///   default_voice: "en-US-JennyNeural"
///   default_format: "mp3"
///   coalesce_requests: false
///
/// edge_tts:
///   endpoint: "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1"
///   connect_timeout_seconds: 30
///   receive_timeout_seconds: 30
///
/// logging:
///   level: "info"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub storage: Option<StorageYaml>,
    pub database: Option<DatabaseYaml>,
    pub fast_cache: Option<FastCacheYaml>,
    pub tts: Option<TtsYaml>,
    pub edge_tts: Option<EdgeTtsYaml>,
    pub logging: Option<LoggingYaml>,
}

/// Audio storage configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageYaml {
    pub path: Option<String>,
    pub cleanup_hours: Option<u64>,
    pub audio_url_prefix: Option<String>,
}

/// Durable index configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseYaml {
    pub path: Option<String>,
}

/// Fast tier configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct FastCacheYaml {
    pub enabled: Option<bool>,
    pub max_entries: Option<u64>,
    pub ttl_seconds: Option<u64>,
}

/// Synthesis defaults from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TtsYaml {
    pub default_voice: Option<String>,
    pub default_format: Option<String>,
    pub coalesce_requests: Option<bool>,
}

/// Edge backend connection settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct EdgeTtsYaml {
    pub endpoint: Option<String>,
    pub user_agent: Option<String>,
    pub connect_timeout_seconds: Option<u64>,
    pub receive_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingYaml {
    pub level: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
