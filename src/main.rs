use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voxcache::{OpenAISpeechRequest, ServiceConfig, SynthesisRequest, TtsService};

/// voxcache - cached text-to-speech synthesis
#[derive(Parser, Debug)]
#[command(name = "voxcache")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Synthesize text and print the JSON response
    Synthesize {
        /// Text to speak
        text: String,

        /// Voice name (defaults to the configured voice)
        #[arg(short = 'v', long)]
        voice: Option<String>,

        /// Output format: mp3, wav or ogg
        #[arg(short = 'f', long)]
        format: Option<String>,

        /// Speaking rate multiplier
        #[arg(short = 's', long, default_value_t = 1.0)]
        speed: f64,

        /// Pitch offset in Hz
        #[arg(short = 'p', long, default_value_t = 0, allow_hyphen_values = true)]
        pitch: i32,

        /// Treat the text as trusted SSML markup
        #[arg(long)]
        ssml: bool,
    },

    /// Synthesize an OpenAI-style speech request and print the file location
    Speech {
        /// Text to speak
        #[arg(long)]
        input: String,

        /// OpenAI voice name (alloy, echo, fable, onyx, nova, shimmer) or an Edge voice
        #[arg(long, default_value = "alloy")]
        voice: String,

        #[arg(long, default_value = "tts-1")]
        model: String,

        #[arg(long = "response-format")]
        response_format: Option<String>,

        #[arg(long)]
        speed: Option<f64>,
    },

    /// Resolve a public audio filename to its path on disk
    Resolve {
        filename: String,
    },

    /// Remove cache entries older than the given age
    Cleanup {
        /// Maximum age in hours (defaults to the configured cleanup age)
        #[arg(long = "max-age-hours")]
        max_age_hours: Option<u64>,
    },

    /// Print cache statistics
    Stats,
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    // Load configuration from file or environment
    let config = if let Some(config_path) = cli.config {
        ServiceConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ServiceConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    init_tracing(&config.log_level);

    let service = TtsService::from_config(&config).await?;

    match cli.command {
        Commands::Synthesize {
            text,
            voice,
            format,
            speed,
            pitch,
            ssml,
        } => {
            let request = SynthesisRequest {
                voice: voice.unwrap_or_default(),
                format: format.unwrap_or_default(),
                ..SynthesisRequest::new(text)
            }
            .with_speed(speed)
            .with_pitch(pitch)
            .with_ssml(ssml);

            let response = service.synthesize(request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Speech {
            input,
            voice,
            model,
            response_format,
            speed,
        } => {
            let file = service
                .synthesize_openai(OpenAISpeechRequest {
                    model,
                    input,
                    voice,
                    response_format,
                    speed,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&file)?);
        }
        Commands::Resolve { filename } => {
            let path = service.resolve_audio_path(&filename)?;
            println!("{}", path.display());
        }
        Commands::Cleanup { max_age_hours } => {
            let evicted = service.cleanup_expired(max_age_hours).await?;
            println!("Evicted {evicted} expired cache entries");
        }
        Commands::Stats => {
            let stats = service.cache_stats().await?;
            let report = serde_json::json!({
                "cache": stats,
                "provider": service.provider_info(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
