//! `acestep-check`: smoke-test a running ACE-Step service from the shell.
//!
//! ```text
//! acestep-check health
//! acestep-check generate --caption "spa meditation" --duration 30 --instrumental
//! ```

use std::path::PathBuf;
use std::time::{Duration, Instant};

use acemusic_acestep::{AceStepApi, AceStepConfig};
use acemusic_core::generation::{AudioFormat, GenerationRequest};
use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "acestep-check")]
#[command(about = "Check connectivity to an ACE-Step service and run test generations")]
#[command(version)]
struct Cli {
    /// Base URL of the ACE-Step API
    #[arg(long, env = "ACESTEP_API_URL", default_value = "http://localhost:8001")]
    api_url: String,

    /// Bearer token for the API
    #[arg(long, env = "ACESTEP_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Per-request HTTP timeout in seconds
    #[arg(long, env = "ACESTEP_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print service health and the available models
    Health,

    /// Generate a short track and download it
    Generate {
        /// Style description
        #[arg(long, default_value = "ambient lounge jazz, soft piano, gentle strings")]
        caption: String,

        /// Duration in seconds (keep short for testing)
        #[arg(long, default_value_t = 30.0)]
        duration: f64,

        /// Lyrics to sing
        #[arg(long, conflicts_with = "instrumental")]
        lyrics: Option<String>,

        /// Instrumental only (sends empty lyrics)
        #[arg(long)]
        instrumental: bool,

        /// Output format: mp3, wav or flac
        #[arg(long, default_value = "mp3")]
        format: AudioFormat,

        /// Directory for the downloaded file
        #[arg(long, default_value = "outputs")]
        output_dir: PathBuf,

        /// Seconds between status polls
        #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 2.0)]
        poll_interval: f64,

        /// Give up after this many seconds
        #[arg(long, env = "POLL_TIMEOUT_SECS", default_value_t = 300.0)]
        poll_timeout: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "acemusic_acestep=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = AceStepConfig {
        base_url: cli.api_url.clone(),
        api_key: Some(cli.api_key.clone()),
        request_timeout: Duration::from_secs(cli.request_timeout),
    };
    let client = AceStepApi::new(&config)?;

    let outcome = run(&client, cli.command).await;
    client.close().await;
    outcome
}

async fn run(client: &AceStepApi, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Health => {
            println!("API: {}", client.api_url());

            let health = client.health().await.context("health check failed")?;
            println!("Health: {}", serde_json::to_string_pretty(&health)?);

            let models = client.list_models().await.context("model listing failed")?;
            println!("Models ({}):", models.len());
            for model in models {
                println!("  - {}", model.name);
            }
        }
        Commands::Generate {
            caption,
            duration,
            lyrics,
            instrumental,
            format,
            output_dir,
            poll_interval,
            poll_timeout,
        } => {
            // Empty lyrics are how the service is asked for an instrumental.
            let lyrics = if instrumental {
                String::new()
            } else {
                lyrics.unwrap_or_default()
            };
            let request = GenerationRequest {
                audio_duration: duration,
                audio_format: format,
                lyrics,
                ..GenerationRequest::new(caption)
            };
            acemusic_core::generation::validate_generation_request(&request)?;
            let poll_interval =
                Duration::try_from_secs_f64(poll_interval).context("invalid --poll-interval")?;
            let poll_timeout =
                Duration::try_from_secs_f64(poll_timeout).context("invalid --poll-timeout")?;

            println!("API: {}", client.api_url());
            println!("Caption: {}", request.prompt);
            println!("Duration: {}s", request.audio_duration);
            println!("Instrumental: {}", request.is_instrumental());
            println!("Format: {}", request.audio_format);

            let started = Instant::now();
            let path = client
                .generate_and_download(
                    &request,
                    &output_dir,
                    None,
                    poll_interval,
                    poll_timeout,
                )
                .await
                .context("generation failed")?;

            let size = tokio::fs::metadata(&path).await?.len();
            println!("Saved: {}", path.display());
            println!("Size: {:.1} KiB", size as f64 / 1024.0);
            println!("Elapsed: {:.1}s", started.elapsed().as_secs_f64());
        }
    }
    Ok(())
}
