//! Novel chapter to narrated video.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nreel_ai_client::{ArkClient, ChatCompletionClient};
use nreel_media::{check_ffmpeg, check_ffprobe, FfmpegTranscoder};
use nreel_worker::{run_pipeline, AiConfig, Cli, PipelineConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider was already installed");
    }

    // Load environment variables
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing with colored output for dev, JSON for production.
fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    // Matches every nreel_* crate target
    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "nreel=info".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

/// Returns whether the pipeline produced a result.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    info!("Starting nreel");

    let config = cli.apply_to_config(PipelineConfig::from_env());
    config.validate()?;
    info!("Pipeline config: {:?}", config);

    let ai = AiConfig::from_env()?;
    info!("AI config: {:?}", ai);

    let ffmpeg = check_ffmpeg().context("ffmpeg is required for muxing and merging")?;
    info!("Using ffmpeg at {}", ffmpeg.display());
    if check_ffprobe().is_none() {
        warn!("ffprobe not found, durations will be read from ffmpeg output");
    }

    let completion =
        ChatCompletionClient::new(ai.completion()).context("failed to create completion client")?;
    let provider = ArkClient::new(ai.ark()).context("failed to create generation client")?;
    let transcoder = FfmpegTranscoder::with_timeout(config.ffmpeg_timeout.as_secs());

    let result = run_pipeline(
        config,
        Arc::new(completion),
        Arc::new(provider),
        Arc::new(transcoder),
    )
    .await;

    match result {
        Some(result) => {
            info!(
                run_id = %result.run_id,
                merged_video = %result.merged_video_path.display(),
                "Done"
            );
            match serde_json::to_string_pretty(&result) {
                Ok(json) => println!("{}", json),
                Err(e) => warn!("Could not serialize the run result: {}", e),
            }
            Ok(true)
        }
        None => Ok(false),
    }
}
