//! Video editing bot binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vedit_gateway::{TelegramConfig, TelegramGateway};
use vedit_media::FfmpegTranscoder;
use vedit_worker::{JobExecutor, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vedit=info".parse()?);

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

    info!("Starting vedit-worker");

    let config = WorkerConfig::from_env().context("Failed to load configuration")?;
    info!("Worker config: {:?}", config);

    FfmpegTranscoder::check_available().context("ffmpeg and ffprobe must be installed")?;

    let gateway = TelegramGateway::new(
        TelegramConfig::new(config.bot_token.clone()).with_poll_timeout(config.poll_timeout),
    );
    let executor = Arc::new(JobExecutor::new(
        config,
        Arc::new(gateway),
        Arc::new(FfmpegTranscoder::default()),
    ));

    // Setup signal handler
    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_executor.shutdown();
        }
    });

    executor.run().await.context("Executor error")?;

    info!("Worker shutdown complete");
    Ok(())
}
