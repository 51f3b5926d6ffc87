//! demo-upload - push recorded demos to a webhook

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::Parser;
use demo_upload::config::{Config, ConfigOptions};
use demo_upload::host::TracingLog;
use demo_upload::upload::{Dispatch, Uploader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Module serial used when running standalone
const MODULE_SERIAL: u32 = 1;

/// Module name used when running standalone
const MODULE_NAME: &str = "demoupload";

#[derive(Parser, Debug)]
#[command(name = "demo-upload")]
#[command(about = "Upload recorded demos to an HTTP endpoint")]
struct Args {
    /// Push URL (falls back to DEMO_UPLOAD_URL)
    #[arg(long)]
    url: Option<String>,

    /// Whole-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Connect timeout in seconds
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Maximum number of redirects to follow
    #[arg(long)]
    max_redirects: Option<usize>,

    /// Demo files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let destination = args
        .url
        .or_else(Config::destination_from_env)
        .unwrap_or_default();
    if destination.is_empty() {
        warn!("No push URL configured, demos will not be uploaded");
    }

    let config = Config::new(
        destination,
        ConfigOptions {
            request_timeout: args.timeout,
            connect_timeout: args.connect_timeout,
            max_redirects: args.max_redirects,
        },
    );

    let uploader = Uploader::new(config, Arc::new(TracingLog));
    uploader
        .initialize(MODULE_SERIAL, MODULE_NAME)
        .map_err(|e| anyhow!("Failed to start demo uploader: {}", e))?;

    for file in &args.files {
        match uploader.upload(file) {
            Ok(Dispatch::Spawned(upload_id)) => info!(%upload_id, "Queued {}", file.display()),
            Ok(Dispatch::Skipped) => {}
            Err(e) => warn!("Cannot upload {}: {}", file.display(), e),
        }
    }

    info!("{}", uploader.status_line());
    uploader.shutdown().await;

    Ok(())
}
