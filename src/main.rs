//! OBS Uploadr - upload one file to S3-compatible object storage
//!
//! Small files go up with a single signed PUT, large files as a concurrent
//! multipart upload.

use anyhow::Context;
use clap::Parser;
use obs_uploadr::config::Config;
use obs_uploadr::obs::{ObsClient, ObsClientConfig};
use obs_uploadr::upload::{ObjectUploader, UploadOptions};
use obs_uploadr::{logging, metrics};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// OBS Uploadr - SigV4-signed uploads with multipart segmenting
#[derive(Parser, Debug)]
#[command(name = "obs-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "obs.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Content-Type of the uploaded object
    #[arg(long)]
    content_type: Option<String>,

    /// User metadata as name=value, may be repeated
    #[arg(long = "meta", value_parser = parse_metadata)]
    metadata: Vec<(String, String)>,

    /// Print Prometheus metrics after the upload
    #[arg(long)]
    print_metrics: bool,

    /// Local file to upload
    file: PathBuf,

    /// Object key in the bucket
    key: String,
}

fn parse_metadata(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, data)) if !name.trim().is_empty() => Ok((name.trim().to_string(), data.to_string())),
        _ => Err(format!("expected name=value, got '{}'", value)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(&args.config)
        .with_context(|| format!("failed to load configuration from {:?}", args.config))?;
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    // Initialize logging
    logging::init_subscriber(&config.logging)?;
    info!("Starting OBS Uploadr v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from {:?}", args.config);

    let client = ObsClient::new(ObsClientConfig::from_config(&config)?)?;
    let uploader = ObjectUploader::new(Arc::new(client), config.upload.clone());

    let options = UploadOptions {
        content_type: args.content_type.clone(),
        metadata: args.metadata.iter().cloned().collect::<BTreeMap<_, _>>(),
    };
    let result = uploader
        .upload_file(&args.file, &args.key, &options)
        .await
        .with_context(|| format!("failed to upload {:?} as '{}'", args.file, args.key))?;

    println!(
        "{} {:?} bytes={} parts={}",
        result.etag, result.method, result.bytes_written, result.parts
    );

    if args.print_metrics && config.metrics.enabled {
        print!("{}", metrics::render());
    }

    Ok(())
}
