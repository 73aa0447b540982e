//! S3 Mirror
//!
//! Recursively uploads a local directory to an S3 bucket.

use anyhow::{Context, Result};
use clap::Parser;
use s3_mirror::cli::Cli;
use s3_mirror::s3::S3ClientFactory;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("s3_mirror=info")))
        .init();

    let cli = Cli::parse();
    tracing::info!("Starting S3 Mirror v{}", env!("CARGO_PKG_VERSION"));

    let (job, config) = cli.into_parts();
    let factory = S3ClientFactory::new(config);

    job.mirror(&factory).await.with_context(|| {
        format!(
            "Failed to mirror {:?} to s3://{}",
            job.local_path(),
            job.bucket()
        )
    })?;

    Ok(())
}
