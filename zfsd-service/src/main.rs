// SPDX-License-Identifier: GPL-3.0-only

//! zfsd - JSON-RPC control daemon for zfs datasets
//!
//! Exposes dataset listing and lifecycle operations (set, snapshot, clone,
//! destroy, rollback) over HTTP on a unix socket or TCP address. Every
//! request shells out to the host `zfs` tool.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

mod adapters;
mod config;
mod error;
mod handlers;
mod transport;

use adapters::ZfsDatasetService;
use config::{Args, Config, DEFAULT_LOG_FILTER};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load(Args::parse())?;

    // Initialize logging to stderr
    let filter = match &config.log_filter {
        Some(directives) => EnvFilter::try_new(directives)?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting zfsd v{}", env!("CARGO_PKG_VERSION"));

    if unsafe { libc::geteuid() } != 0 {
        tracing::warn!("zfsd is not running as root; most zfs operations will fail");
    }

    tracing::info!(
        "Using {} with {:?} output, {:?} decoding",
        config.zfs_binary,
        config.output_shape,
        config.decoding
    );

    let service = Arc::new(ZfsDatasetService::from_config(&config));
    let router = transport::create_router(service);

    transport::serve(router, &config.listen, config.socket_mode).await?;

    tracing::info!("zfsd shutdown complete");
    Ok(())
}
