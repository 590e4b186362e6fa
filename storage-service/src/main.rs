// SPDX-License-Identifier: GPL-3.0-only

//! Storage service daemon
//!
//! Probes local block devices on start and keeps the device graph current
//! while partition and volume group jobs run.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use storage_service::{DEFAULT_CONFIG_PATH, Request, ServiceConfig, StorageService};
use storage_sys::linux::{LvmTools, system_capabilities, system_collaborators};
use storage_sys::StorageEngine;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Debug, Parser)]
#[command(version, about = "Privileged partitioning and volume preparation service")]
struct Args {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ServiceConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting storage service v{}", env!("CARGO_PKG_VERSION"));

    if unsafe { libc::geteuid() } != 0 {
        tracing::error!("Storage service must run as root");
        anyhow::bail!("Service must run with root privileges");
    }

    let capabilities = Arc::new(system_capabilities());
    for filesystem in capabilities.filesystems() {
        tracing::debug!("{}: {:?}", filesystem.as_str(), capabilities.capabilities(filesystem));
    }
    let engine = StorageEngine::new(
        system_collaborators(&config.engine),
        capabilities,
        config.engine.clone(),
    );
    let service = StorageService::start(Arc::new(engine), Arc::new(LvmTools), config.queue_depth);

    let mut completions = service.subscribe();
    let reporter = tokio::spawn(async move {
        loop {
            match completions.recv().await {
                Ok(completion) => match (&completion.outcome, &completion.graph) {
                    (Ok(_), Some(graph)) => tracing::info!(
                        "{} finished; graph generation {} with {} devices",
                        completion.description,
                        graph.generation,
                        graph.devices.len()
                    ),
                    (Ok(_), None) => tracing::info!("{} finished", completion.description),
                    (Err(error), _) => {
                        tracing::error!("{} failed: {error}", completion.description)
                    }
                },
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("missed {skipped} completions");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    service.submit(Request::Probe).await?;

    tracing::info!("Storage service ready");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down storage service");

    service.shutdown().await;
    reporter.abort();
    Ok(())
}
