//! Host Monitor
//!
//! Tracks bare-metal hosts waiting in a pool and keeps each one's lifecycle
//! state current: discovering, disconnected, insufficient, ready to be moved
//! to a cluster, or disabled.
//!
//! Hosts, their agent check-ins and hardware inventory come from a hosts
//! file that is re-read on every refresh cycle.

mod backoff;
mod config;
mod controller;
mod error;
mod reconciler;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Host Monitor");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!("  Hosts file: {}", config.hosts_file.display());
    info!("  Refresh interval: {}s", config.refresh_interval.as_secs());
    info!("  Refresh concurrency: {}", config.refresh_concurrency);
    info!(
        "  Disconnection timeout: {}s",
        config.disconnection_timeout.num_seconds()
    );
    info!(
        "  Minimums: {} cores, {} bytes memory, {} disk(s) of {} bytes",
        config.requirements.min_cpu_cores,
        config.requirements.min_memory_bytes,
        config.requirements.min_valid_disks,
        config.requirements.min_disk_size_bytes
    );

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
