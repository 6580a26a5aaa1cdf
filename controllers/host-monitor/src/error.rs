//! Controller-specific error types.
//!
//! This module defines error types specific to the Host Monitor that are not
//! covered by the lifecycle library's own errors.

use host_lifecycle::LifecycleError;
use thiserror::Error;

/// Errors that can occur in the Host Monitor.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Lifecycle engine error
    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Hosts file could not be read or parsed
    #[error("Hosts file error: {0:#}")]
    HostsFile(anyhow::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Shutdown signal handling failed
    #[error("Signal handling failed: {0}")]
    Signal(#[from] std::io::Error),
}
