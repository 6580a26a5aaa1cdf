//! Controller configuration.
//!
//! Configuration is read from environment variables. Only `HOSTS_FILE` is
//! required; every other setting has a default.

use crate::error::ControllerError;
use host_lifecycle::HardwareRequirements;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const GIB: u64 = 1024 * 1024 * 1024;
const GB: u64 = 1000 * 1000 * 1000;

/// Host Monitor settings.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Hosts file re-read every refresh cycle
    pub hosts_file: PathBuf,
    /// Time between refresh cycles
    pub refresh_interval: Duration,
    /// Hosts refreshed in parallel
    pub refresh_concurrency: usize,
    /// Silence after which a host counts as disconnected
    pub disconnection_timeout: chrono::Duration,
    /// Pool hardware minimums
    pub requirements: HardwareRequirements,
    /// Maximum number of cycles a failing host is skipped
    pub max_backoff_cycles: u64,
}

impl ControllerConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::InvalidConfig`] if `HOSTS_FILE` is missing or
    /// a numeric setting does not parse.
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`ControllerConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let hosts_file = lookup("HOSTS_FILE").ok_or_else(|| {
            ControllerError::InvalidConfig("HOSTS_FILE environment variable is required".to_string())
        })?;

        let refresh_interval_secs: u64 = parse(&lookup, "REFRESH_INTERVAL_SECS", 60)?;
        if refresh_interval_secs == 0 {
            return Err(ControllerError::InvalidConfig(
                "REFRESH_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }
        let disconnection_timeout_secs: i64 = parse(&lookup, "DISCONNECTION_TIMEOUT_SECS", 180)?;
        let disconnection_timeout = chrono::Duration::try_seconds(disconnection_timeout_secs)
            .filter(|timeout| *timeout > chrono::Duration::zero())
            .ok_or_else(|| {
                ControllerError::InvalidConfig(format!(
                    "DISCONNECTION_TIMEOUT_SECS must be a positive number of seconds, got {disconnection_timeout_secs}"
                ))
            })?;
        let unsupported_manufacturers = lookup("UNSUPPORTED_MANUFACTURERS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            hosts_file: PathBuf::from(hosts_file),
            refresh_interval: Duration::from_secs(refresh_interval_secs),
            refresh_concurrency: parse(&lookup, "REFRESH_CONCURRENCY", 8)?,
            disconnection_timeout,
            requirements: HardwareRequirements {
                min_cpu_cores: parse(&lookup, "MIN_CPU_CORES", 2)?,
                min_memory_bytes: parse_bytes(&lookup, "MIN_MEMORY_GIB", 8, GIB)?,
                min_disk_size_bytes: parse_bytes(&lookup, "MIN_DISK_SIZE_GB", 120, GB)?,
                min_valid_disks: parse(&lookup, "MIN_VALID_DISKS", 1)?,
                unsupported_manufacturers,
            },
            max_backoff_cycles: parse(&lookup, "MAX_BACKOFF_CYCLES", 10)?,
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, ControllerError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| {
            ControllerError::InvalidConfig(format!("{name} has invalid value '{value}'"))
        }),
    }
}

/// Parses a size given in `unit`s and converts it to bytes.
fn parse_bytes(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    unit: u64,
) -> Result<u64, ControllerError> {
    let value: u64 = parse(lookup, name, default)?;
    value
        .checked_mul(unit)
        .ok_or_else(|| ControllerError::InvalidConfig(format!("{name} is too large: {value}")))
}
