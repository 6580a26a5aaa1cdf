//! Inventory-backed fact provider
//!
//! Hosts check in periodically and may attach a hardware inventory document.
//! [`InventoryFactProvider`] reads the latest record for a host once per
//! evaluation and derives every [`Fact`] from it against a set of
//! [`HardwareRequirements`].

use crate::error::FactError;
use crate::facts::{Fact, FactProvider, HostFacts};
use crate::host::{Host, HostId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

const GIB: u64 = 1024 * 1024 * 1024;
const GB: u64 = 1000 * 1000 * 1000;

/// Hardware inventory reported by a host agent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Inventory {
    /// CPU summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Cpu>,
    /// Memory summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Memory>,
    /// Block devices
    #[serde(default)]
    pub disks: Vec<Disk>,
    /// Platform vendor details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_vendor: Option<SystemVendor>,
}

/// CPU summary
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cpu {
    /// Number of logical cores
    pub count: u32,
}

/// Memory summary
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Memory {
    /// Installed physical memory in bytes
    pub physical_bytes: u64,
}

/// A block device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    /// Device name, e.g. `sda`
    pub name: String,
    /// Drive type as reported by the agent (`HDD`, `SSD`, `ODD`, ...)
    pub drive_type: String,
    /// Capacity in bytes
    pub size_bytes: u64,
}

/// Platform vendor details
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SystemVendor {
    /// Manufacturer name
    #[serde(default)]
    pub manufacturer: String,
    /// Product name
    #[serde(default)]
    pub product_name: String,
    /// Whether the host is a virtual machine
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
}

impl Inventory {
    /// Parses an inventory document.
    ///
    /// # Errors
    ///
    /// Returns [`FactError::MalformedInventory`] if `text` is not valid inventory JSON.
    pub fn parse(text: &str) -> Result<Self, FactError> {
        serde_json::from_str(text).map_err(|e| FactError::MalformedInventory(e.to_string()))
    }
}

/// Minimum hardware a pool host must have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareRequirements {
    /// Minimum logical CPU cores
    pub min_cpu_cores: u32,
    /// Minimum physical memory in bytes
    pub min_memory_bytes: u64,
    /// Minimum size of a disk to count as valid
    pub min_disk_size_bytes: u64,
    /// Minimum number of valid disks
    pub min_valid_disks: usize,
    /// Manufacturers that are not supported (case-insensitive)
    #[serde(default)]
    pub unsupported_manufacturers: Vec<String>,
}

impl Default for HardwareRequirements {
    fn default() -> Self {
        Self {
            min_cpu_cores: 2,
            min_memory_bytes: 8 * GIB,
            min_disk_size_bytes: 120 * GB,
            min_valid_disks: 1,
            unsupported_manufacturers: Vec::new(),
        }
    }
}

impl HardwareRequirements {
    /// Whether the host has enough eligible disks.
    ///
    /// Only rotational and solid-state drives of at least the minimum size count.
    #[must_use]
    pub fn has_min_valid_disks(&self, inventory: &Inventory) -> bool {
        let valid = inventory
            .disks
            .iter()
            .filter(|disk| {
                matches!(disk.drive_type.to_ascii_uppercase().as_str(), "HDD" | "SSD")
                    && disk.size_bytes >= self.min_disk_size_bytes
            })
            .count();
        valid >= self.min_valid_disks
    }

    /// Whether the host has enough CPU cores.
    ///
    /// # Errors
    ///
    /// Returns [`FactError::MissingSection`] if the inventory has no CPU section.
    pub fn has_min_cpu_cores(&self, inventory: &Inventory) -> Result<bool, FactError> {
        let cpu = inventory.cpu.as_ref().ok_or(FactError::MissingSection("cpu"))?;
        Ok(cpu.count >= self.min_cpu_cores)
    }

    /// Whether the host has enough memory.
    ///
    /// # Errors
    ///
    /// Returns [`FactError::MissingSection`] if the inventory has no memory section.
    pub fn has_min_memory(&self, inventory: &Inventory) -> Result<bool, FactError> {
        let memory = inventory
            .memory
            .as_ref()
            .ok_or(FactError::MissingSection("memory"))?;
        Ok(memory.physical_bytes >= self.min_memory_bytes)
    }

    /// Whether the host's platform is supported.
    ///
    /// # Errors
    ///
    /// Returns [`FactError::MissingSection`] if the inventory has no vendor section.
    pub fn is_platform_valid(&self, inventory: &Inventory) -> Result<bool, FactError> {
        let vendor = inventory
            .system_vendor
            .as_ref()
            .ok_or(FactError::MissingSection("system_vendor"))?;
        let manufacturer = vendor.manufacturer.trim();
        Ok(!manufacturer.is_empty()
            && !self
                .unsupported_manufacturers
                .iter()
                .any(|unsupported| unsupported.eq_ignore_ascii_case(manufacturer)))
    }
}

/// Latest check-in data for a host.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    /// Raw inventory document, if reported
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<String>,
    /// Time of the last check-in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_in_at: Option<DateTime<Utc>>,
}

/// Source of host inventory records.
#[async_trait::async_trait]
pub trait InventorySource: Send + Sync {
    /// Latest record for `host_id`, or `None` if the host never checked in.
    async fn record(&self, host_id: HostId) -> Result<Option<InventoryRecord>, FactError>;
}

/// In-memory inventory store updated by host check-ins.
#[derive(Debug, Default)]
pub struct MemoryInventoryStore {
    records: RwLock<HashMap<HostId, InventoryRecord>>,
}

impl MemoryInventoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a check-in. A `None` inventory keeps the previous document.
    pub async fn check_in(&self, host_id: HostId, inventory: Option<String>, at: DateTime<Utc>) {
        let mut records = self.records.write().await;
        let record = records.entry(host_id).or_default();
        if inventory.is_some() {
            record.inventory = inventory;
        }
        record.checked_in_at = Some(at);
        debug!("Host {} checked in at {}", host_id, at);
    }

    /// Drops the record for a host.
    pub async fn remove(&self, host_id: HostId) -> Option<InventoryRecord> {
        self.records.write().await.remove(&host_id)
    }
}

#[async_trait::async_trait]
impl InventorySource for MemoryInventoryStore {
    async fn record(&self, host_id: HostId) -> Result<Option<InventoryRecord>, FactError> {
        Ok(self.records.read().await.get(&host_id).cloned())
    }
}

/// Derives host facts from inventory records.
#[derive(Clone)]
pub struct InventoryFactProvider {
    source: Arc<dyn InventorySource>,
    requirements: HardwareRequirements,
    disconnection_timeout: Duration,
}

impl std::fmt::Debug for InventoryFactProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryFactProvider")
            .field("requirements", &self.requirements)
            .field("disconnection_timeout", &self.disconnection_timeout)
            .finish_non_exhaustive()
    }
}

impl InventoryFactProvider {
    /// Default time after the last check-in before a host counts as disconnected.
    pub const DEFAULT_DISCONNECTION_TIMEOUT_SECS: i64 = 180;

    /// Creates a provider over `source`.
    pub fn new(
        source: Arc<dyn InventorySource>,
        requirements: HardwareRequirements,
        disconnection_timeout: Duration,
    ) -> Self {
        Self {
            source,
            requirements,
            disconnection_timeout,
        }
    }

    /// Hardware minimums in force
    #[must_use]
    pub fn requirements(&self) -> &HardwareRequirements {
        &self.requirements
    }

    /// Whether the host checked in within the disconnection timeout.
    ///
    /// # Errors
    ///
    /// Returns [`FactError::MissingCheckIn`] if the host never checked in.
    pub fn is_connected(&self, record: &InventoryRecord, now: DateTime<Utc>) -> Result<bool, FactError> {
        let checked_in_at = record.checked_in_at.ok_or(FactError::MissingCheckIn)?;
        Ok(now - checked_in_at <= self.disconnection_timeout)
    }

    /// Whether the host reported a non-empty inventory document.
    #[must_use]
    pub fn has_inventory(record: &InventoryRecord) -> bool {
        record
            .inventory
            .as_deref()
            .is_some_and(|text| !text.trim().is_empty())
    }

    /// Captures facts for `host` as of `now`.
    pub async fn snapshot_at(&self, host: &Host, now: DateTime<Utc>) -> HostFacts {
        let record = match self.source.record(host.id()).await {
            Ok(record) => record.unwrap_or_default(),
            Err(e) => {
                warn!("Inventory for host {} unavailable: {}", host.id(), e);
                return HostFacts::unavailable(&e.to_string());
            }
        };

        let mut facts = HostFacts::new(now);
        facts.record(Fact::Connected, self.is_connected(&record, now));

        let has_inventory = Self::has_inventory(&record);
        facts.record(Fact::HasInventory, Ok(has_inventory));
        if !has_inventory {
            return facts;
        }

        let text = record.inventory.as_deref().unwrap_or_default();
        match Inventory::parse(text) {
            Ok(inventory) => {
                facts.record(
                    Fact::HasMinValidDisks,
                    Ok(self.requirements.has_min_valid_disks(&inventory)),
                );
                facts.record(Fact::HasMinCpuCores, self.requirements.has_min_cpu_cores(&inventory));
                facts.record(Fact::HasMinMemory, self.requirements.has_min_memory(&inventory));
                facts.record(Fact::PlatformValid, self.requirements.is_platform_valid(&inventory));
            }
            Err(e) => {
                for fact in Fact::HARDWARE {
                    facts.record(fact, Err(e.clone()));
                }
            }
        }
        facts
    }
}

#[async_trait::async_trait]
impl FactProvider for InventoryFactProvider {
    async fn snapshot(&self, host: &Host) -> HostFacts {
        self.snapshot_at(host, Utc::now()).await
    }
}
