//! Reconciliation logic for pool hosts.
//!
//! Each cycle brings the host manager in line with the hosts file
//! (registrations, check-ins, enable/disable requests, removals) and then
//! refreshes every host that is not backing off after a failed evaluation.

use crate::backoff::BackoffState;
use crate::error::ControllerError;
use crate::watcher::{HostEntry, HostsFile};
use host_lifecycle::{HostId, HostManager, HostStatus, MemoryInventoryStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Counters for one reconciliation cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Hosts registered for the first time
    pub registered: usize,
    /// Hosts no longer in the hosts file
    pub removed: usize,
    /// Hosts refreshed
    pub refreshed: usize,
    /// Hosts skipped while backing off
    pub skipped: usize,
    /// Hosts whose state changed on refresh
    pub changed: usize,
    /// Hosts whose refresh failed
    pub failed: usize,
}

/// Reconciles pool hosts against the hosts file.
pub struct Reconciler {
    manager: HostManager,
    inventory: Arc<MemoryInventoryStore>,
    backoffs: HashMap<HostId, BackoffState>,
    refresh_concurrency: usize,
    max_backoff_cycles: u64,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("backing_off", &self.backoffs.len())
            .field("refresh_concurrency", &self.refresh_concurrency)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        manager: HostManager,
        inventory: Arc<MemoryInventoryStore>,
        refresh_concurrency: usize,
        max_backoff_cycles: u64,
    ) -> Self {
        Self {
            manager,
            inventory,
            backoffs: HashMap::new(),
            refresh_concurrency,
            max_backoff_cycles,
        }
    }

    /// Host manager driven by this reconciler
    #[must_use]
    pub fn manager(&self) -> &HostManager {
        &self.manager
    }

    /// Runs one full cycle: sync with the hosts file, then refresh.
    pub async fn reconcile(&mut self, file: &HostsFile) -> CycleSummary {
        let mut summary = CycleSummary::default();
        self.sync_hosts(file, &mut summary).await;
        self.refresh(&mut summary).await;
        summary
    }

    /// Refreshes known hosts without reading the hosts file.
    pub async fn refresh_only(&mut self) -> CycleSummary {
        let mut summary = CycleSummary::default();
        self.refresh(&mut summary).await;
        summary
    }

    async fn sync_hosts(&mut self, file: &HostsFile, summary: &mut CycleSummary) {
        let known: HashSet<HostId> = self.manager.host_ids().await.into_iter().collect();
        let desired: HashSet<HostId> = file.hosts.iter().map(|entry| entry.id).collect();

        for entry in &file.hosts {
            if let Some(at) = entry.checked_in_at {
                self.inventory.check_in(entry.id, entry.inventory.clone(), at).await;
            }

            if !known.contains(&entry.id) {
                match self.manager.register_host(entry.id).await {
                    Ok(state) => {
                        info!("Registered host {} ({})", entry.id, state);
                        summary.registered += 1;
                    }
                    Err(e) => error!("Failed to register host {}: {}", entry.id, e),
                }
            }

            if let Err(e) = self.apply_disabled(entry).await {
                warn!("Failed to apply enable/disable for host {}: {}", entry.id, e);
            }
        }

        for id in known.difference(&desired) {
            if self.manager.remove_host(*id).await.is_some() {
                self.inventory.remove(*id).await;
                self.backoffs.remove(id);
                summary.removed += 1;
            }
        }
    }

    async fn apply_disabled(&self, entry: &HostEntry) -> Result<(), ControllerError> {
        let Some(record) = self.manager.get(entry.id).await else {
            return Ok(());
        };
        let is_disabled = record.host.state() == HostStatus::Disabled;
        if entry.disabled && !is_disabled {
            info!("Disabling host {}", entry.id);
            self.manager.disable_host(entry.id).await?;
        } else if !entry.disabled && is_disabled {
            info!("Enabling host {}", entry.id);
            self.manager.enable_host(entry.id).await?;
        }
        Ok(())
    }

    async fn refresh(&mut self, summary: &mut CycleSummary) {
        let mut due = Vec::new();
        for id in self.manager.host_ids().await {
            let skip = self
                .backoffs
                .get_mut(&id)
                .is_some_and(BackoffState::should_skip);
            if skip {
                debug!("Host {} is backing off, skipping refresh", id);
                summary.skipped += 1;
            } else {
                due.push(id);
            }
        }

        let outcomes = self
            .manager
            .refresh_hosts(due, self.refresh_concurrency)
            .await;
        for outcome in outcomes {
            summary.refreshed += 1;
            if outcome.changed() {
                summary.changed += 1;
            }
            match &outcome.result {
                Ok(_) => {
                    if let Some(mut state) = self.backoffs.remove(&outcome.host_id) {
                        state.reset();
                        debug!("Host {} recovered, backoff cleared", outcome.host_id);
                    }
                }
                Err(e) => {
                    summary.failed += 1;
                    let max_backoff_cycles = self.max_backoff_cycles;
                    let state = self
                        .backoffs
                        .entry(outcome.host_id)
                        .or_insert_with(|| BackoffState::new(max_backoff_cycles));
                    state.increment_error();
                    warn!(
                        "Refresh of host {} failed ({} consecutive): {}",
                        outcome.host_id,
                        state.error_count(),
                        e
                    );
                }
            }
        }
    }
}
