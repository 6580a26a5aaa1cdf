//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the lifecycle
//! engine to the hosts file and drives the periodic refresh loop.

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::reconciler::{CycleSummary, Reconciler};
use crate::watcher::Watcher;
use host_lifecycle::{
    HostManager, HostTransitionHandler, InventoryFactProvider, InventorySource, MemoryInventoryStore,
    StateMachine, TracingEventSink, pool_host_rule_table,
};
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Main controller for pool host monitoring.
#[derive(Debug)]
pub struct Controller {
    config: ControllerConfig,
    watcher: Watcher,
    reconciler: Reconciler,
}

impl Controller {
    /// Creates a new controller instance.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::HostsFile`] if the hosts file cannot be
    /// loaded at startup.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Host Monitor");

        let watcher = Watcher::new(config.hosts_file.clone());

        // Fail fast on a missing or broken hosts file
        let initial = watcher.load().await.map_err(|e| {
            error!("Failed to load hosts file {}: {:#}", watcher.path().display(), e);
            ControllerError::HostsFile(e)
        })?;
        info!("Hosts file lists {} hosts", initial.hosts.len());

        let inventory = Arc::new(MemoryInventoryStore::new());
        let source: Arc<dyn InventorySource> = Arc::<MemoryInventoryStore>::clone(&inventory);
        let facts = Arc::new(InventoryFactProvider::new(
            source,
            config.requirements.clone(),
            config.disconnection_timeout,
        ));
        let machine = StateMachine::new(
            Arc::new(pool_host_rule_table()),
            Arc::new(HostTransitionHandler::new(Arc::new(TracingEventSink))),
        );
        let reconciler = Reconciler::new(
            HostManager::new(machine, facts),
            inventory,
            config.refresh_concurrency,
            config.max_backoff_cycles,
        );

        Ok(Self {
            config,
            watcher,
            reconciler,
        })
    }

    /// Runs the controller until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Signal`] if the shutdown signal cannot be
    /// installed.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        let mut interval = tokio::time::interval(self.config.refresh_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!(
            "Refreshing hosts every {}s",
            self.config.refresh_interval.as_secs()
        );
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.run_cycle().await;
                }
                result = &mut shutdown => {
                    result?;
                    info!("Shutdown requested, stopping Host Monitor");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn run_cycle(&mut self) -> CycleSummary {
        let summary = match self.watcher.load().await {
            Ok(file) => self.reconciler.reconcile(&file).await,
            Err(e) => {
                // Keep evaluating known hosts with the last check-ins we saw
                error!("Failed to reload hosts file, refreshing known hosts only: {:#}", e);
                self.reconciler.refresh_only().await
            }
        };

        info!(
            "Cycle complete: {} registered, {} removed, {} refreshed ({} changed, {} failed), {} backing off",
            summary.registered,
            summary.removed,
            summary.refreshed,
            summary.changed,
            summary.failed,
            summary.skipped
        );
        for record in self.reconciler.manager().list().await {
            debug!(
                "Host {}: {} ({})",
                record.host.id(),
                record.host.state(),
                record.display_status()
            );
        }
        summary
    }
}
