//! Host manager
//!
//! Owns the host index and drives the [`StateMachine`] for register, enable,
//! disable and refresh requests. Each host has its own lock: fact snapshot,
//! rule match, state write and handler run as one unit per host, while
//! different hosts are evaluated in parallel.

use crate::engine::StateMachine;
use crate::error::LifecycleError;
use crate::facts::FactProvider;
use crate::host::{Host, HostId, HostStatus};
use crate::rules::TransitionType;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// A managed host plus the outcome of its last evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostRecord {
    /// The host itself
    pub host: Host,
    /// Set when the last evaluation found no matching transition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stuck: Option<String>,
    /// Set when the last post-transition handler failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Time of the last evaluation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reconciled: Option<DateTime<Utc>>,
}

impl HostRecord {
    fn new(id: HostId) -> Self {
        Self {
            host: Host::new(id),
            stuck: None,
            last_error: None,
            last_reconciled: None,
        }
    }

    /// Message to show for the host.
    ///
    /// A stuck host reports why it is stuck instead of its status info.
    #[must_use]
    pub fn display_status(&self) -> &str {
        self.stuck.as_deref().unwrap_or(self.host.status_info())
    }
}

/// Result of evaluating one host during a bulk refresh.
#[derive(Debug)]
pub struct RefreshOutcome {
    /// Host evaluated
    pub host_id: HostId,
    /// State before the evaluation
    pub previous: HostStatus,
    /// New state, or why the evaluation failed
    pub result: Result<HostStatus, LifecycleError>,
}

impl RefreshOutcome {
    /// Whether the host changed state.
    #[must_use]
    pub fn changed(&self) -> bool {
        match &self.result {
            Ok(state) => *state != self.previous,
            Err(e) => e.selected_state().is_some_and(|state| state != self.previous),
        }
    }
}

/// Drives lifecycle transitions for a set of hosts.
pub struct HostManager {
    machine: StateMachine,
    facts: Arc<dyn FactProvider>,
    hosts: RwLock<HashMap<HostId, Arc<Mutex<HostRecord>>>>,
}

impl std::fmt::Debug for HostManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostManager")
            .field("machine", &self.machine)
            .finish_non_exhaustive()
    }
}

impl HostManager {
    /// Creates a manager with no hosts.
    pub fn new(machine: StateMachine, facts: Arc<dyn FactProvider>) -> Self {
        Self {
            machine,
            facts,
            hosts: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a host, creating it on first registration.
    ///
    /// # Errors
    ///
    /// Returns the engine error if the registration could not be applied.
    pub async fn register_host(&self, id: HostId) -> Result<HostStatus, LifecycleError> {
        let record = {
            let mut hosts = self.hosts.write().await;
            Arc::clone(hosts.entry(id).or_insert_with(|| {
                info!("Adding host {} to the pool", id);
                Arc::new(Mutex::new(HostRecord::new(id)))
            }))
        };
        self.evaluate(&record, TransitionType::RegisterHost).await
    }

    /// Enables a disabled host.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::HostNotFound`] for unknown hosts, otherwise the engine error.
    pub async fn enable_host(&self, id: HostId) -> Result<HostStatus, LifecycleError> {
        self.apply(id, TransitionType::EnableHost).await
    }

    /// Disables a host.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::HostNotFound`] for unknown hosts, otherwise the engine error.
    pub async fn disable_host(&self, id: HostId) -> Result<HostStatus, LifecycleError> {
        self.apply(id, TransitionType::DisableHost).await
    }

    /// Re-evaluates one host against its current facts.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::HostNotFound`] for unknown hosts, otherwise the engine error.
    pub async fn refresh_host(&self, id: HostId) -> Result<HostStatus, LifecycleError> {
        self.apply(id, TransitionType::Refresh).await
    }

    /// Refreshes the given hosts, at most `concurrency` at a time.
    pub async fn refresh_hosts(
        &self,
        ids: impl IntoIterator<Item = HostId>,
        concurrency: usize,
    ) -> Vec<RefreshOutcome> {
        futures::stream::iter(ids)
            .map(|host_id| async move {
                let previous = self.get(host_id).await.map_or(HostStatus::Initial, |r| r.host.state());
                let result = self.refresh_host(host_id).await;
                RefreshOutcome {
                    host_id,
                    previous,
                    result,
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }

    /// Refreshes every managed host.
    pub async fn refresh_all(&self, concurrency: usize) -> Vec<RefreshOutcome> {
        let ids = self.host_ids().await;
        self.refresh_hosts(ids, concurrency).await
    }

    /// Removes a host from management.
    pub async fn remove_host(&self, id: HostId) -> Option<HostRecord> {
        let record = self.hosts.write().await.remove(&id)?;
        let record = record.lock().await.clone();
        info!("Removed host {} from the pool", id);
        Some(record)
    }

    /// Current record for a host.
    pub async fn get(&self, id: HostId) -> Option<HostRecord> {
        let record = self.hosts.read().await.get(&id).cloned()?;
        let record = record.lock().await.clone();
        Some(record)
    }

    /// Identifiers of all managed hosts, sorted.
    pub async fn host_ids(&self) -> Vec<HostId> {
        let mut ids: Vec<HostId> = self.hosts.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Records of all managed hosts, sorted by identifier.
    pub async fn list(&self) -> Vec<HostRecord> {
        let mut records = Vec::new();
        for id in self.host_ids().await {
            if let Some(record) = self.get(id).await {
                records.push(record);
            }
        }
        records
    }

    async fn apply(&self, id: HostId, transition: TransitionType) -> Result<HostStatus, LifecycleError> {
        let record = self
            .hosts
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(LifecycleError::HostNotFound(id))?;
        self.evaluate(&record, transition).await
    }

    async fn evaluate(
        &self,
        record: &Mutex<HostRecord>,
        transition: TransitionType,
    ) -> Result<HostStatus, LifecycleError> {
        let mut record = record.lock().await;
        let facts = self.facts.snapshot(&record.host).await;
        debug!(
            "Evaluating {} for host {} in {} ({} fact issues)",
            transition,
            record.host.id(),
            record.host.state(),
            facts.issues().len()
        );

        let result = self.machine.run(transition, &mut record.host, &facts).await;
        record.last_reconciled = Some(Utc::now());
        match &result {
            Ok(_) => {
                record.stuck = None;
                record.last_error = None;
            }
            Err(e @ LifecycleError::NoMatchingTransition { .. }) => {
                error!("Host {} is stuck: {}", record.host.id(), e);
                record.stuck = Some(e.to_string());
            }
            Err(e) => {
                warn!("Host {} evaluation failed: {}", record.host.id(), e);
                record.stuck = None;
                record.last_error = Some(e.to_string());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventSink;
    use crate::facts::{Fact, HostFacts};
    use crate::handler::HostTransitionHandler;
    use crate::pool::pool_host_rule_table;
    use crate::status::{STATUS_INFO_DISCOVERING, STATUS_INFO_READY_TO_BE_MOVED};
    use std::sync::Mutex as StdMutex;

    /// Fact provider returning whatever facts the test last set.
    #[derive(Default)]
    struct StaticFacts(StdMutex<HashMap<HostId, HostFacts>>);

    impl StaticFacts {
        fn set(&self, id: HostId, facts: HostFacts) {
            self.0.lock().unwrap().insert(id, facts);
        }
    }

    #[async_trait::async_trait]
    impl FactProvider for StaticFacts {
        async fn snapshot(&self, host: &Host) -> HostFacts {
            self.0.lock().unwrap().get(&host.id()).cloned().unwrap_or_default()
        }
    }

    fn manager() -> (HostManager, Arc<StaticFacts>, RecordingEventSink) {
        let sink = RecordingEventSink::new();
        let facts = Arc::new(StaticFacts::default());
        let machine = StateMachine::new(
            Arc::new(pool_host_rule_table()),
            Arc::new(HostTransitionHandler::new(Arc::new(sink.clone()))),
        );
        (HostManager::new(machine, facts.clone()), facts, sink)
    }

    #[tokio::test]
    async fn test_register_creates_discovering_host() {
        let (manager, _, _) = manager();
        let id = HostId::new();

        assert_eq!(manager.register_host(id).await.unwrap(), HostStatus::Discovering);
        let record = manager.get(id).await.unwrap();
        assert_eq!(record.host.status_info(), STATUS_INFO_DISCOVERING);
        assert!(record.last_reconciled.is_some());
    }

    #[tokio::test]
    async fn test_unknown_host_is_not_found() {
        let (manager, _, _) = manager();
        let result = manager.refresh_host(HostId::new()).await;
        assert!(matches!(result, Err(LifecycleError::HostNotFound(_))));
    }

    #[tokio::test]
    async fn test_stuck_host_has_distinct_status() {
        let (manager, facts, _) = manager();
        let id = HostId::new();
        manager.register_host(id).await.unwrap();
        facts.set(id, HostFacts::all(true).with(Fact::HasMinMemory, false));
        assert_eq!(manager.refresh_host(id).await.unwrap(), HostStatus::Insufficient);

        // Connected, but the inventory disappeared
        facts.set(id, HostFacts::all(true).with(Fact::HasInventory, false));
        let result = manager.refresh_host(id).await;
        assert!(matches!(result, Err(LifecycleError::NoMatchingTransition { .. })));

        let record = manager.get(id).await.unwrap();
        assert_eq!(record.host.state(), HostStatus::Insufficient);
        assert_eq!(
            record.display_status(),
            "No transition defined for RefreshStatus in state insufficient"
        );

        facts.set(id, HostFacts::all(true));
        manager.refresh_host(id).await.unwrap();
        let record = manager.get(id).await.unwrap();
        assert!(record.stuck.is_none());
        assert_eq!(record.display_status(), STATUS_INFO_READY_TO_BE_MOVED);
    }

    #[tokio::test]
    async fn test_handler_failure_keeps_selected_state() {
        let (manager, facts, sink) = manager();
        let id = HostId::new();
        manager.register_host(id).await.unwrap();

        sink.set_failing(true);
        facts.set(id, HostFacts::all(true));
        let err = manager.refresh_host(id).await.unwrap_err();
        assert_eq!(err.selected_state(), Some(HostStatus::ReadyToBeMoved));

        let record = manager.get(id).await.unwrap();
        assert_eq!(record.host.state(), HostStatus::ReadyToBeMoved);
        assert!(record.last_error.is_some());
        assert_eq!(record.host.status_info(), STATUS_INFO_DISCOVERING);

        // The next refresh retries the handler
        sink.set_failing(false);
        manager.refresh_host(id).await.unwrap();
        let record = manager.get(id).await.unwrap();
        assert!(record.last_error.is_none());
        assert_eq!(record.host.status_info(), STATUS_INFO_READY_TO_BE_MOVED);

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(events[1].message.contains("from discovering to ready-to-be-moved"));
    }

    #[tokio::test]
    async fn test_refresh_all_evaluates_every_host() {
        let (manager, facts, _) = manager();
        let ready = HostId::new();
        let lost = HostId::new();
        manager.register_host(ready).await.unwrap();
        manager.register_host(lost).await.unwrap();
        facts.set(ready, HostFacts::all(true));

        let outcomes = manager.refresh_all(4).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(RefreshOutcome::changed));

        assert_eq!(manager.get(ready).await.unwrap().host.state(), HostStatus::ReadyToBeMoved);
        assert_eq!(manager.get(lost).await.unwrap().host.state(), HostStatus::Disconnected);
    }

    #[tokio::test]
    async fn test_concurrent_evaluations_of_one_host_do_not_interleave() {
        let (manager, facts, sink) = manager();
        let manager = Arc::new(manager);
        let id = HostId::new();
        manager.register_host(id).await.unwrap();
        facts.set(id, HostFacts::all(true));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let manager = Arc::clone(&manager);
            tasks.push(tokio::spawn(async move { manager.refresh_host(id).await }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), HostStatus::ReadyToBeMoved);
        }

        // One event for registration, one for the move to ready
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn test_disable_enable_cycle() {
        let (manager, _, _) = manager();
        let id = HostId::new();
        manager.register_host(id).await.unwrap();

        assert_eq!(manager.disable_host(id).await.unwrap(), HostStatus::Disabled);
        assert_eq!(manager.register_host(id).await.unwrap(), HostStatus::Disabled);
        assert_eq!(manager.refresh_host(id).await.unwrap(), HostStatus::Disabled);
        assert_eq!(manager.enable_host(id).await.unwrap(), HostStatus::Discovering);

        let removed = manager.remove_host(id).await.unwrap();
        assert_eq!(removed.host.state(), HostStatus::Discovering);
        assert!(manager.list().await.is_empty());
    }
}
