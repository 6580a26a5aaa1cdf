//! Post-transition handlers
//!
//! A [`TransitionHandler`] runs after the engine has selected and written the
//! destination state. It derives the host's status message and reports the
//! transition to an [`EventSink`].

use crate::error::HandlerError;
use crate::events::{EventSeverity, EventSink, HostEvent};
use crate::facts::HostFacts;
use crate::host::{Host, HostStatus};
use crate::rules::TransitionType;
use crate::status::{
    STATUS_INFO_DISABLED, STATUS_INFO_DISCOVERING, render_status,
};
use std::sync::Arc;
use tracing::debug;

/// What a handler knows about the transition it follows.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    /// Event that triggered the transition
    pub transition_type: TransitionType,
    /// State before the transition
    pub source_state: HostStatus,
    /// State selected by the rule
    pub destination_state: HostStatus,
    /// Facts the rule was evaluated against
    pub facts: &'a HostFacts,
}

/// Side effects run after a rule is applied.
///
/// Implementations must be idempotent: the same host, context and template
/// must leave the host unchanged and emit nothing the second time.
#[async_trait::async_trait]
pub trait TransitionHandler: Send + Sync {
    /// Host registered (or re-registered).
    async fn post_register_host(
        &self,
        host: &mut Host,
        ctx: &TransitionContext<'_>,
    ) -> Result<(), HandlerError>;

    /// Host disabled by an operator.
    async fn post_disable_host(
        &self,
        host: &mut Host,
        ctx: &TransitionContext<'_>,
    ) -> Result<(), HandlerError>;

    /// Host enabled by an operator.
    async fn post_enable_host(
        &self,
        host: &mut Host,
        ctx: &TransitionContext<'_>,
    ) -> Result<(), HandlerError>;

    /// Periodic refresh selected a destination with `template` as its status.
    async fn post_refresh_host(
        &self,
        host: &mut Host,
        ctx: &TransitionContext<'_>,
        template: &'static str,
    ) -> Result<(), HandlerError>;
}

/// Default handler: sets the status message and emits an event on change.
#[derive(Clone)]
pub struct HostTransitionHandler {
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for HostTransitionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostTransitionHandler").finish_non_exhaustive()
    }
}

impl HostTransitionHandler {
    /// Creates a handler reporting to `events`.
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self { events }
    }

    /// Emits an event and then stores `status_info`, if anything changed.
    ///
    /// The status is written only after a successful emission so a failed
    /// emission is repeated on the next evaluation. The retried event still
    /// reports the state the host moved away from.
    async fn update_status(
        &self,
        host: &mut Host,
        ctx: &TransitionContext<'_>,
        status_info: String,
    ) -> Result<(), HandlerError> {
        let source_state = host.unreported_from().unwrap_or(ctx.source_state);
        let state_changed = source_state != ctx.destination_state;
        if !state_changed && host.status_info() == status_info {
            debug!(
                "Host {} unchanged in {}, skipping event",
                host.id(),
                ctx.destination_state
            );
            host.set_unreported_from(None);
            return Ok(());
        }

        let message = if state_changed {
            format!(
                "Host status updated from {} to {} ({}): {}",
                source_state, ctx.destination_state, ctx.transition_type, status_info
            )
        } else {
            format!("Host status info updated in {}: {}", ctx.destination_state, status_info)
        };
        let event = HostEvent::new(host.id(), severity_for(ctx.destination_state), message);
        if let Err(e) = self.events.emit(event).await {
            host.set_unreported_from(state_changed.then_some(source_state));
            return Err(e);
        }

        host.set_unreported_from(None);
        host.set_status_info(status_info);
        Ok(())
    }
}

fn severity_for(state: HostStatus) -> EventSeverity {
    match state {
        HostStatus::Disconnected | HostStatus::Insufficient => EventSeverity::Warning,
        HostStatus::Initial
        | HostStatus::Discovering
        | HostStatus::ReadyToBeMoved
        | HostStatus::Disabled => EventSeverity::Info,
    }
}

#[async_trait::async_trait]
impl TransitionHandler for HostTransitionHandler {
    async fn post_register_host(
        &self,
        host: &mut Host,
        ctx: &TransitionContext<'_>,
    ) -> Result<(), HandlerError> {
        self.update_status(host, ctx, STATUS_INFO_DISCOVERING.to_string()).await
    }

    async fn post_disable_host(
        &self,
        host: &mut Host,
        ctx: &TransitionContext<'_>,
    ) -> Result<(), HandlerError> {
        self.update_status(host, ctx, STATUS_INFO_DISABLED.to_string()).await
    }

    async fn post_enable_host(
        &self,
        host: &mut Host,
        ctx: &TransitionContext<'_>,
    ) -> Result<(), HandlerError> {
        self.update_status(host, ctx, STATUS_INFO_DISCOVERING.to_string()).await
    }

    async fn post_refresh_host(
        &self,
        host: &mut Host,
        ctx: &TransitionContext<'_>,
        template: &'static str,
    ) -> Result<(), HandlerError> {
        let status_info = render_status(template, ctx.facts)?;
        self.update_status(host, ctx, status_info).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventSink;
    use crate::facts::Fact;
    use crate::host::HostId;
    use crate::status::{
        STATUS_INFO_DISCONNECTED, STATUS_INFO_INSUFFICIENT_HARDWARE, STATUS_INFO_READY_TO_BE_MOVED,
    };

    fn handler() -> (HostTransitionHandler, RecordingEventSink) {
        let sink = RecordingEventSink::new();
        (HostTransitionHandler::new(Arc::new(sink.clone())), sink)
    }

    fn ctx(facts: &HostFacts, from: HostStatus, to: HostStatus) -> TransitionContext<'_> {
        TransitionContext {
            transition_type: TransitionType::Refresh,
            source_state: from,
            destination_state: to,
            facts,
        }
    }

    #[tokio::test]
    async fn test_refresh_sets_status_and_emits_warning() {
        let (handler, sink) = handler();
        let mut host = Host::restore(HostId::new(), HostStatus::Disconnected, "");
        let facts = HostFacts::default();

        handler
            .post_refresh_host(
                &mut host,
                &ctx(&facts, HostStatus::Discovering, HostStatus::Disconnected),
                STATUS_INFO_DISCONNECTED,
            )
            .await
            .unwrap();

        assert_eq!(host.status_info(), STATUS_INFO_DISCONNECTED);
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, EventSeverity::Warning);
        assert!(events[0].message.contains("from discovering to disconnected"));
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let (handler, sink) = handler();
        let mut host = Host::restore(HostId::new(), HostStatus::Insufficient, "");
        let facts = HostFacts::all(true).with(Fact::HasMinMemory, false);
        let context = ctx(&facts, HostStatus::Insufficient, HostStatus::Insufficient);

        for _ in 0..3 {
            handler
                .post_refresh_host(&mut host, &context, STATUS_INFO_INSUFFICIENT_HARDWARE)
                .await
                .unwrap();
        }

        assert_eq!(sink.len(), 1);
        assert!(host.status_info().ends_with("insufficient memory"));
    }

    #[tokio::test]
    async fn test_failed_emission_leaves_status_for_retry() {
        let (handler, sink) = handler();
        sink.set_failing(true);
        let mut host = Host::restore(HostId::new(), HostStatus::Disabled, "previous");
        let facts = HostFacts::default();
        let context = TransitionContext {
            transition_type: TransitionType::DisableHost,
            source_state: HostStatus::Discovering,
            destination_state: HostStatus::Disabled,
            facts: &facts,
        };

        let result = handler.post_disable_host(&mut host, &context).await;
        assert!(matches!(result, Err(HandlerError::EventSink(_))));
        assert_eq!(host.status_info(), "previous");

        sink.set_failing(false);
        handler.post_disable_host(&mut host, &context).await.unwrap();
        assert_eq!(host.status_info(), STATUS_INFO_DISABLED);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn test_retried_event_reports_original_move() {
        let (handler, sink) = handler();
        let mut host = Host::restore(HostId::new(), HostStatus::ReadyToBeMoved, STATUS_INFO_DISCOVERING);
        let facts = HostFacts::all(true);

        sink.set_failing(true);
        let result = handler
            .post_refresh_host(
                &mut host,
                &ctx(&facts, HostStatus::Discovering, HostStatus::ReadyToBeMoved),
                STATUS_INFO_READY_TO_BE_MOVED,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(host.unreported_from(), Some(HostStatus::Discovering));

        // Next refresh starts from the state that was already written
        sink.set_failing(false);
        handler
            .post_refresh_host(
                &mut host,
                &ctx(&facts, HostStatus::ReadyToBeMoved, HostStatus::ReadyToBeMoved),
                STATUS_INFO_READY_TO_BE_MOVED,
            )
            .await
            .unwrap();

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].message.contains("from discovering to ready-to-be-moved"));
        assert_eq!(host.unreported_from(), None);
        assert_eq!(host.status_info(), STATUS_INFO_READY_TO_BE_MOVED);
    }

    #[tokio::test]
    async fn test_template_failure_is_handler_error() {
        let (handler, sink) = handler();
        let mut host = Host::restore(HostId::new(), HostStatus::Insufficient, "");
        let facts = HostFacts::all(true);

        let result = handler
            .post_refresh_host(
                &mut host,
                &ctx(&facts, HostStatus::Discovering, HostStatus::Insufficient),
                STATUS_INFO_INSUFFICIENT_HARDWARE,
            )
            .await;
        assert!(matches!(result, Err(HandlerError::Template(_))));
        assert!(sink.is_empty());
    }
}
