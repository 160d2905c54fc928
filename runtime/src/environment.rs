//! Dependencies shared by the workflow service, assignment engine and scheduler.

use crate::config::EngineConfig;
use crate::locks::TicketLocks;
use crate::metrics::EventBusMetrics;
use helpdesk_core::WorkflowError;
use helpdesk_core::directory::UserDirectory;
use helpdesk_core::environment::Clock;
use helpdesk_core::event::{SerializedEvent, TicketEvent};
use helpdesk_core::event_bus::EventBus;
use helpdesk_core::policy::{Decision, Relationship, TicketAction, authorize};
use helpdesk_core::store::TicketStore;
use helpdesk_core::types::{Ticket, TicketId, UserId};
use helpdesk_core::user::User;
use std::sync::Arc;

/// Everything the engine talks to, bundled.
///
/// Cloning is cheap and clones share the lock registry, so every component
/// built from the same environment serializes on the same tickets.
#[derive(Clone)]
pub struct WorkflowEnvironment {
    /// Ticket storage.
    pub store: Arc<dyn TicketStore>,
    /// Identity and role lookups.
    pub directory: Arc<dyn UserDirectory>,
    /// Outbound event transport.
    pub event_bus: Arc<dyn EventBus>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Tunables.
    pub config: Arc<EngineConfig>,
    locks: TicketLocks,
}

impl WorkflowEnvironment {
    /// Bundles the ports with a fresh lock registry.
    #[must_use]
    pub fn new(
        store: Arc<dyn TicketStore>,
        directory: Arc<dyn UserDirectory>,
        event_bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            directory,
            event_bus,
            clock,
            config: Arc::new(config),
            locks: TicketLocks::new(),
        }
    }

    /// Per-ticket lock registry.
    #[must_use]
    pub const fn locks(&self) -> &TicketLocks {
        &self.locks
    }

    pub(crate) async fn load_ticket(&self, id: TicketId) -> Result<Ticket, WorkflowError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(WorkflowError::TicketNotFound(id))
    }

    pub(crate) async fn resolve_user(&self, id: &UserId) -> Result<User, WorkflowError> {
        self.directory
            .get_user_by_id(id)
            .await?
            .ok_or_else(|| WorkflowError::UserNotFound(id.clone()))
    }

    /// Publishes events in order. Failures are logged and counted, never returned.
    pub(crate) async fn publish(&self, events: Vec<TicketEvent>) {
        let topic = self.config.event_topic.as_str();
        for event in events {
            let event_id = uuid::Uuid::new_v4().to_string();
            let serialized = match SerializedEvent::from_event(&event, Some(event.metadata(&event_id))) {
                Ok(serialized) => serialized,
                Err(e) => {
                    tracing::error!(ticket_id = %event.ticket_id(), error = %e, "Failed to serialize ticket event");
                    EventBusMetrics::record_publish_error();
                    continue;
                }
            };

            match self.event_bus.publish(topic, &serialized).await {
                Ok(()) => {
                    tracing::debug!(
                        ticket_id = %event.ticket_id(),
                        event_type = %serialized.event_type,
                        event_id = %event_id,
                        "Published ticket event"
                    );
                    EventBusMetrics::record_publish();
                }
                Err(e) => {
                    tracing::warn!(
                        ticket_id = %event.ticket_id(),
                        event_type = %serialized.event_type,
                        error = %e,
                        "Failed to publish ticket event"
                    );
                    EventBusMetrics::record_publish_error();
                }
            }
        }
    }
}

/// Turns a policy denial into an `Unauthorized` error.
pub(crate) fn ensure_allowed(
    user: &User,
    ticket: Option<&Ticket>,
    action: TicketAction,
) -> Result<(), WorkflowError> {
    let relationship = ticket.map_or_else(Relationship::none, |t| Relationship::between(&user.id, t));
    match authorize(user.role, relationship, action) {
        Decision::Allow => Ok(()),
        Decision::Deny(reason) => {
            tracing::debug!(user = %user.id, %action, reason, "Action denied");
            Err(WorkflowError::Unauthorized {
                actor: user.id.clone(),
                action,
                reason,
            })
        }
    }
}
