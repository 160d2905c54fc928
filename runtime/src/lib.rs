//! # Helpdesk Runtime
//!
//! Services that drive tickets through their lifecycle.
//!
//! This crate composes the pure decision logic of `helpdesk-core` with the
//! store, directory and event bus ports, and adds the concurrency the engine
//! needs: per-ticket locks and the background escalation loop.
//!
//! ## Core Components
//!
//! - **[`TicketWorkflow`]**: create, update, move, close and reopen tickets; messages and attachments
//! - **[`AssignmentEngine`]**: assignee eligibility, workload ceiling, least-loaded selection
//! - **[`EscalationService`]** / **[`EscalationScheduler`]**: SLA sweeps on a timer
//! - **[`TicketQueries`]**: read-side lookups and statistics
//! - **[`InProcessEventBus`]**: broadcast-channel event bus for a single process
//! - **[`metrics`]**: Prometheus recorders
//!
//! ## Example
//!
//! ```ignore
//! use helpdesk_runtime::{EngineConfig, HelpdeskEngine, WorkflowEnvironment};
//!
//! let env = WorkflowEnvironment::new(store, directory, event_bus, clock, EngineConfig::default());
//! let engine = HelpdeskEngine::new(env);
//!
//! let ticket = engine.workflow().create_ticket(draft, &creator).await?;
//! engine.workflow().close_ticket(ticket.id, &creator).await?;
//! ```

pub mod assignment;
pub mod bus;
pub mod config;
pub mod environment;
pub mod escalation;
pub mod locks;
pub mod metrics;
pub mod queries;
pub mod workflow;

pub use assignment::{AssignmentEngine, CapacityWarning};
pub use bus::InProcessEventBus;
pub use config::EngineConfig;
pub use environment::WorkflowEnvironment;
pub use escalation::{
    EscalationOutcome, EscalationScheduler, EscalationService, IntervalTicker, SweepReport,
};
pub use locks::{TicketGuard, TicketLocks};
pub use queries::TicketQueries;
pub use workflow::TicketWorkflow;

use std::sync::Arc;

/// All services built over one environment, so they share its ticket locks.
#[derive(Clone)]
pub struct HelpdeskEngine {
    workflow: TicketWorkflow,
    queries: TicketQueries,
    escalation: Arc<EscalationService>,
}

impl HelpdeskEngine {
    /// Builds every service over `env`.
    #[must_use]
    pub fn new(env: WorkflowEnvironment) -> Self {
        Self {
            workflow: TicketWorkflow::new(env.clone()),
            queries: TicketQueries::new(env.clone()),
            escalation: Arc::new(EscalationService::new(env)),
        }
    }

    /// The workflow service.
    #[must_use]
    pub const fn workflow(&self) -> &TicketWorkflow {
        &self.workflow
    }

    /// The assignment engine.
    #[must_use]
    pub const fn assignment(&self) -> &AssignmentEngine {
        self.workflow.assignment()
    }

    /// The query service.
    #[must_use]
    pub const fn queries(&self) -> &TicketQueries {
        &self.queries
    }

    /// The escalation service, shareable with a scheduler.
    #[must_use]
    pub fn escalation(&self) -> Arc<EscalationService> {
        Arc::clone(&self.escalation)
    }
}
