//! Shared harness for runtime integration tests.

#![allow(dead_code)]

use chrono::Duration;
use helpdesk_core::environment::Clock;
use helpdesk_core::types::{Priority, Ticket, TicketDraft, TicketType, UserId};
use helpdesk_core::user::User;
use helpdesk_runtime::{EngineConfig, HelpdeskEngine, TicketWorkflow, WorkflowEnvironment};
use helpdesk_testing::mocks::{ManualClock, test_time};
use helpdesk_testing::{InMemoryTicketStore, InMemoryUserDirectory, RecordingEventBus, draft_ticket};
use std::sync::Arc;

/// In-memory ports plus every service wired over them.
pub struct Harness {
    pub store: Arc<InMemoryTicketStore>,
    pub directory: Arc<InMemoryUserDirectory>,
    pub bus: Arc<RecordingEventBus>,
    pub clock: Arc<ManualClock>,
    pub env: WorkflowEnvironment,
    pub engine: HelpdeskEngine,
}

impl Harness {
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        Self::with_config(users, EngineConfig::default())
    }

    pub fn with_config(users: impl IntoIterator<Item = User>, config: EngineConfig) -> Self {
        let clock = Arc::new(ManualClock::new(test_time()));
        let store = Arc::new(InMemoryTicketStore::with_clock(
            Arc::clone(&clock) as Arc<dyn Clock>
        ));
        let directory = Arc::new(InMemoryUserDirectory::with_users(users));
        let bus = Arc::new(RecordingEventBus::new());
        let env = WorkflowEnvironment::new(
            Arc::clone(&store) as _,
            Arc::clone(&directory) as _,
            Arc::clone(&bus) as _,
            Arc::clone(&clock) as _,
            config,
        );
        let engine = HelpdeskEngine::new(env.clone());
        Self {
            store,
            directory,
            bus,
            clock,
            env,
            engine,
        }
    }

    pub fn workflow(&self) -> &TicketWorkflow {
        self.engine.workflow()
    }

    /// Creates a ticket through the workflow and forgets the events it produced.
    pub async fn open_ticket(&self, creator: &str, ticket_type: TicketType, priority: Priority) -> Ticket {
        let ticket = self
            .workflow()
            .create_ticket(
                TicketDraft::new("Printer on fire", ticket_type, priority),
                &UserId::new(creator),
            )
            .await
            .expect("ticket should be created");
        self.bus.clear();
        ticket
    }

    /// Stores an `OPEN` ticket created `hours_ago` hours before now.
    pub fn aged_ticket(&self, creator: &str, priority: Priority, hours_ago: i64) -> Ticket {
        let ticket_type = if priority == Priority::Low {
            TicketType::Assistance
        } else {
            TicketType::Incident
        };
        self.store.seed(draft_ticket(
            "Aged ticket",
            ticket_type,
            priority,
            creator,
            self.clock.now() - Duration::hours(hours_ago),
        ))
    }

    pub async fn reload(&self, ticket: &Ticket) -> Ticket {
        self.env
            .store
            .find_by_id(ticket.id)
            .await
            .expect("store available")
            .expect("ticket exists")
    }
}

pub fn uid(id: &str) -> UserId {
    UserId::new(id)
}
