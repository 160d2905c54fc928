//! # Helpdesk Core
//!
//! Domain model and decision logic for the support-ticket workflow engine.
//!
//! Everything in this crate is pure: no I/O, no runtime, no locks. The runtime
//! crate composes these pieces with the store, directory and event bus ports.
//!
//! ## Contents
//!
//! - [`types`]: tickets, ids, enumerations, updates, statistics
//! - [`user`]: directory users, roles, account status
//! - [`transition`]: the status transition table
//! - [`policy`]: role and relationship based authorization
//! - [`validation`]: input rules for tickets, messages and attachments
//! - [`sla`]: priority SLA thresholds and age checks
//! - [`event`], [`event_bus`]: domain events and their transport
//! - [`store`], [`directory`]: storage and identity ports
//! - [`error`]: the engine's error type
//!
//! ## Example
//!
//! ```
//! use helpdesk_core::transition::is_valid_transition;
//! use helpdesk_core::types::TicketStatus;
//!
//! assert!(is_valid_transition(TicketStatus::Open, TicketStatus::InProgress));
//! assert!(!is_valid_transition(TicketStatus::Closed, TicketStatus::Open));
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod directory;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod policy;
pub mod sla;
pub mod store;
pub mod transition;
pub mod types;
pub mod user;
pub mod validation;

pub use error::WorkflowError;

/// Environment module - injected dependencies that are not ports of their own.
pub mod environment {
    use chrono::{DateTime, Utc};
    use std::future::Future;
    use std::pin::Pin;

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use helpdesk_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let first = clock.now();
    /// assert!(clock.now() >= first);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    /// Source of periodic wake-ups for background loops.
    ///
    /// Production code ticks on a timer; tests tick by hand so SLA timing can be
    /// exercised without waiting on the wall clock.
    pub trait Ticker: Send {
        /// Resolves at the next tick.
        fn tick(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
    }
}
