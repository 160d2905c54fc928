//! # Helpdesk Daemon
//!
//! Wiring for the `helpdesk` binary: environment configuration, the event log
//! consumer, and graceful shutdown of background tasks.

pub mod config;
pub mod consumer;
pub mod lifecycle;

pub use config::Config;
pub use consumer::{EventConsumer, EventHandler, TicketEventLogger};
