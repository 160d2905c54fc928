//! Event bus abstraction for outbound ticket events.
//!
//! The engine writes every [`TicketEvent`](crate::event::TicketEvent) to a topic
//! (`ticket-events` by default). Notification delivery, audit logging and read
//! models subscribe to that topic; the engine itself never reads from it.
//!
//! ```text
//! ┌──────────────────┐      publish       ┌───────────┐      subscribe      ┌──────────────┐
//! │ Workflow Service │ ─────────────────► │ Event Bus │ ──────────────────► │ Notification │
//! └──────────────────┘  (fire-and-forget) └───────────┘   (at-least-once)   │    layer     │
//!                                                                            └──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use futures::StreamExt;
//!
//! let mut stream = event_bus.subscribe(&["ticket-events"]).await?;
//! while let Some(result) = stream.next().await {
//!     match result {
//!         Ok(event) => println!("Received: {}", event.event_type),
//!         Err(e) => eprintln!("Error: {e}"),
//!     }
//! }
//! ```

use crate::event::SerializedEvent;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Failed to publish an event to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// A slow subscriber fell behind and missed events
    #[error("Subscriber on topic '{topic}' lagged and skipped {skipped} events")]
    Lagged {
        /// The topic
        topic: String,
        /// Number of events dropped for this subscriber
        skipped: u64,
    },

    /// Topic not found or invalid
    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    /// Generic error for other failures
    #[error("Event bus error: {0}")]
    Other(String),
}

/// Stream of events from subscriptions.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<SerializedEvent, EventBusError>> + Send>>;

/// Publish/subscribe transport for serialized events.
///
/// Delivery is at-least-once; subscribers must tolerate duplicates. Implementations
/// must be `Send + Sync` so one bus can be shared by the workflow service and the
/// escalation scheduler.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so it can be used as `Arc<dyn EventBus>`.
pub trait EventBus: Send + Sync {
    /// Publish an event to a topic.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the publish operation fails.
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a merged stream of events.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}
