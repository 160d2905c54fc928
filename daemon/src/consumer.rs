//! Event bus consumer with automatic resubscription.
//!
//! ```text
//! loop {
//!     subscribe:
//!         loop {
//!             next event => handle, log errors
//!             shutdown   => stop
//!         }
//!         stream ended or subscribe failed => wait, retry
//! }
//! ```

use futures::StreamExt;
use helpdesk_core::event::{EventError, SerializedEvent};
use helpdesk_core::event_bus::{EventBus, EventStream};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Processes one event from the bus.
///
/// Errors are logged by [`EventConsumer`] and never stop it.
pub trait EventHandler: Send + Sync {
    /// Handle `event`.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be processed.
    fn handle<'a>(
        &'a self,
        event: &'a SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventError>> + Send + 'a>>;
}

/// Writes every ticket event to the log.
#[derive(Debug, Default)]
pub struct TicketEventLogger {
    handled: AtomicUsize,
}

impl TicketEventLogger {
    /// A logger with a zeroed counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events decoded and logged so far.
    #[must_use]
    pub fn handled(&self) -> usize {
        self.handled.load(Ordering::SeqCst)
    }
}

impl EventHandler for TicketEventLogger {
    fn handle<'a>(
        &'a self,
        event: &'a SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventError>> + Send + 'a>> {
        Box::pin(async move {
            let decoded = event.decode_ticket_event()?;
            info!(
                event_type = %event.event_type,
                ticket_id = %decoded.ticket_id(),
                actor = %decoded.actor(),
                occurred_at = %decoded.occurred_at(),
                "Ticket event"
            );
            self.handled.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

/// Background task feeding events from the bus to a handler.
///
/// # Lifecycle
///
/// 1. Created via `new()`
/// 2. Spawned as background task via `spawn()`
/// 3. Runs until the shutdown channel fires or closes
pub struct EventConsumer {
    name: String,
    topics: Vec<String>,
    event_bus: Arc<dyn EventBus>,
    handler: Arc<dyn EventHandler>,
    shutdown: broadcast::Receiver<()>,
    retry_delay: Duration,
}

impl EventConsumer {
    /// Create a consumer with a 5 second retry delay.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        topics: Vec<String>,
        event_bus: Arc<dyn EventBus>,
        handler: Arc<dyn EventHandler>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            name: name.into(),
            topics,
            event_bus,
            handler,
            shutdown,
            retry_delay: Duration::from_secs(5),
        }
    }

    /// Set custom retry delay.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Spawn the consumer as a background task.
    #[must_use]
    pub fn spawn(mut self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&mut self) {
        info!(consumer = %self.name, "Event consumer started");

        loop {
            let topics: Vec<&str> = self.topics.iter().map(String::as_str).collect();

            let delay = tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Event consumer received shutdown signal");
                    break;
                }
                subscribe_result = self.event_bus.subscribe(&topics) => {
                    match subscribe_result {
                        Ok(mut stream) => {
                            info!(consumer = %self.name, topics = ?self.topics, "Subscribed to event bus");
                            if self.process_stream(&mut stream).await {
                                break;
                            }
                            warn!(consumer = %self.name, retry_in = ?self.retry_delay, "Event stream ended, resubscribing");
                        }
                        Err(e) => {
                            error!(
                                consumer = %self.name,
                                error = %e,
                                retry_in = ?self.retry_delay,
                                "Failed to subscribe to event bus"
                            );
                        }
                    }
                    self.retry_delay
                }
            };

            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Event consumer received shutdown signal");
                    break;
                }
                () = tokio::time::sleep(delay) => {}
            }
        }

        info!(consumer = %self.name, "Event consumer stopped");
    }

    /// Feeds events to the handler until the stream ends or shutdown.
    ///
    /// Returns true on shutdown.
    async fn process_stream(&mut self, stream: &mut EventStream) -> bool {
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    info!(consumer = %self.name, "Event consumer received shutdown signal during processing");
                    return true;
                }
                next = stream.next() => match next {
                    Some(Ok(event)) => {
                        if let Err(e) = self.handler.handle(&event).await {
                            error!(
                                consumer = %self.name,
                                event_type = %event.event_type,
                                error = %e,
                                "Failed to handle event"
                            );
                        }
                    }
                    Some(Err(e)) => {
                        error!(consumer = %self.name, error = %e, "Error receiving event from stream");
                    }
                    None => {
                        warn!(consumer = %self.name, "Event stream ended");
                        return false;
                    }
                }
            }
        }
    }
}
