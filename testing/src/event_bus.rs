//! An [`EventBus`] that records every publish.

use futures::StreamExt;
use helpdesk_core::event::{SerializedEvent, TicketEvent};
use helpdesk_core::event_bus::{EventBus, EventBusError, EventStream};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;

/// Keeps a log of published events and forwards them to live subscribers.
///
/// ```
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// use helpdesk_testing::RecordingEventBus;
/// use helpdesk_core::event_bus::EventBus;
/// use helpdesk_core::event::SerializedEvent;
///
/// let bus = RecordingEventBus::new();
/// let event = SerializedEvent::new("TicketCreated.v1".to_string(), vec![], None);
/// bus.publish("ticket-events", &event).await.unwrap();
/// assert_eq!(bus.published().len(), 1);
/// # });
/// ```
pub struct RecordingEventBus {
    log: Mutex<Vec<(String, SerializedEvent)>>,
    live: broadcast::Sender<(String, SerializedEvent)>,
    failing: AtomicBool,
}

impl RecordingEventBus {
    /// An empty bus.
    #[must_use]
    pub fn new() -> Self {
        let (live, _) = broadcast::channel(256);
        Self {
            log: Mutex::new(Vec::new()),
            live,
            failing: AtomicBool::new(false),
        }
    }

    /// Makes every publish fail while set.
    pub fn fail_publishes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything published so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<SerializedEvent> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, event)| event.clone())
            .collect()
    }

    /// Topics of everything published so far, in order.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(topic, _)| topic.clone())
            .collect()
    }

    /// Published ticket events, decoded. Undecodable entries are skipped.
    #[must_use]
    pub fn ticket_events(&self) -> Vec<TicketEvent> {
        self.published()
            .iter()
            .filter_map(|event| event.decode_ticket_event().ok())
            .collect()
    }

    /// Event type names published so far, in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.published()
            .into_iter()
            .map(|event| event.event_type)
            .collect()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl Default for RecordingEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for RecordingEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let event = event.clone();
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                return Err(EventBusError::PublishFailed {
                    topic,
                    reason: "injected publish failure".to_string(),
                });
            }
            self.log
                .lock()
                .map_err(|_| EventBusError::Other("event log poisoned".to_string()))?
                .push((topic.clone(), event.clone()));
            // No live subscribers is fine.
            let _ = self.live.send((topic, event));
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();
        let mut rx = self.live.subscribe();
        Box::pin(async move {
            let stream = async_stream::stream! {
                loop {
                    match rx.recv().await {
                        Ok((topic, event)) if topics.contains(&topic) => {
                            yield Ok(event);
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            yield Err(EventBusError::Lagged { topic: topics.join(","), skipped });
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            };
            Ok(stream.boxed())
        })
    }
}
