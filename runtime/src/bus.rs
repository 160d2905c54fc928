//! In-process [`EventBus`] backed by tokio broadcast channels.
//!
//! One channel per topic, created on first use. Publishing never waits for
//! subscribers and succeeds when nobody is listening. A subscriber that falls
//! more than the channel capacity behind receives an
//! [`EventBusError::Lagged`] item and then resumes with the newest events.

use dashmap::DashMap;
use futures::StreamExt;
use futures::stream::select_all;
use helpdesk_core::event::SerializedEvent;
use helpdesk_core::event_bus::{EventBus, EventBusError, EventStream};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::broadcast;

/// Fan-out bus for a single process.
#[derive(Debug)]
pub struct InProcessEventBus {
    topics: DashMap<String, broadcast::Sender<SerializedEvent>>,
    capacity: usize,
}

impl InProcessEventBus {
    /// Creates a bus whose topics buffer `capacity` events each.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Number of live subscribers on `topic`.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map_or(0, |sender| sender.receiver_count())
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<SerializedEvent> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

fn validate_topic(topic: &str) -> Result<(), EventBusError> {
    if topic.trim().is_empty() {
        Err(EventBusError::InvalidTopic(topic.to_string()))
    } else {
        Ok(())
    }
}

impl EventBus for InProcessEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &SerializedEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let event = event.clone();
        Box::pin(async move {
            validate_topic(&topic)?;
            // Err only means there are no subscribers right now.
            let _ = self.sender(&topic).send(event);
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();
        Box::pin(async move {
            if topics.is_empty() {
                return Err(EventBusError::SubscriptionFailed {
                    topics: Vec::new(),
                    reason: "no topics given".to_string(),
                });
            }

            let mut streams = Vec::with_capacity(topics.len());
            for topic in topics {
                validate_topic(&topic)?;
                let mut rx = self.sender(&topic).subscribe();
                let stream = async_stream::stream! {
                    loop {
                        match rx.recv().await {
                            Ok(event) => {
                                yield Ok(event);
                            }
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                tracing::warn!(topic = %topic, skipped, "Subscriber lagged behind");
                                yield Err(EventBusError::Lagged { topic: topic.clone(), skipped });
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                };
                streams.push(stream.boxed());
            }

            Ok(select_all(streams).boxed())
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    fn event(event_type: &str) -> SerializedEvent {
        SerializedEvent::new(event_type.to_string(), vec![1, 2, 3], None)
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let bus = InProcessEventBus::new(8);
        assert!(bus.publish("ticket-events", &event("TicketCreated.v1")).await.is_ok());
        assert_eq!(bus.subscriber_count("ticket-events"), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_events_from_all_its_topics() {
        let bus = InProcessEventBus::new(8);
        let mut stream = bus
            .subscribe(&["ticket-events", "audit"])
            .await
            .expect("subscribe");

        bus.publish("ticket-events", &event("TicketCreated.v1")).await.expect("publish");
        bus.publish("audit", &event("AuditEntry.v1")).await.expect("publish");
        bus.publish("elsewhere", &event("Ignored.v1")).await.expect("publish");

        let mut received = vec![
            stream.next().await.expect("item").expect("event").event_type,
            stream.next().await.expect("item").expect("event").event_type,
        ];
        received.sort();
        assert_eq!(received, ["AuditEntry.v1", "TicketCreated.v1"]);
    }

    #[tokio::test]
    async fn slow_subscriber_sees_lag() {
        let bus = InProcessEventBus::new(2);
        let mut stream = bus.subscribe(&["ticket-events"]).await.expect("subscribe");

        for _ in 0..5 {
            bus.publish("ticket-events", &event("TicketCreated.v1")).await.expect("publish");
        }

        let first = stream.next().await.expect("item");
        assert!(matches!(first, Err(EventBusError::Lagged { skipped: 3, .. })));
        assert!(stream.next().await.expect("item").is_ok());
    }

    #[tokio::test]
    async fn blank_topics_are_rejected() {
        let bus = InProcessEventBus::default();
        assert!(matches!(
            bus.publish(" ", &event("TicketCreated.v1")).await,
            Err(EventBusError::InvalidTopic(_))
        ));
        assert!(bus.subscribe(&[]).await.is_err());
    }
}
