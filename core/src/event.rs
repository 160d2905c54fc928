//! Domain events emitted by the ticket engine.
//!
//! Events are immutable facts about something that already happened to a ticket.
//! The engine publishes them fire-and-forget: nothing in the engine waits for or
//! depends on their consumption.
//!
//! # Wire format
//!
//! Events are encoded with `bincode` into a [`SerializedEvent`]. The `event_type`
//! string carries a version suffix so consumers can route and evolve schemas:
//!
//! - `"TicketCreated.v1"`
//! - `"TicketStatusChanged.v1"`
//! - `"TicketAssigned.v1"`
//! - `"TicketTeamAssigned.v1"`
//!
//! # Example
//!
//! ```
//! use helpdesk_core::event::{Event, SerializedEvent, TicketEvent};
//! use helpdesk_core::types::{Actor, TicketId, TicketStatus};
//! use chrono::Utc;
//!
//! let event = TicketEvent::StatusChanged {
//!     ticket_id: TicketId::new(7),
//!     from: TicketStatus::Open,
//!     to: TicketStatus::Closed,
//!     changed_by: Actor::System,
//!     occurred_at: Utc::now(),
//! };
//!
//! let serialized = SerializedEvent::from_event(&event, None).unwrap();
//! assert_eq!(serialized.event_type, "TicketStatusChanged.v1");
//! ```

use crate::types::{Actor, Priority, Team, TicketId, TicketStatus, TicketType, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;

/// Error types for event operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to serialize event to bytes.
    #[error("Failed to serialize event: {0}")]
    SerializationError(String),

    /// Failed to deserialize event from bytes.
    #[error("Failed to deserialize event: {0}")]
    DeserializationError(String),

    /// Unknown event type encountered during deserialization.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
}

/// An event that can be published on the event bus.
///
/// `event_type()` must return a stable identifier with a version suffix.
/// Serialization defaults to `bincode` for any `Serialize + DeserializeOwned` type.
pub trait Event: Send + Sync + 'static {
    /// Returns the versioned event type identifier.
    fn event_type(&self) -> &'static str;

    /// Serialize this event to bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    fn to_bytes(&self) -> Result<Vec<u8>, EventError>
    where
        Self: Serialize,
    {
        bincode::serialize(self).map_err(|e| EventError::SerializationError(e.to_string()))
    }

    /// Deserialize an event from bincode bytes.
    ///
    /// # Errors
    ///
    /// Returns `EventError::DeserializationError` if the bytes are corrupted or
    /// belong to a different schema.
    fn from_bytes(bytes: &[u8]) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        bincode::deserialize(bytes).map_err(|e| EventError::DeserializationError(e.to_string()))
    }
}

/// Something that happened to a ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketEvent {
    /// A ticket was submitted.
    Created {
        /// The new ticket.
        ticket_id: TicketId,
        /// Trimmed title.
        title: String,
        /// Trimmed description.
        description: String,
        /// Kind of request.
        ticket_type: TicketType,
        /// Urgency.
        priority: Priority,
        /// Submitter.
        created_by: UserId,
        /// When the ticket was stored.
        occurred_at: DateTime<Utc>,
    },

    /// A ticket moved between statuses.
    StatusChanged {
        /// The ticket.
        ticket_id: TicketId,
        /// Status before the change.
        from: TicketStatus,
        /// Status after the change.
        to: TicketStatus,
        /// Who made the change.
        changed_by: Actor,
        /// When it happened.
        occurred_at: DateTime<Utc>,
    },

    /// A ticket got a new assignee.
    Assigned {
        /// The ticket.
        ticket_id: TicketId,
        /// Assignee before the change.
        previous_assignee: Option<UserId>,
        /// Assignee after the change.
        assignee: UserId,
        /// Who made the change.
        assigned_by: Actor,
        /// When it happened.
        occurred_at: DateTime<Utc>,
    },

    /// A ticket was routed to a team.
    TeamAssigned {
        /// The ticket.
        ticket_id: TicketId,
        /// Team before the change.
        previous_team: Option<Team>,
        /// Team after the change.
        team: Team,
        /// Who made the change.
        assigned_by: Actor,
        /// When it happened.
        occurred_at: DateTime<Utc>,
    },
}

impl TicketEvent {
    /// Ticket the event is about.
    #[must_use]
    pub const fn ticket_id(&self) -> TicketId {
        match self {
            Self::Created { ticket_id, .. }
            | Self::StatusChanged { ticket_id, .. }
            | Self::Assigned { ticket_id, .. }
            | Self::TeamAssigned { ticket_id, .. } => *ticket_id,
        }
    }

    /// When the event happened.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::Created { occurred_at, .. }
            | Self::StatusChanged { occurred_at, .. }
            | Self::Assigned { occurred_at, .. }
            | Self::TeamAssigned { occurred_at, .. } => *occurred_at,
        }
    }

    /// Who caused the event.
    #[must_use]
    pub fn actor(&self) -> Actor {
        match self {
            Self::Created { created_by, .. } => Actor::User(created_by.clone()),
            Self::StatusChanged { changed_by, .. } => changed_by.clone(),
            Self::Assigned { assigned_by, .. } | Self::TeamAssigned { assigned_by, .. } => {
                assigned_by.clone()
            }
        }
    }

    /// Metadata attached to the serialized form.
    #[must_use]
    pub fn metadata(&self, event_id: &str) -> serde_json::Value {
        serde_json::json!({
            "event_id": event_id,
            "ticket_id": self.ticket_id().value(),
            "actor": self.actor().to_string(),
            "occurred_at": self.occurred_at().to_rfc3339(),
        })
    }
}

impl Event for TicketEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created { .. } => "TicketCreated.v1",
            Self::StatusChanged { .. } => "TicketStatusChanged.v1",
            Self::Assigned { .. } => "TicketAssigned.v1",
            Self::TeamAssigned { .. } => "TicketTeamAssigned.v1",
        }
    }
}

/// A serialized event ready for the event bus.
#[derive(Clone, Debug)]
pub struct SerializedEvent {
    /// The event type identifier (e.g., `"TicketCreated.v1"`).
    pub event_type: String,

    /// The bincode-serialized event data.
    pub data: Vec<u8>,

    /// Optional JSON metadata.
    ///
    /// Ticket events carry `event_id`, `ticket_id`, `actor` and `occurred_at`.
    pub metadata: Option<serde_json::Value>,
}

impl SerializedEvent {
    /// Create a new serialized event.
    #[must_use]
    pub const fn new(
        event_type: String,
        data: Vec<u8>,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            event_type,
            data,
            metadata,
        }
    }

    /// Create a serialized event from an [`Event`].
    ///
    /// # Errors
    ///
    /// Returns `EventError::SerializationError` if the event cannot be serialized.
    pub fn from_event<E: Event + Serialize>(
        event: &E,
        metadata: Option<serde_json::Value>,
    ) -> Result<Self, EventError> {
        Ok(Self {
            event_type: event.event_type().to_string(),
            data: event.to_bytes()?,
            metadata,
        })
    }

    /// Decodes the payload as a [`TicketEvent`].
    ///
    /// # Errors
    ///
    /// Returns `EventError::UnknownEventType` if the type is not a ticket event,
    /// or `EventError::DeserializationError` if the payload is corrupted.
    pub fn decode_ticket_event(&self) -> Result<TicketEvent, EventError> {
        if !self.event_type.starts_with("Ticket") {
            return Err(EventError::UnknownEventType(self.event_type.clone()));
        }
        TicketEvent::from_bytes(&self.data)
    }
}

impl fmt::Display for SerializedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SerializedEvent {{ type: {}, size: {} bytes }}",
            self.event_type,
            self.data.len()
        )
    }
}
