//! Ticket domain types.
//!
//! Identifiers are newtypes so a ticket id can never be passed where a message id
//! is expected. Enumerations serialize in `SCREAMING_SNAKE_CASE` and round-trip
//! through [`FromStr`] using the same spelling.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a ticket, assigned by the ticket store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TicketId(u64);

impl TicketId {
    /// Wraps a raw store id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric id.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a message within a ticket's conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(u64);

impl MessageId {
    /// Wraps a raw store id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric id.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an attachment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttachmentId(u64);

impl AttachmentId {
    /// Wraps a raw store id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric id.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identity of a user as issued by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Creates a user id from any string-like value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Who performed a mutation: a directory user or the engine itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    /// Automated action (auto-assignment, escalation).
    System,
    /// A human acting through the API layer.
    User(UserId),
}

impl Actor {
    /// Returns the user id, or `None` for system actions.
    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::System => None,
            Self::User(id) => Some(id),
        }
    }

    /// Returns true for automated actions.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str("system"),
            Self::User(id) => write!(f, "{id}"),
        }
    }
}

impl From<UserId> for Actor {
    fn from(id: UserId) -> Self {
        Self::User(id)
    }
}

// ============================================================================
// Enumerations
// ============================================================================

/// Error returned when parsing an enumeration from its wire name fails.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind} '{value}'")]
pub struct ParseEnumError {
    /// Name of the enumeration being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[ $( Self::$variant ),+ ];

            /// Wire name of the variant.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $wire ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_uppercase().as_str() {
                    $( $wire => Ok(Self::$variant), )+
                    _ => Err(ParseEnumError { kind: $kind, value: s.to_string() }),
                }
            }
        }
    };
}

wire_enum! {
    /// Lifecycle status of a ticket.
    TicketStatus, "ticket status" {
        /// Newly submitted, nobody working on it.
        Open => "OPEN",
        /// Routed to a team or user, work not started.
        Assigned => "ASSIGNED",
        /// An assignee is actively working on it.
        InProgress => "IN_PROGRESS",
        /// A fix or answer was delivered.
        Resolved => "RESOLVED",
        /// Finished. Can only move back to `Reopened`.
        Closed => "CLOSED",
        /// Closed and then reopened.
        Reopened => "REOPENED",
    }
}

impl TicketStatus {
    /// Statuses that count toward a user's workload.
    pub const ACTIVE: &'static [Self] = &[Self::Assigned, Self::InProgress];

    /// Statuses that count as completed work.
    pub const COMPLETED: &'static [Self] = &[Self::Resolved, Self::Closed];

    /// True for `Assigned` and `InProgress`.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress)
    }

    /// True for `Resolved` and `Closed`.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

wire_enum! {
    /// Kind of request a ticket represents.
    TicketType, "ticket type" {
        /// Defect report.
        Bug => "BUG",
        /// Request for new functionality.
        FeatureRequest => "FEATURE_REQUEST",
        /// Production incident.
        Incident => "INCIDENT",
        /// General help request.
        Assistance => "ASSISTANCE",
    }
}

wire_enum! {
    /// Urgency of a ticket. Drives the escalation SLA.
    Priority, "priority" {
        /// 72 hour SLA.
        Low => "LOW",
        /// 48 hour SLA.
        Medium => "MEDIUM",
        /// 24 hour SLA.
        High => "HIGH",
        /// 4 hour SLA.
        Critical => "CRITICAL",
    }
}

wire_enum! {
    /// Team a ticket can be routed to.
    Team, "team" {
        /// First-line support.
        Support => "SUPPORT",
        /// Engineering.
        Development => "DEVELOPMENT",
    }
}

// ============================================================================
// Ticket
// ============================================================================

/// A message in a ticket's conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Store-assigned id.
    pub id: MessageId,
    /// User who wrote the message.
    pub author: UserId,
    /// Trimmed message body.
    pub content: String,
    /// Store-assigned creation time.
    pub created_at: DateTime<Utc>,
}

/// Metadata for a file attached to a ticket. The file itself lives elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Store-assigned id.
    pub id: AttachmentId,
    /// Original file name.
    pub filename: String,
    /// Location of the stored file.
    pub file_url: String,
    /// User who uploaded the file.
    pub uploaded_by: UserId,
    /// Store-assigned upload time.
    pub uploaded_at: DateTime<Utc>,
}

/// A support ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    /// Store-assigned id, immutable.
    pub id: TicketId,
    /// Short summary, 3 to 255 characters.
    pub title: String,
    /// Free-form details, at most 5000 characters.
    pub description: String,
    /// Current lifecycle status.
    pub status: TicketStatus,
    /// Kind of request.
    pub ticket_type: TicketType,
    /// Urgency.
    pub priority: Priority,
    /// Submitter.
    pub created_by: UserId,
    /// Current assignee, if any.
    pub assigned_user: Option<UserId>,
    /// Team the ticket is routed to, if any.
    pub assigned_team: Option<Team>,
    /// Conversation, oldest first.
    pub messages: Vec<Message>,
    /// Attached file metadata.
    pub attachments: Vec<Attachment>,
    /// Set by the store on insert.
    pub created_at: DateTime<Utc>,
    /// Set by the store on every save.
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    /// True if `user` is the current assignee.
    #[must_use]
    pub fn is_assigned_to(&self, user: &UserId) -> bool {
        self.assigned_user.as_ref() == Some(user)
    }

    /// True if `user` submitted the ticket.
    #[must_use]
    pub fn is_created_by(&self, user: &UserId) -> bool {
        &self.created_by == user
    }

    /// Time elapsed since creation.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    /// Looks up a message by id.
    #[must_use]
    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }
}

/// A validated ticket ready to be inserted. The store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    /// Trimmed title.
    pub title: String,
    /// Trimmed description.
    pub description: String,
    /// Kind of request.
    pub ticket_type: TicketType,
    /// Urgency.
    pub priority: Priority,
    /// Submitter.
    pub created_by: UserId,
}

/// Caller-supplied fields for a new ticket, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDraft {
    /// Requested title.
    pub title: String,
    /// Requested description.
    #[serde(default)]
    pub description: String,
    /// Kind of request.
    pub ticket_type: TicketType,
    /// Urgency.
    pub priority: Priority,
}

impl TicketDraft {
    /// Creates a draft with an empty description.
    #[must_use]
    pub fn new(title: impl Into<String>, ticket_type: TicketType, priority: Priority) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            ticket_type,
            priority,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A new message for the store to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    /// Author of the message.
    pub author: UserId,
    /// Trimmed, validated content.
    pub content: String,
}

/// A new attachment record for the store to append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttachment {
    /// Original file name.
    pub filename: String,
    /// Location of the stored file.
    pub file_url: String,
    /// Uploader.
    pub uploaded_by: UserId,
}

/// Partial update of a ticket. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketUpdate {
    /// New title. An empty or blank string is treated as absent.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Requested status.
    pub status: Option<TicketStatus>,
    /// New priority.
    pub priority: Option<Priority>,
    /// New team routing.
    pub assigned_team: Option<Team>,
    /// New assignee.
    pub assigned_user: Option<UserId>,
}

impl TicketUpdate {
    /// An update that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Requests a status change.
    #[must_use]
    pub const fn status(mut self, status: TicketStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Routes the ticket to a team.
    #[must_use]
    pub const fn team(mut self, team: Team) -> Self {
        self.assigned_team = Some(team);
        self
    }

    /// Assigns the ticket to a user.
    #[must_use]
    pub fn assignee(mut self, user: UserId) -> Self {
        self.assigned_user = Some(user);
        self
    }

    /// Title with blank values folded to `None`.
    #[must_use]
    pub fn effective_title(&self) -> Option<&str> {
        self.title.as_deref().filter(|t| !t.trim().is_empty())
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Aggregate counts over the ticket store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStatistics {
    /// Total number of tickets.
    pub total: usize,
    /// Count per status. Missing keys mean zero.
    pub by_status: BTreeMap<TicketStatus, usize>,
    /// Count per priority.
    pub by_priority: BTreeMap<Priority, usize>,
    /// Count per team, unrouted tickets excluded.
    pub by_team: BTreeMap<Team, usize>,
    /// Tickets with no assignee.
    pub unassigned: usize,
    /// Tickets created in the trailing 24 hours.
    pub created_last_day: usize,
    /// Tickets currently resolved and touched in the trailing 24 hours.
    pub resolved_last_day: usize,
    /// Tickets currently closed and touched in the trailing 24 hours.
    pub closed_last_day: usize,
}

impl TicketStatistics {
    /// Folds a set of tickets into statistics as of `now`.
    pub fn from_tickets<'a>(tickets: impl IntoIterator<Item = &'a Ticket>, now: DateTime<Utc>) -> Self {
        let day_ago = now - Duration::hours(24);
        let mut stats = Self::default();

        for ticket in tickets {
            stats.total += 1;
            *stats.by_status.entry(ticket.status).or_default() += 1;
            *stats.by_priority.entry(ticket.priority).or_default() += 1;
            if let Some(team) = ticket.assigned_team {
                *stats.by_team.entry(team).or_default() += 1;
            }
            if ticket.assigned_user.is_none() {
                stats.unassigned += 1;
            }
            if ticket.created_at >= day_ago {
                stats.created_last_day += 1;
            }
            if ticket.updated_at >= day_ago {
                match ticket.status {
                    TicketStatus::Resolved => stats.resolved_last_day += 1,
                    TicketStatus::Closed => stats.closed_last_day += 1,
                    _ => {}
                }
            }
        }

        stats
    }

    /// Number of tickets in `status`.
    #[must_use]
    pub fn count(&self, status: TicketStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    /// Tickets that are neither resolved nor closed.
    #[must_use]
    pub fn active(&self) -> usize {
        self.count(TicketStatus::Open)
            + self.count(TicketStatus::Assigned)
            + self.count(TicketStatus::InProgress)
            + self.count(TicketStatus::Reopened)
    }

    /// Closed tickets as a percentage of all tickets.
    #[must_use]
    pub fn completion_rate(&self) -> f64 {
        percentage(self.count(TicketStatus::Closed), self.total)
    }

    /// Resolved or closed tickets as a percentage of all tickets.
    #[must_use]
    pub fn resolution_rate(&self) -> f64 {
        percentage(
            self.count(TicketStatus::Resolved) + self.count(TicketStatus::Closed),
            self.total,
        )
    }
}

/// Per-user workload summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadStats {
    /// The user.
    pub user_id: UserId,
    /// Tickets in `Assigned` or `InProgress`.
    pub active: usize,
    /// Tickets in `Resolved` or `Closed`.
    pub completed: usize,
}

impl WorkloadStats {
    /// Completed tickets as a percentage of all tickets the user holds.
    #[must_use]
    pub fn completion_rate(&self) -> f64 {
        percentage(self.completed, self.active + self.completed)
    }
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}
