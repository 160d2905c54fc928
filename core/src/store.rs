//! Ticket store port.
//!
//! The engine never persists anything itself. It reads and writes tickets through
//! [`TicketStore`], which owns id generation and the `created_at`/`updated_at`
//! timestamps. Any durable implementation (SQL, document store) plugs in here;
//! `helpdesk-testing` ships an in-memory one.

use crate::types::{
    Attachment, Message, MessageId, NewAttachment, NewMessage, NewTicket, Priority, Team, Ticket,
    TicketId, TicketStatistics, TicketStatus, UserId,
};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors surfaced by a ticket store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("ticket store unavailable: {0}")]
    Unavailable(String),

    /// A write referenced a record that does not exist or was changed concurrently.
    #[error("ticket store conflict: {0}")]
    Conflict(String),

    /// Any other failure.
    #[error("ticket store error: {0}")]
    Other(String),
}

/// Boxed future returned by store operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Keyed storage for tickets and their owned collections.
///
/// "Not found" is a value (`None`, `false`), never an error.
pub trait TicketStore: Send + Sync {
    /// Loads a ticket with its messages and attachments.
    fn find_by_id(&self, id: TicketId) -> StoreFuture<'_, Option<Ticket>>;

    /// Inserts a new `OPEN` ticket, assigning its id and timestamps.
    fn insert(&self, ticket: NewTicket) -> StoreFuture<'_, Ticket>;

    /// Replaces an existing ticket and refreshes `updated_at`.
    ///
    /// Returns the stored version. Fails with [`StoreError::Conflict`] when the id is unknown.
    fn save(&self, ticket: Ticket) -> StoreFuture<'_, Ticket>;

    /// Counts tickets assigned to `user` whose status is in `statuses`.
    fn count_by_assignee_and_status(
        &self,
        user: &UserId,
        statuses: &[TicketStatus],
    ) -> StoreFuture<'_, usize>;

    /// Tickets in `status`, oldest first.
    fn find_by_status(&self, status: TicketStatus) -> StoreFuture<'_, Vec<Ticket>>;

    /// Tickets with `priority`, oldest first.
    fn find_by_priority(&self, priority: Priority) -> StoreFuture<'_, Vec<Ticket>>;

    /// Tickets routed to `team`, oldest first.
    fn find_by_team(&self, team: Team) -> StoreFuture<'_, Vec<Ticket>>;

    /// Tickets assigned to `user`, oldest first.
    fn find_by_assignee(&self, user: &UserId) -> StoreFuture<'_, Vec<Ticket>>;

    /// Tickets submitted by `user`, oldest first.
    fn find_by_creator(&self, user: &UserId) -> StoreFuture<'_, Vec<Ticket>>;

    /// Every ticket, oldest first.
    fn find_all(&self) -> StoreFuture<'_, Vec<Ticket>>;

    /// Aggregate counts over all tickets.
    fn statistics(&self) -> StoreFuture<'_, TicketStatistics>;

    /// Appends a message to a ticket's conversation, assigning id and timestamp.
    ///
    /// Returns `None` when the ticket does not exist.
    fn add_message(&self, ticket: TicketId, message: NewMessage) -> StoreFuture<'_, Option<Message>>;

    /// Deletes a message. Returns whether it existed.
    fn remove_message(&self, ticket: TicketId, message: MessageId) -> StoreFuture<'_, bool>;

    /// Records attachment metadata on a ticket.
    ///
    /// Returns `None` when the ticket does not exist.
    fn add_attachment(
        &self,
        ticket: TicketId,
        attachment: NewAttachment,
    ) -> StoreFuture<'_, Option<Attachment>>;
}
