//! In-memory [`TicketStore`].

use chrono::{DateTime, Utc};
use helpdesk_core::environment::{Clock, SystemClock};
use helpdesk_core::store::{StoreError, StoreFuture, TicketStore};
use helpdesk_core::types::{
    Attachment, AttachmentId, Message, MessageId, NewAttachment, NewMessage, NewTicket, Priority,
    Team, Ticket, TicketId, TicketStatistics, TicketStatus, TicketType, UserId,
};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct State {
    tickets: BTreeMap<TicketId, Ticket>,
    next_ticket: u64,
    next_message: u64,
    next_attachment: u64,
}

/// `BTreeMap`-backed ticket store for tests and demos.
///
/// Ids start at 1 and increase monotonically. Timestamps come from the injected
/// clock. Failures can be injected per operation:
///
/// - [`set_unavailable`](Self::set_unavailable): every call fails
/// - [`fail_next_saves`](Self::fail_next_saves): the next `n` saves fail
/// - [`fail_ticket`](Self::fail_ticket): reads and writes of one ticket fail
pub struct InMemoryTicketStore {
    state: RwLock<State>,
    clock: Arc<dyn Clock>,
    unavailable: AtomicBool,
    failing_saves: AtomicUsize,
    failing_tickets: Mutex<HashSet<TicketId>>,
    writes: AtomicUsize,
}

impl InMemoryTicketStore {
    /// Creates an empty store stamped by the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamped by `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(State::default()),
            clock,
            unavailable: AtomicBool::new(false),
            failing_saves: AtomicUsize::new(0),
            failing_tickets: Mutex::new(HashSet::new()),
            writes: AtomicUsize::new(0),
        }
    }

    /// Stores a fully formed ticket as-is, keeping its timestamps.
    ///
    /// The id is replaced with the next free one. Useful for seeding old tickets.
    pub fn seed(&self, mut ticket: Ticket) -> Ticket {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.next_ticket += 1;
        ticket.id = TicketId::new(state.next_ticket);
        state.tickets.insert(ticket.id, ticket.clone());
        ticket
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the next `n` calls to `save` fail.
    pub fn fail_next_saves(&self, n: usize) {
        self.failing_saves.store(n, Ordering::SeqCst);
    }

    /// Makes every read or write of `id` fail.
    pub fn fail_ticket(&self, id: TicketId) {
        self.failing_tickets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id);
    }

    /// Number of successful writes (insert, save, message and attachment changes).
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of stored tickets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tickets
            .len()
    }

    /// True when no tickets are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("in-memory store switched off".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_ticket(&self, id: TicketId) -> Result<(), StoreError> {
        let failing = self
            .failing_tickets
            .lock()
            .map_err(|_| StoreError::Other("failure set poisoned".to_string()))?;
        if failing.contains(&id) {
            Err(StoreError::Unavailable(format!("ticket {id} is unreadable")))
        } else {
            Ok(())
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.check_available()?;
        self.state
            .read()
            .map_err(|_| StoreError::Other("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.check_available()?;
        self.state
            .write()
            .map_err(|_| StoreError::Other("store lock poisoned".to_string()))
    }

    fn select(&self, predicate: impl Fn(&Ticket) -> bool) -> Result<Vec<Ticket>, StoreError> {
        let state = self.read()?;
        let mut tickets: Vec<Ticket> = state
            .tickets
            .values()
            .filter(|t| predicate(t))
            .cloned()
            .collect();
        tickets.sort_by_key(|t| (t.created_at, t.id));
        Ok(tickets)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for InMemoryTicketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketStore for InMemoryTicketStore {
    fn find_by_id(&self, id: TicketId) -> StoreFuture<'_, Option<Ticket>> {
        Box::pin(async move {
            self.check_ticket(id)?;
            Ok(self.read()?.tickets.get(&id).cloned())
        })
    }

    fn insert(&self, ticket: NewTicket) -> StoreFuture<'_, Ticket> {
        Box::pin(async move {
            let now = self.clock.now();
            let mut state = self.write()?;
            state.next_ticket += 1;
            let stored = Ticket {
                id: TicketId::new(state.next_ticket),
                title: ticket.title,
                description: ticket.description,
                status: TicketStatus::Open,
                ticket_type: ticket.ticket_type,
                priority: ticket.priority,
                created_by: ticket.created_by,
                assigned_user: None,
                assigned_team: None,
                messages: Vec::new(),
                attachments: Vec::new(),
                created_at: now,
                updated_at: now,
            };
            state.tickets.insert(stored.id, stored.clone());
            drop(state);
            self.record_write();
            Ok(stored)
        })
    }

    fn save(&self, mut ticket: Ticket) -> StoreFuture<'_, Ticket> {
        Box::pin(async move {
            self.check_ticket(ticket.id)?;
            let pending = self.failing_saves.load(Ordering::SeqCst);
            if pending > 0 {
                self.failing_saves.store(pending - 1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("injected save failure".to_string()));
            }

            let now = self.clock.now();
            let mut state = self.write()?;
            let Some(slot) = state.tickets.get_mut(&ticket.id) else {
                return Err(StoreError::Conflict(format!("ticket {} does not exist", ticket.id)));
            };
            ticket.created_at = slot.created_at;
            ticket.updated_at = now;
            *slot = ticket.clone();
            drop(state);
            self.record_write();
            Ok(ticket)
        })
    }

    fn count_by_assignee_and_status(
        &self,
        user: &UserId,
        statuses: &[TicketStatus],
    ) -> StoreFuture<'_, usize> {
        let user = user.clone();
        let statuses = statuses.to_vec();
        Box::pin(async move {
            let state = self.read()?;
            Ok(state
                .tickets
                .values()
                .filter(|t| t.is_assigned_to(&user) && statuses.contains(&t.status))
                .count())
        })
    }

    fn find_by_status(&self, status: TicketStatus) -> StoreFuture<'_, Vec<Ticket>> {
        Box::pin(async move { self.select(|t| t.status == status) })
    }

    fn find_by_priority(&self, priority: Priority) -> StoreFuture<'_, Vec<Ticket>> {
        Box::pin(async move { self.select(|t| t.priority == priority) })
    }

    fn find_by_team(&self, team: Team) -> StoreFuture<'_, Vec<Ticket>> {
        Box::pin(async move { self.select(|t| t.assigned_team == Some(team)) })
    }

    fn find_by_assignee(&self, user: &UserId) -> StoreFuture<'_, Vec<Ticket>> {
        let user = user.clone();
        Box::pin(async move { self.select(|t| t.is_assigned_to(&user)) })
    }

    fn find_by_creator(&self, user: &UserId) -> StoreFuture<'_, Vec<Ticket>> {
        let user = user.clone();
        Box::pin(async move { self.select(|t| t.is_created_by(&user)) })
    }

    fn find_all(&self) -> StoreFuture<'_, Vec<Ticket>> {
        Box::pin(async move { self.select(|_| true) })
    }

    fn statistics(&self) -> StoreFuture<'_, TicketStatistics> {
        Box::pin(async move {
            let now = self.clock.now();
            let state = self.read()?;
            Ok(TicketStatistics::from_tickets(state.tickets.values(), now))
        })
    }

    fn add_message(&self, ticket: TicketId, message: NewMessage) -> StoreFuture<'_, Option<Message>> {
        Box::pin(async move {
            self.check_ticket(ticket)?;
            let now = self.clock.now();
            let mut state = self.write()?;
            state.next_message += 1;
            let id = MessageId::new(state.next_message);
            let Some(stored) = state.tickets.get_mut(&ticket) else {
                return Ok(None);
            };
            let message = Message {
                id,
                author: message.author,
                content: message.content,
                created_at: now,
            };
            stored.messages.push(message.clone());
            drop(state);
            self.record_write();
            Ok(Some(message))
        })
    }

    fn remove_message(&self, ticket: TicketId, message: MessageId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            self.check_ticket(ticket)?;
            let mut state = self.write()?;
            let Some(stored) = state.tickets.get_mut(&ticket) else {
                return Ok(false);
            };
            let before = stored.messages.len();
            stored.messages.retain(|m| m.id != message);
            let removed = stored.messages.len() != before;
            drop(state);
            if removed {
                self.record_write();
            }
            Ok(removed)
        })
    }

    fn add_attachment(
        &self,
        ticket: TicketId,
        attachment: NewAttachment,
    ) -> StoreFuture<'_, Option<Attachment>> {
        Box::pin(async move {
            self.check_ticket(ticket)?;
            let now = self.clock.now();
            let mut state = self.write()?;
            state.next_attachment += 1;
            let id = AttachmentId::new(state.next_attachment);
            let Some(stored) = state.tickets.get_mut(&ticket) else {
                return Ok(None);
            };
            let attachment = Attachment {
                id,
                filename: attachment.filename,
                file_url: attachment.file_url,
                uploaded_by: attachment.uploaded_by,
                uploaded_at: now,
            };
            stored.attachments.push(attachment.clone());
            drop(state);
            self.record_write();
            Ok(Some(attachment))
        })
    }
}

/// Builds an `OPEN` ticket for [`InMemoryTicketStore::seed`].
#[must_use]
pub fn draft_ticket(
    title: &str,
    ticket_type: TicketType,
    priority: Priority,
    created_by: &str,
    created_at: DateTime<Utc>,
) -> Ticket {
    Ticket {
        id: TicketId::new(0),
        title: title.to_string(),
        description: String::new(),
        status: TicketStatus::Open,
        ticket_type,
        priority,
        created_by: UserId::new(created_by),
        assigned_user: None,
        assigned_team: None,
        messages: Vec::new(),
        attachments: Vec::new(),
        created_at,
        updated_at: created_at,
    }
}
