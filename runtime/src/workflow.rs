//! Ticket workflow service.
//!
//! Entry point for every user-initiated change to a ticket. Each mutating
//! operation follows the same shape:
//!
//! 1. resolve the acting user
//! 2. take the ticket's lock and load it
//! 3. check state, transition table and policy, validate input
//! 4. save once
//! 5. publish the resulting events
//!
//! Nothing is written unless every check in step 3 passes.

use crate::assignment::AssignmentEngine;
use crate::environment::{WorkflowEnvironment, ensure_allowed};
use crate::metrics::{AssignmentMetrics, TicketMetrics};
use helpdesk_core::WorkflowError;
use helpdesk_core::event::TicketEvent;
use helpdesk_core::policy::TicketAction;
use helpdesk_core::transition::is_valid_transition;
use helpdesk_core::types::{
    Actor, Attachment, Message, MessageId, NewAttachment, NewMessage, NewTicket, Priority, Team,
    Ticket, TicketDraft, TicketId, TicketStatus, TicketType, TicketUpdate, UserId,
};
use helpdesk_core::user::User;
use helpdesk_core::validation::{
    ValidationError, validate_attachment, validate_description, validate_message,
    validate_priority_for_type, validate_title,
};
use tracing::{debug, info, instrument, warn};

/// Counts failures by kind before handing the result back.
fn observe<T>(operation: &'static str, result: Result<T, WorkflowError>) -> Result<T, WorkflowError> {
    if let Err(e) = &result {
        TicketMetrics::record_error(operation, e.kind());
        if e.is_infrastructure() {
            warn!(operation, error = %e, "Workflow operation failed");
        } else {
            debug!(operation, error = %e, "Workflow operation rejected");
        }
    }
    result
}

/// The status an update's assignee or team change implies.
///
/// Mirrors the assignment engine: a new assignee takes the ticket to
/// `IN_PROGRESS`, a new team takes an `OPEN` ticket to `ASSIGNED`. Neither
/// may land on a ticket that is or is becoming `CLOSED`. An explicit status
/// in the same update wins over the implied one.
fn implied_status(
    ticket: &Ticket,
    status_change: Option<TicketStatus>,
    assignee_changed: bool,
    team_changed: bool,
) -> Result<Option<TicketStatus>, WorkflowError> {
    let status = status_change.unwrap_or(ticket.status);
    if assignee_changed && status == TicketStatus::Closed {
        return Err(WorkflowError::InvalidStatusTransition {
            from: status,
            to: TicketStatus::InProgress,
        });
    }
    if team_changed && status == TicketStatus::Closed {
        return Err(WorkflowError::InvalidState {
            ticket_id: ticket.id,
            status,
            reason: "closed tickets cannot be routed to a team",
        });
    }
    if status_change.is_some() {
        return Ok(None);
    }

    let target = if assignee_changed {
        TicketStatus::InProgress
    } else if team_changed && status == TicketStatus::Open {
        TicketStatus::Assigned
    } else {
        return Ok(None);
    };
    if status == target {
        return Ok(None);
    }
    if !is_valid_transition(status, target) {
        return Err(WorkflowError::InvalidStatusTransition { from: status, to: target });
    }
    Ok(Some(target))
}

/// Creates and moves tickets through their lifecycle.
#[derive(Clone)]
pub struct TicketWorkflow {
    env: WorkflowEnvironment,
    assignment: AssignmentEngine,
}

impl TicketWorkflow {
    /// Creates a workflow service over `env`.
    #[must_use]
    pub fn new(env: WorkflowEnvironment) -> Self {
        let assignment = AssignmentEngine::new(env.clone());
        Self { env, assignment }
    }

    /// The assignment engine this service delegates to.
    #[must_use]
    pub const fn assignment(&self) -> &AssignmentEngine {
        &self.assignment
    }

    /// Submits a new ticket.
    ///
    /// The ticket starts `OPEN`, unassigned. A `CRITICAL` `INCIDENT` is then
    /// handed to the least loaded technician when auto-assignment is enabled;
    /// if that fails the ticket stays `OPEN` and creation still succeeds.
    ///
    /// # Errors
    ///
    /// - `Validation` for a bad title, description, or priority/type pair, or an inactive creator
    /// - `UserNotFound` if the creator is unknown
    /// - `Store` / `Directory` on infrastructure failure
    #[instrument(skip_all, fields(creator = %creator_id))]
    pub async fn create_ticket(
        &self,
        draft: TicketDraft,
        creator_id: &UserId,
    ) -> Result<Ticket, WorkflowError> {
        observe("create_ticket", self.create(draft, creator_id).await)
    }

    async fn create(&self, draft: TicketDraft, creator_id: &UserId) -> Result<Ticket, WorkflowError> {
        let title = validate_title(&draft.title)?;
        let description = validate_description(&draft.description)?;
        validate_priority_for_type(draft.priority, draft.ticket_type)?;

        let creator = self.env.resolve_user(creator_id).await?;
        if !creator.is_active() {
            return Err(ValidationError::InactiveCreator(creator.id).into());
        }

        let ticket = self
            .env
            .store
            .insert(NewTicket {
                title,
                description,
                ticket_type: draft.ticket_type,
                priority: draft.priority,
                created_by: creator.id,
            })
            .await?;

        TicketMetrics::record_created(ticket.priority, ticket.ticket_type);
        self.env
            .publish(vec![TicketEvent::Created {
                ticket_id: ticket.id,
                title: ticket.title.clone(),
                description: ticket.description.clone(),
                ticket_type: ticket.ticket_type,
                priority: ticket.priority,
                created_by: ticket.created_by.clone(),
                occurred_at: ticket.created_at,
            }])
            .await;
        info!(ticket_id = %ticket.id, priority = %ticket.priority, "Ticket created");

        if self.should_auto_assign(&ticket) {
            match self.assignment.auto_assign(ticket.id).await {
                Ok(Some(assigned)) => return Ok(assigned),
                Ok(None) => {
                    warn!(ticket_id = %ticket.id, "No technician available for critical incident");
                }
                Err(e) => {
                    warn!(ticket_id = %ticket.id, error = %e, "Auto-assignment failed, ticket stays open");
                }
            }
        }

        Ok(ticket)
    }

    fn should_auto_assign(&self, ticket: &Ticket) -> bool {
        self.env.config.auto_assign_critical_incidents
            && ticket.ticket_type == TicketType::Incident
            && ticket.priority == Priority::Critical
    }

    /// Applies a partial update.
    ///
    /// Only supplied fields change. A blank title counts as absent, and a
    /// status equal to the current one is ignored. Reassigning through an
    /// update needs the assign permission and runs the same eligibility and
    /// status rules as [`AssignmentEngine::assign_to_user`] and
    /// [`AssignmentEngine::assign_to_team`], unless the update names a status.
    /// The ticket is saved once, or not at all if nothing changed.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the actor may not modify the ticket, make the status move, or reassign it
    /// - `Validation` for bad field values or an ineligible assignee
    /// - `InvalidStatusTransition` for a move outside the table, or a new assignee on a closed ticket
    /// - `InvalidState` for a new team on a closed ticket
    /// - `TicketNotFound` / `UserNotFound` for unknown ids
    /// - `Store` / `Directory` on infrastructure failure
    #[instrument(skip_all, fields(ticket_id = %ticket_id, actor = %actor_id))]
    pub async fn update_ticket(
        &self,
        ticket_id: TicketId,
        update: TicketUpdate,
        actor_id: &UserId,
    ) -> Result<Ticket, WorkflowError> {
        observe("update_ticket", self.update(ticket_id, update, actor_id).await)
    }

    async fn update(
        &self,
        ticket_id: TicketId,
        update: TicketUpdate,
        actor_id: &UserId,
    ) -> Result<Ticket, WorkflowError> {
        let actor = self.env.resolve_user(actor_id).await?;
        let _guard = self.env.locks().lock(ticket_id).await;
        let mut ticket = self.env.load_ticket(ticket_id).await?;
        ensure_allowed(&actor, Some(&ticket), TicketAction::Modify)?;

        let title = update.effective_title().map(validate_title).transpose()?;
        let description = update
            .description
            .as_deref()
            .map(validate_description)
            .transpose()?;
        if let Some(priority) = update.priority {
            validate_priority_for_type(priority, ticket.ticket_type)?;
        }

        let from = ticket.status;
        let status_change = update.status.filter(|to| *to != from);
        if let Some(to) = status_change {
            if !is_valid_transition(from, to) {
                return Err(WorkflowError::InvalidStatusTransition { from, to });
            }
            ensure_allowed(&actor, Some(&ticket), TicketAction::ChangeStatus { from, to })?;
        }

        let team_change = update.assigned_team.filter(|team| ticket.assigned_team != Some(*team));
        let assignee_change = update
            .assigned_user
            .filter(|user| !ticket.is_assigned_to(user));
        if team_change.is_some() || assignee_change.is_some() {
            ensure_allowed(&actor, Some(&ticket), TicketAction::Assign)?;
        }
        let routing_move = implied_status(
            &ticket,
            status_change,
            assignee_change.is_some(),
            team_change.is_some(),
        )?;
        if let Some(user_id) = &assignee_change {
            let team = team_change.or(ticket.assigned_team);
            let assignee = self.assignment.check_assignee(user_id, team).await?;
            self.assignment.capacity_warning(&assignee.id).await?;
        }

        let mut changed = false;
        if let Some(title) = title {
            changed |= ticket.title != title;
            ticket.title = title;
        }
        if let Some(description) = description {
            changed |= ticket.description != description;
            ticket.description = description;
        }
        if let Some(priority) = update.priority {
            changed |= ticket.priority != priority;
            ticket.priority = priority;
        }
        if let Some(to) = status_change.or(routing_move) {
            ticket.status = to;
            changed = true;
        }
        let previous_team = ticket.assigned_team;
        if let Some(team) = team_change {
            ticket.assigned_team = Some(team);
            changed = true;
        }
        let previous_assignee = ticket.assigned_user.clone();
        if let Some(user_id) = &assignee_change {
            ticket.assigned_user = Some(user_id.clone());
            changed = true;
        }

        if !changed {
            debug!("Update changes nothing");
            return Ok(ticket);
        }
        let saved = self.env.store.save(ticket).await?;

        let now = self.env.clock.now();
        let by = Actor::User(actor.id.clone());
        let mut events = Vec::new();
        if let Some(to) = status_change {
            TicketMetrics::record_status_change(from, to);
            events.push(TicketEvent::StatusChanged {
                ticket_id,
                from,
                to,
                changed_by: by.clone(),
                occurred_at: now,
            });
        }
        if let Some(team) = team_change {
            events.push(TicketEvent::TeamAssigned {
                ticket_id,
                previous_team,
                team,
                assigned_by: by.clone(),
                occurred_at: now,
            });
        }
        if let Some(assignee) = assignee_change {
            AssignmentMetrics::record_assignment(&by);
            events.push(TicketEvent::Assigned {
                ticket_id,
                previous_assignee,
                assignee,
                assigned_by: by.clone(),
                occurred_at: now,
            });
        }
        if let Some(to) = routing_move {
            TicketMetrics::record_status_change(from, to);
            events.push(TicketEvent::StatusChanged {
                ticket_id,
                from,
                to,
                changed_by: by,
                occurred_at: now,
            });
        }
        self.env.publish(events).await;

        info!(status = %saved.status, "Ticket updated");
        Ok(saved)
    }

    /// Moves a ticket to `to`.
    ///
    /// Moving a `CLOSED` ticket to `CLOSED` returns it unchanged. Any other
    /// move to the current status is rejected.
    ///
    /// # Errors
    ///
    /// - `InvalidStatusTransition` for a move outside the table
    /// - `Unauthorized` if the actor may not make the move
    /// - `TicketNotFound` / `UserNotFound` for unknown ids
    /// - `Store` / `Directory` on infrastructure failure
    #[instrument(skip_all, fields(ticket_id = %ticket_id, to = %to, actor = %actor_id))]
    pub async fn change_status(
        &self,
        ticket_id: TicketId,
        to: TicketStatus,
        actor_id: &UserId,
    ) -> Result<Ticket, WorkflowError> {
        observe("change_status", self.move_to(ticket_id, to, actor_id).await)
    }

    async fn move_to(
        &self,
        ticket_id: TicketId,
        to: TicketStatus,
        actor_id: &UserId,
    ) -> Result<Ticket, WorkflowError> {
        let actor = self.env.resolve_user(actor_id).await?;
        let _guard = self.env.locks().lock(ticket_id).await;
        let ticket = self.env.load_ticket(ticket_id).await?;

        let from = ticket.status;
        if from == TicketStatus::Closed && to == TicketStatus::Closed {
            debug!("Ticket already closed");
            return Ok(ticket);
        }
        if !is_valid_transition(from, to) {
            return Err(WorkflowError::InvalidStatusTransition { from, to });
        }
        ensure_allowed(&actor, Some(&ticket), TicketAction::ChangeStatus { from, to })?;

        self.transition(ticket, to, &actor).await
    }

    /// Closes a ticket. Closing a `CLOSED` ticket returns it unchanged.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` unless the actor is an admin, the assignee or the creator
    /// - `TicketNotFound` / `UserNotFound` for unknown ids
    /// - `Store` / `Directory` on infrastructure failure
    #[instrument(skip_all, fields(ticket_id = %ticket_id, actor = %actor_id))]
    pub async fn close_ticket(
        &self,
        ticket_id: TicketId,
        actor_id: &UserId,
    ) -> Result<Ticket, WorkflowError> {
        observe("close_ticket", self.close(ticket_id, actor_id).await)
    }

    async fn close(&self, ticket_id: TicketId, actor_id: &UserId) -> Result<Ticket, WorkflowError> {
        let actor = self.env.resolve_user(actor_id).await?;
        let _guard = self.env.locks().lock(ticket_id).await;
        let ticket = self.env.load_ticket(ticket_id).await?;

        if ticket.status == TicketStatus::Closed {
            debug!("Ticket already closed");
            return Ok(ticket);
        }
        ensure_allowed(&actor, Some(&ticket), TicketAction::Close)?;
        if !is_valid_transition(ticket.status, TicketStatus::Closed) {
            return Err(WorkflowError::InvalidStatusTransition {
                from: ticket.status,
                to: TicketStatus::Closed,
            });
        }

        self.transition(ticket, TicketStatus::Closed, &actor).await
    }

    /// Reopens a `CLOSED` ticket.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the ticket is not `CLOSED`, whoever asks
    /// - `Unauthorized` unless the actor has a support role
    /// - `TicketNotFound` / `UserNotFound` for unknown ids
    /// - `Store` / `Directory` on infrastructure failure
    #[instrument(skip_all, fields(ticket_id = %ticket_id, actor = %actor_id))]
    pub async fn reopen_ticket(
        &self,
        ticket_id: TicketId,
        actor_id: &UserId,
    ) -> Result<Ticket, WorkflowError> {
        observe("reopen_ticket", self.reopen(ticket_id, actor_id).await)
    }

    async fn reopen(&self, ticket_id: TicketId, actor_id: &UserId) -> Result<Ticket, WorkflowError> {
        let actor = self.env.resolve_user(actor_id).await?;
        let _guard = self.env.locks().lock(ticket_id).await;
        let ticket = self.env.load_ticket(ticket_id).await?;

        if ticket.status != TicketStatus::Closed {
            return Err(WorkflowError::InvalidState {
                ticket_id,
                status: ticket.status,
                reason: "only closed tickets can be reopened",
            });
        }
        ensure_allowed(&actor, Some(&ticket), TicketAction::Reopen)?;

        self.transition(ticket, TicketStatus::Reopened, &actor).await
    }

    /// Saves `ticket` in status `to` and announces the move. Caller holds the lock.
    async fn transition(
        &self,
        mut ticket: Ticket,
        to: TicketStatus,
        actor: &User,
    ) -> Result<Ticket, WorkflowError> {
        let from = ticket.status;
        ticket.status = to;
        let saved = self.env.store.save(ticket).await?;

        TicketMetrics::record_status_change(from, to);
        self.env
            .publish(vec![TicketEvent::StatusChanged {
                ticket_id: saved.id,
                from,
                to,
                changed_by: Actor::User(actor.id.clone()),
                occurred_at: self.env.clock.now(),
            }])
            .await;

        info!(ticket_id = %saved.id, %from, %to, "Ticket status changed");
        Ok(saved)
    }

    /// Assigns a ticket to a user on behalf of `actor_id`.
    ///
    /// # Errors
    ///
    /// See [`AssignmentEngine::assign_to_user`].
    pub async fn assign_to_user(
        &self,
        ticket_id: TicketId,
        user_id: &UserId,
        actor_id: &UserId,
    ) -> Result<Ticket, WorkflowError> {
        let actor = Actor::User(actor_id.clone());
        observe(
            "assign_to_user",
            self.assignment.assign_to_user(ticket_id, user_id, &actor).await,
        )
    }

    /// Routes a ticket to a team on behalf of `actor_id`.
    ///
    /// # Errors
    ///
    /// See [`AssignmentEngine::assign_to_team`].
    pub async fn assign_to_team(
        &self,
        ticket_id: TicketId,
        team: Team,
        actor_id: &UserId,
    ) -> Result<Ticket, WorkflowError> {
        let actor = Actor::User(actor_id.clone());
        observe(
            "assign_to_team",
            self.assignment.assign_to_team(ticket_id, team, &actor).await,
        )
    }

    /// Appends a message to a ticket's conversation.
    ///
    /// # Errors
    ///
    /// - `Validation` for blank or oversized content
    /// - `Unauthorized` if the author may not view the ticket
    /// - `TicketNotFound` / `UserNotFound` for unknown ids
    /// - `Store` / `Directory` on infrastructure failure
    #[instrument(skip_all, fields(ticket_id = %ticket_id, author = %author_id))]
    pub async fn add_message(
        &self,
        ticket_id: TicketId,
        content: &str,
        author_id: &UserId,
    ) -> Result<Message, WorkflowError> {
        observe("add_message", self.post_message(ticket_id, content, author_id).await)
    }

    async fn post_message(
        &self,
        ticket_id: TicketId,
        content: &str,
        author_id: &UserId,
    ) -> Result<Message, WorkflowError> {
        let content = validate_message(content)?;
        let author = self.env.resolve_user(author_id).await?;
        let _guard = self.env.locks().lock(ticket_id).await;
        let ticket = self.env.load_ticket(ticket_id).await?;
        ensure_allowed(&author, Some(&ticket), TicketAction::View)?;

        let message = self
            .env
            .store
            .add_message(
                ticket_id,
                NewMessage {
                    author: author.id,
                    content,
                },
            )
            .await?
            .ok_or(WorkflowError::TicketNotFound(ticket_id))?;
        debug!(message_id = %message.id, "Message added");
        Ok(message)
    }

    /// Deletes a message. Only its author or an admin may do so.
    ///
    /// # Errors
    ///
    /// - `MessageNotFound` if the message is not on the ticket
    /// - `Unauthorized` unless the actor is the author or an admin
    /// - `TicketNotFound` / `UserNotFound` for unknown ids
    /// - `Store` / `Directory` on infrastructure failure
    #[instrument(skip_all, fields(ticket_id = %ticket_id, message_id = %message_id, actor = %actor_id))]
    pub async fn remove_message(
        &self,
        ticket_id: TicketId,
        message_id: MessageId,
        actor_id: &UserId,
    ) -> Result<(), WorkflowError> {
        observe(
            "remove_message",
            self.delete_message(ticket_id, message_id, actor_id).await,
        )
    }

    async fn delete_message(
        &self,
        ticket_id: TicketId,
        message_id: MessageId,
        actor_id: &UserId,
    ) -> Result<(), WorkflowError> {
        let actor = self.env.resolve_user(actor_id).await?;
        let _guard = self.env.locks().lock(ticket_id).await;
        let ticket = self.env.load_ticket(ticket_id).await?;
        let not_found = WorkflowError::MessageNotFound {
            ticket_id,
            message_id,
        };

        let is_author = ticket
            .message(message_id)
            .ok_or_else(|| not_found.clone())?
            .author
            == actor.id;
        ensure_allowed(&actor, Some(&ticket), TicketAction::RemoveMessage { is_author })?;

        if self.env.store.remove_message(ticket_id, message_id).await? {
            debug!("Message removed");
            Ok(())
        } else {
            Err(not_found)
        }
    }

    /// Records attachment metadata on a ticket.
    ///
    /// # Errors
    ///
    /// - `Validation` for a blank or oversized file name or a blank URL
    /// - `Unauthorized` if the uploader may not view the ticket
    /// - `TicketNotFound` / `UserNotFound` for unknown ids
    /// - `Store` / `Directory` on infrastructure failure
    #[instrument(skip_all, fields(ticket_id = %ticket_id, uploader = %uploader_id))]
    pub async fn add_attachment(
        &self,
        ticket_id: TicketId,
        filename: &str,
        file_url: &str,
        uploader_id: &UserId,
    ) -> Result<Attachment, WorkflowError> {
        observe(
            "add_attachment",
            self.attach(ticket_id, filename, file_url, uploader_id).await,
        )
    }

    async fn attach(
        &self,
        ticket_id: TicketId,
        filename: &str,
        file_url: &str,
        uploader_id: &UserId,
    ) -> Result<Attachment, WorkflowError> {
        let (filename, file_url) = validate_attachment(filename, file_url)?;
        let uploader = self.env.resolve_user(uploader_id).await?;
        let _guard = self.env.locks().lock(ticket_id).await;
        let ticket = self.env.load_ticket(ticket_id).await?;
        ensure_allowed(&uploader, Some(&ticket), TicketAction::View)?;

        self.env
            .store
            .add_attachment(
                ticket_id,
                NewAttachment {
                    filename,
                    file_url,
                    uploaded_by: uploader.id,
                },
            )
            .await?
            .ok_or(WorkflowError::TicketNotFound(ticket_id))
    }

    /// Loads a ticket the viewer is allowed to see.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` if the viewer may not see the ticket
    /// - `TicketNotFound` / `UserNotFound` for unknown ids
    /// - `Store` / `Directory` on infrastructure failure
    pub async fn get_ticket(
        &self,
        ticket_id: TicketId,
        viewer_id: &UserId,
    ) -> Result<Ticket, WorkflowError> {
        observe("get_ticket", self.view(ticket_id, viewer_id).await)
    }

    async fn view(&self, ticket_id: TicketId, viewer_id: &UserId) -> Result<Ticket, WorkflowError> {
        let viewer = self.env.resolve_user(viewer_id).await?;
        let ticket = self.env.load_ticket(ticket_id).await?;
        ensure_allowed(&viewer, Some(&ticket), TicketAction::View)?;
        Ok(ticket)
    }
}
